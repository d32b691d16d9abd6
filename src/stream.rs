//! Expect-style stream facade over a PTY channel.
//!
//! `ShellStream` turns the channel's asynchronous chunk feed into line- and
//! pattern-oriented reads with optional deadlines, and batches writes so a
//! command reaches the wire in a single send. One pump task is the sole
//! producer; the `&mut` holder is the sole consumer. The pump never waits:
//! it appends under a short lock and signals, and consumers re-check their
//! predicate on every signal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use memchr::memchr;
use regex::Regex;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::channel::{Matcher, ReadBuffer, TerminalConfig, WriteBuffer};
use crate::error::{ChannelError, Result};
use crate::transport::{ChannelEvent, ChannelSession};

/// Carriage return appended by [`ShellStream::write_line`].
const LINE_TERMINATOR: &str = "\r";

type ClosedHook = Box<dyn FnOnce() + Send>;

/// Shared state mutated by both the pump task and the consumer.
struct StreamState {
    incoming: ReadBuffer,
    outgoing: WriteBuffer,
    disposed: bool,
    closed_hooks: Vec<ClosedHook>,
}

/// The single coordination point: state under a mutex, plus the signal the
/// pump raises whenever the state changed.
struct Shared {
    state: Mutex<StreamState>,
    data_ready: Notify,
}

/// Interactive shell stream over a PTY channel.
///
/// Construction opens the channel, negotiates the pseudo-terminal and shell,
/// and takes over the channel's event feed. Afterwards the stream offers the
/// classic expect contract: buffered writes, and reads that wait (with an
/// optional deadline) for a byte count, a line terminator, or a pattern
/// match in the decoded text.
///
/// Timeouts and disposal are not errors: a read or expect whose deadline
/// elapses, or whose stream is disposed mid-wait, resolves to `None` (or a
/// best-effort byte count). Callers that need to tell the two apart check
/// [`is_disposed`](Self::is_disposed) after a `None` result.
///
/// # Example
///
/// ```rust,ignore
/// use shellstream::{ShellStream, TerminalConfig};
///
/// let mut shell = ShellStream::new(channel, TerminalConfig::default()).await?;
/// shell.write_line("uname -a");
/// if let Some(output) = shell.expect("$ ", Some(Duration::from_secs(10))).await? {
///     println!("{output}");
/// }
/// shell.close().await;
/// ```
pub struct ShellStream<C: ChannelSession> {
    /// Consumer-side channel handle, used for sends and disposal.
    channel: C,

    /// State shared with the pump task.
    shared: Arc<Shared>,

    /// The pump task draining the channel's event feed.
    pump: JoinHandle<()>,
}

impl<C: ChannelSession> ShellStream<C> {
    /// Open the channel, negotiate PTY and shell, and start the pump.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::PtyOpenFailed`] or
    /// [`ChannelError::ShellRequestFailed`] when the peer refuses the
    /// respective request, or the transport error from the channel.
    pub async fn new(mut channel: C, config: TerminalConfig) -> Result<Self> {
        channel.open().await?;
        if !channel.request_pty(&config).await? {
            return Err(ChannelError::PtyOpenFailed.into());
        }
        if !channel.request_shell().await? {
            return Err(ChannelError::ShellRequestFailed.into());
        }

        let events = channel.subscribe();
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState {
                incoming: ReadBuffer::new(config.buffer_size),
                outgoing: WriteBuffer::new(),
                disposed: false,
                closed_hooks: Vec::new(),
            }),
            data_ready: Notify::new(),
        });
        let pump = tokio::spawn(pump(events, Arc::clone(&shared)));

        debug!("shell stream ready, term={}", config.term);
        Ok(Self {
            channel,
            shared,
            pump,
        })
    }

    /// Queue the UTF-8 bytes of `text` for transmission.
    ///
    /// An empty string queues nothing. Ignored once the stream is disposed.
    pub fn write(&mut self, text: &str) {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            trace!("write on disposed stream ignored");
            return;
        }
        state.outgoing.push_text(text);
    }

    /// Queue `line` followed by a single carriage-return terminator.
    ///
    /// `write_line("")` queues only the terminator.
    pub fn write_line(&mut self, line: &str) {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            trace!("write on disposed stream ignored");
            return;
        }
        state.outgoing.push_text(line);
        state.outgoing.push_text(LINE_TERMINATOR);
    }

    /// Queue raw bytes, bypassing encoding.
    ///
    /// Queued writes reach the channel concatenated in call order, whatever
    /// their origin.
    pub fn write_bytes(&mut self, data: &[u8]) {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            trace!("write on disposed stream ignored");
            return;
        }
        state.outgoing.push_bytes(data);
    }

    /// Send everything queued so far to the channel in one call.
    ///
    /// A no-op when nothing is queued. Every blocking read and expect
    /// operation flushes first, so a written command is on the wire before
    /// the wait for its response begins.
    ///
    /// # Errors
    ///
    /// A failed channel send propagates here; nothing is retried.
    pub async fn flush(&mut self) -> Result<()> {
        let pending = {
            let mut state = self.shared.state.lock().unwrap();
            if state.disposed && !state.outgoing.is_empty() {
                return Err(ChannelError::Closed.into());
            }
            state.outgoing.take()
        };
        if let Some(data) = pending {
            debug!("flushing {} buffered bytes", data.len());
            self.channel.send_data(&data).await?;
        }
        Ok(())
    }

    /// Read whatever decoded text is available, waiting for at least one
    /// character.
    ///
    /// Returns `None` if the deadline elapses, or the stream is disposed,
    /// with nothing decoded. Decoder carry-over (an incomplete multi-byte
    /// character) stays buffered for a later read.
    pub async fn read(&mut self, timeout: Option<Duration>) -> Result<Option<String>> {
        self.flush().await?;
        Ok(self
            .wait_until(timeout, |state| {
                let len = state.incoming.text_len();
                (len > 0).then(|| state.incoming.take_text(len))
            })
            .await)
    }

    /// Read raw bytes into `dst`, waiting for at least one byte.
    ///
    /// Copies at most `dst.len()` bytes; anything beyond that stays buffered
    /// for the next call. Returns `0` if the deadline elapses or the stream
    /// is disposed with nothing available.
    pub async fn read_bytes(
        &mut self,
        dst: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize> {
        self.flush().await?;
        let count = self
            .wait_until(timeout, |state| {
                if state.incoming.is_empty() {
                    None
                } else {
                    Some(state.incoming.read_into(dst))
                }
            })
            .await
            .unwrap_or(0);
        Ok(count)
    }

    /// Read one line, waiting for its terminator.
    ///
    /// The terminator (`\n`, optionally preceded by `\r`) is consumed and
    /// stripped. Returns `None` on timeout or disposal.
    pub async fn read_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>> {
        self.flush().await?;
        Ok(self
            .wait_until(timeout, |state| {
                let terminator = memchr(b'\n', state.incoming.text().as_bytes());
                terminator.map(|at| {
                    let mut line = state.incoming.take_text(at + 1);
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                    line
                })
            })
            .await)
    }

    /// Wait until the decoded text contains `literal`.
    ///
    /// On a match, consumes and returns everything up to and including the
    /// match; bytes after it stay buffered for subsequent reads. Returns
    /// `None` on timeout or disposal, leaving the buffer untouched.
    pub async fn expect(
        &mut self,
        literal: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        self.wait_expect(literal, timeout).await
    }

    /// Wait until the decoded text matches `pattern`.
    ///
    /// Same contract as [`expect`](Self::expect): consumes through the end
    /// of the earliest match, keeps the remainder buffered.
    pub async fn expect_regex(
        &mut self,
        pattern: &Regex,
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        self.wait_expect(pattern, timeout).await
    }

    /// Shared implementation behind both expect flavors.
    async fn wait_expect<M: Matcher + ?Sized>(
        &mut self,
        matcher: &M,
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        self.flush().await?;
        Ok(self
            .wait_until(timeout, |state| {
                let end = matcher.find_end(&state.incoming.text());
                end.map(|end| state.incoming.take_text(end))
            })
            .await)
    }

    /// Wait until `check` yields a result, the deadline elapses, or the
    /// stream is disposed.
    ///
    /// The predicate runs under the state lock and consumes on success, so a
    /// producer append can never slip between match and consume. `None` as
    /// the timeout waits indefinitely; a zero timeout degenerates to a
    /// single check. Disposal resolves the wait immediately, overriding any
    /// remaining deadline; a timeout performs one final check so data that
    /// arrived on the deadline is not lost.
    async fn wait_until<T>(
        &self,
        timeout: Option<Duration>,
        mut check: impl FnMut(&mut StreamState) -> Option<T>,
    ) -> Option<T> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            {
                let mut state = self.shared.state.lock().unwrap();
                if let Some(found) = check(&mut state) {
                    return Some(found);
                }
                if state.disposed {
                    trace!("wait resolved by disposal");
                    return None;
                }
            }

            // A permit stored by a notify between the check above and this
            // await completes immediately, so no append can be missed.
            let notified = self.shared.data_ready.notified();
            match deadline {
                Some(deadline) => {
                    if time::timeout_at(deadline, notified).await.is_err() {
                        trace!("wait timed out");
                        let mut state = self.shared.state.lock().unwrap();
                        return check(&mut state);
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Whether the stream has been disposed, by [`close`](Self::close) or by
    /// the channel closing underneath it.
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().unwrap().disposed
    }

    /// Whether any unconsumed bytes are currently buffered.
    pub fn data_available(&self) -> bool {
        !self.shared.state.lock().unwrap().incoming.is_empty()
    }

    /// Register a hook to run when the stream is disposed.
    ///
    /// Hooks run exactly once, strictly after the disposed flag is set: a
    /// hook observing [`is_disposed`](Self::is_disposed) sees `true`. A hook
    /// registered after disposal runs immediately.
    pub fn on_closed<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            drop(state);
            hook();
        } else {
            state.closed_hooks.push(Box::new(hook));
        }
    }

    /// Close the stream: flush queued writes best-effort, dispose the
    /// channel, and run the closed hooks. Idempotent.
    pub async fn close(&mut self) {
        if self.is_disposed() {
            return;
        }
        if let Err(e) = self.flush().await {
            debug!("flush during close failed: {e}");
        }
        dispose(&self.shared);
        self.channel.dispose().await;
        self.pump.abort();
    }
}

impl<C: ChannelSession> Drop for ShellStream<C> {
    fn drop(&mut self) {
        self.pump.abort();
        if !self.is_disposed() {
            warn!("ShellStream dropped without close()");
        }
    }
}

/// Producer loop: append inbound chunks and signal the consumer.
///
/// Ends, disposing the stream, when the channel reports `Closed` or its
/// event feed is dropped.
async fn pump(mut events: UnboundedReceiver<ChannelEvent>, shared: Arc<Shared>) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Data(data) => {
                trace!("channel delivered {} bytes", data.len());
                let mut state = shared.state.lock().unwrap();
                state.incoming.append(&data);
                drop(state);
                shared.data_ready.notify_one();
            }
            ChannelEvent::Closed => break,
        }
    }
    dispose(&shared);
}

/// Flip the disposed flag, wake any waiter, and run the closed hooks.
///
/// The flag is set before any hook runs and before the waiter resumes;
/// hooks execute outside the lock. Idempotent.
fn dispose(shared: &Shared) {
    let hooks = {
        let mut state = shared.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.disposed = true;
        std::mem::take(&mut state.closed_hooks)
    };
    debug!("shell stream disposed");
    shared.data_ready.notify_one();
    for hook in hooks {
        hook();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant as StdInstant;

    use bytes::Bytes;
    use tokio::sync::mpsc::{self, UnboundedSender};
    use tokio::time::sleep;
    use tokio_test::assert_err;

    use super::*;

    /// Scripted channel collaborator.
    struct MockChannel {
        events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
        remote: Remote,
        /// Loop every send straight back as inbound data.
        echo: bool,
        /// Fail every send with a transport error.
        fail_sends: bool,
        refuse_pty: bool,
        refuse_shell: bool,
    }

    /// Test-side handle playing the remote peer.
    #[derive(Clone)]
    struct Remote {
        events: UnboundedSender<ChannelEvent>,
        sent: Arc<StdMutex<Vec<Vec<u8>>>>,
    }

    impl Remote {
        fn feed(&self, data: &[u8]) {
            let _ = self
                .events
                .send(ChannelEvent::Data(Bytes::copy_from_slice(data)));
        }

        fn feed_closed(&self) {
            let _ = self.events.send(ChannelEvent::Closed);
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ChannelSession for MockChannel {
        async fn open(&mut self) -> Result<()> {
            Ok(())
        }

        async fn request_pty(&mut self, _config: &TerminalConfig) -> Result<bool> {
            Ok(!self.refuse_pty)
        }

        async fn request_shell(&mut self) -> Result<bool> {
            Ok(!self.refuse_shell)
        }

        async fn send_data(&mut self, data: &[u8]) -> Result<()> {
            if self.fail_sends {
                return Err(crate::error::TransportError::Disconnected.into());
            }
            self.remote.sent.lock().unwrap().push(data.to_vec());
            if self.echo {
                self.remote.feed(data);
            }
            Ok(())
        }

        fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChannelEvent> {
            self.events.take().expect("subscribed twice")
        }

        async fn dispose(&mut self) {}
    }

    fn mock() -> (MockChannel, Remote) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, rx) = mpsc::unbounded_channel();
        let remote = Remote {
            events: tx,
            sent: Arc::new(StdMutex::new(Vec::new())),
        };
        let channel = MockChannel {
            events: Some(rx),
            remote: remote.clone(),
            echo: false,
            fail_sends: false,
            refuse_pty: false,
            refuse_shell: false,
        };
        (channel, remote)
    }

    async fn stream() -> (ShellStream<MockChannel>, Remote) {
        let (channel, remote) = mock();
        let stream = ShellStream::new(channel, TerminalConfig::default())
            .await
            .unwrap();
        (stream, remote)
    }

    async fn echo_stream() -> (ShellStream<MockChannel>, Remote) {
        let (mut channel, remote) = mock();
        channel.echo = true;
        let stream = ShellStream::new(channel, TerminalConfig::default())
            .await
            .unwrap();
        (stream, remote)
    }

    const GENEROUS: Option<Duration> = Some(Duration::from_secs(5));

    #[tokio::test]
    async fn test_read_line_multi_byte_characters() {
        let (mut stream, remote) = stream().await;
        let data1 = "bash: /root/menu.sh: Отказан";
        let data2 = "о в доступе";
        let data3 = "done";

        let feeder = remote.clone();
        tokio::spawn(async move {
            feeder.feed(data1.as_bytes());
            sleep(Duration::from_millis(50)).await;
            feeder.feed(format!("{data2}\r\n").as_bytes());
            feeder.feed(format!("{data3}\r\n").as_bytes());
        });

        assert_eq!(
            stream.read_line(None).await.unwrap(),
            Some(format!("{data1}{data2}"))
        );
        assert_eq!(stream.read_line(None).await.unwrap(), Some(data3.to_string()));
    }

    #[tokio::test]
    async fn test_character_split_across_chunks_survives() {
        let (mut stream, remote) = stream().await;
        let phrase = "Отказано в доступе\r\n";
        let bytes = phrase.as_bytes();

        // Split in the middle of a two-byte character.
        remote.feed(&bytes[..7]);
        remote.feed(&bytes[7..]);

        assert_eq!(
            stream.read_line(None).await.unwrap(),
            Some("Отказано в доступе".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_empty_text_sends_nothing() {
        let (mut stream, remote) = stream().await;

        stream.write("");
        stream.flush().await.unwrap();

        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_write_line_empty_sends_only_terminator() {
        let (mut stream, remote) = stream().await;

        stream.write_line("");
        stream.flush().await.unwrap();

        assert_eq!(remote.sent(), vec![b"\r".to_vec()]);
    }

    #[tokio::test]
    async fn test_expect_regex_returns_only_up_to_the_match() {
        let (mut stream, remote) = stream().await;
        let input = "abc\rdef\rghi\rprompt> ";
        remote.feed(input.as_bytes());

        let pattern = Regex::new("prompt>").unwrap();
        let output = stream.expect_regex(&pattern, GENEROUS).await.unwrap();

        assert_eq!(output, Some(input[..input.len() - 1].to_string()));

        // The trailing space stays buffered for the next read.
        assert_eq!(
            stream.read(GENEROUS).await.unwrap(),
            Some(" ".to_string())
        );
    }

    #[tokio::test]
    async fn test_expect_literal_stops_at_the_end_of_the_match() {
        let (mut stream, remote) = stream().await;
        remote.feed(b"router# extra");

        let output = stream.expect("#", GENEROUS).await.unwrap();
        assert_eq!(output, Some("router#".to_string()));

        assert_eq!(
            stream.read(GENEROUS).await.unwrap(),
            Some(" extra".to_string())
        );
    }

    #[tokio::test]
    async fn test_expect_does_not_wait_for_more_data_when_disposed() {
        let (mut stream, remote) = stream().await;
        remote.feed_closed();

        let started = StdInstant::now();
        let output = stream
            .expect("not there", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(output, None);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(stream.is_disposed());
    }

    #[tokio::test]
    async fn test_closed_hook_observes_disposed_flag() {
        let (stream, remote) = stream().await;
        let called = Arc::new(AtomicBool::new(false));
        let observed_disposed = Arc::new(AtomicBool::new(false));

        {
            let called = Arc::clone(&called);
            let observed_disposed = Arc::clone(&observed_disposed);
            let shared = Arc::clone(&stream.shared);
            stream.on_closed(move || {
                let disposed = shared.state.lock().unwrap().disposed;
                observed_disposed.store(disposed, Ordering::SeqCst);
                called.store(true, Ordering::SeqCst);
            });
        }

        remote.feed_closed();
        for _ in 0..100 {
            if called.load(Ordering::SeqCst) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert!(called.load(Ordering::SeqCst));
        assert!(observed_disposed.load(Ordering::SeqCst));
        assert!(stream.is_disposed());
    }

    #[tokio::test]
    async fn test_writes_concatenate_in_call_order() {
        let (mut stream, remote) = stream().await;

        stream.write_bytes(b"abcd\r");
        stream.write("efgh\r");
        stream.flush().await.unwrap();

        assert_eq!(remote.sent(), vec![b"abcd\refgh\r".to_vec()]);
    }

    #[tokio::test]
    async fn test_expect_flushes_the_write_buffer() {
        let (mut stream, remote) = echo_stream().await;

        stream.write_bytes(b"abcd\r");
        stream.write("efgh\r");
        let output = stream.expect("h\r", GENEROUS).await.unwrap();

        assert_eq!(remote.sent(), vec![b"abcd\refgh\r".to_vec()]);
        assert_eq!(output, Some("abcd\refgh\r".to_string()));
    }

    #[tokio::test]
    async fn test_read_flushes_the_write_buffer() {
        let (mut stream, remote) = echo_stream().await;

        stream.write_bytes(b"abcd\r");
        stream.write("efgh\r");
        let output = stream.read(None).await.unwrap();

        assert_eq!(remote.sent(), vec![b"abcd\refgh\r".to_vec()]);
        assert_eq!(output, Some("abcd\refgh\r".to_string()));
    }

    #[tokio::test]
    async fn test_read_bytes_flushes_the_write_buffer() {
        let (mut stream, remote) = echo_stream().await;

        stream.write_bytes(b"abcd\r");
        stream.write("efgh\r");
        let mut output = [0u8; 10];
        let count = stream.read_bytes(&mut output, GENEROUS).await.unwrap();

        assert_eq!(remote.sent(), vec![b"abcd\refgh\r".to_vec()]);
        assert_eq!(count, 10);
        assert_eq!(&output, b"abcd\refgh\r");
    }

    #[tokio::test]
    async fn test_read_line_flushes_the_write_buffer() {
        let (mut stream, remote) = echo_stream().await;

        stream.write_bytes(b"abcd\r\n");
        stream.write("efgh\r\n");
        let output1 = stream.read_line(GENEROUS).await.unwrap();
        let output2 = stream.read_line(GENEROUS).await.unwrap();

        // Both lines went out in a single send, flushed by the first read.
        assert_eq!(remote.sent(), vec![b"abcd\r\nefgh\r\n".to_vec()]);
        assert_eq!(output1, Some("abcd".to_string()));
        assert_eq!(output2, Some("efgh".to_string()));
    }

    #[tokio::test]
    async fn test_read_line_strips_exactly_one_terminator() {
        let (mut stream, remote) = stream().await;
        remote.feed(b"first\n\nlast\r\n");

        assert_eq!(stream.read_line(GENEROUS).await.unwrap(), Some("first".into()));
        assert_eq!(stream.read_line(GENEROUS).await.unwrap(), Some("".into()));
        assert_eq!(stream.read_line(GENEROUS).await.unwrap(), Some("last".into()));
    }

    #[tokio::test]
    async fn test_zero_timeout_returns_immediately() {
        let (mut stream, _remote) = stream().await;

        let started = StdInstant::now();
        let output = stream.expect("nope", Some(Duration::ZERO)).await.unwrap();

        assert_eq!(output, None);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_timeout_leaves_unmatched_data_buffered() {
        let (mut stream, remote) = stream().await;
        remote.feed(b"par");
        sleep(Duration::from_millis(50)).await;

        let output = stream
            .expect("full", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(output, None);

        // The unmatched bytes are still there for a plain read.
        assert_eq!(stream.read(GENEROUS).await.unwrap(), Some("par".to_string()));
    }

    #[tokio::test]
    async fn test_disposal_preempts_timeout_mid_wait() {
        let (mut stream, remote) = stream().await;

        let closer = remote.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            closer.feed_closed();
        });

        let started = StdInstant::now();
        let output = stream
            .read_line(Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(output, None);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(stream.is_disposed());
    }

    #[tokio::test]
    async fn test_read_bytes_keeps_excess_for_the_next_call() {
        let (mut stream, remote) = stream().await;
        remote.feed(b"abcdef");

        let mut first = [0u8; 4];
        assert_eq!(stream.read_bytes(&mut first, GENEROUS).await.unwrap(), 4);
        assert_eq!(&first, b"abcd");

        let mut second = [0u8; 4];
        assert_eq!(stream.read_bytes(&mut second, GENEROUS).await.unwrap(), 2);
        assert_eq!(&second[..2], b"ef");
    }

    #[tokio::test]
    async fn test_send_failure_propagates_to_the_triggering_call() {
        let (mut channel, _remote) = mock();
        channel.fail_sends = true;
        let mut stream = ShellStream::new(channel, TerminalConfig::default())
            .await
            .unwrap();

        stream.write("boom\r");
        assert_err!(stream.flush().await);

        stream.write("boom again\r");
        assert_err!(stream.expect("x", Some(Duration::ZERO)).await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_runs_hooks_once() {
        let (mut stream, _remote) = stream().await;
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let calls = Arc::clone(&calls);
            stream.on_closed(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        stream.close().await;
        stream.close().await;

        assert!(stream.is_disposed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_registered_after_close_fires_immediately() {
        let (mut stream, _remote) = stream().await;
        stream.close().await;

        let called = Arc::new(AtomicBool::new(false));
        {
            let called = Arc::clone(&called);
            stream.on_closed(move || {
                called.store(true, Ordering::SeqCst);
            });
        }

        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_write_after_close_is_ignored() {
        let (mut stream, remote) = stream().await;
        stream.close().await;

        stream.write("late\r");
        stream.write_line("later");
        stream.flush().await.unwrap();

        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_read_returns_pending_data_after_disposal() {
        let (mut stream, remote) = stream().await;
        remote.feed(b"tail");
        sleep(Duration::from_millis(50)).await;
        remote.feed_closed();
        sleep(Duration::from_millis(50)).await;
        assert!(stream.is_disposed());

        // Data that arrived before the close is still readable...
        assert_eq!(stream.read(GENEROUS).await.unwrap(), Some("tail".to_string()));
        // ...and once drained, reads resolve to None without waiting.
        assert_eq!(stream.read(GENEROUS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_data_available_tracks_the_buffer() {
        let (mut stream, remote) = stream().await;
        assert!(!stream.data_available());

        remote.feed(b"x");
        sleep(Duration::from_millis(50)).await;
        assert!(stream.data_available());

        stream.read(GENEROUS).await.unwrap();
        assert!(!stream.data_available());
    }

    #[tokio::test]
    async fn test_construction_fails_when_pty_is_refused() {
        let (mut channel, _remote) = mock();
        channel.refuse_pty = true;
        assert!(ShellStream::new(channel, TerminalConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_construction_fails_when_shell_is_refused() {
        let (mut channel, _remote) = mock();
        channel.refuse_shell = true;
        assert!(ShellStream::new(channel, TerminalConfig::default()).await.is_err());
    }
}
