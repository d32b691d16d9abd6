//! Inbound and outbound byte buffering.
//!
//! `ReadBuffer` accumulates the raw chunks delivered by the channel and
//! maintains a decoded UTF-8 view of them. Chunk boundaries carry no meaning:
//! a multi-byte character split across two chunks is decoded exactly once,
//! after its trailing bytes arrive. `WriteBuffer` queues outbound bytes so a
//! whole command batch goes to the channel as a single send.

use std::borrow::Cow;
use std::str;

use bytes::{Bytes, BytesMut};

/// Buffer for accumulating inbound bytes with an incrementally maintained
/// decoded-text boundary.
///
/// The prefix `..decoded` is always valid UTF-8; that prefix is the text
/// view used by line and pattern reads. Bytes past the boundary are the
/// decoder carry-over: the start of a character whose remaining bytes have
/// not arrived yet.
#[derive(Debug)]
pub struct ReadBuffer {
    /// Unconsumed bytes, in arrival order.
    buf: BytesMut,

    /// Length of the decoded (valid UTF-8) prefix of `buf`.
    decoded: usize,
}

impl ReadBuffer {
    /// Create a new read buffer with the given capacity hint.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            decoded: 0,
        }
    }

    /// Append a chunk of raw bytes and advance the decoded boundary.
    ///
    /// The carry-over from the previous append is re-attempted together with
    /// the new bytes, so a character split across appends is reconstructed
    /// exactly once.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.advance_decoded();
    }

    /// Extend the decoded prefix as far as the bytes allow.
    ///
    /// Stops short of a trailing incomplete sequence (carry-over) and never
    /// advances past bytes that cannot start a valid character.
    fn advance_decoded(&mut self) {
        match str::from_utf8(&self.buf[self.decoded..]) {
            Ok(_) => self.decoded = self.buf.len(),
            Err(e) => self.decoded += e.valid_up_to(),
        }
    }

    /// The decoded text view. Does not consume.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf[..self.decoded])
    }

    /// Length in bytes of the decoded text view.
    pub fn text_len(&self) -> usize {
        self.decoded
    }

    /// Consume the first `len` bytes of the decoded view and return them.
    ///
    /// `len` must lie on a character boundary within the decoded prefix;
    /// match offsets and terminator positions always do.
    pub fn take_text(&mut self, len: usize) -> String {
        debug_assert!(len <= self.decoded);
        let taken = self.buf.split_to(len);
        self.decoded -= len;
        String::from_utf8_lossy(&taken).into_owned()
    }

    /// Consume raw bytes from the front into `dst`, returning the count.
    ///
    /// Excess bytes stay buffered for the next read. A read that stops
    /// inside a multi-byte character leaves the remaining continuation
    /// bytes invisible to the text view until raw reads drain them.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buf.len());
        if n == 0 {
            return 0;
        }
        let taken = self.buf.split_to(n);
        dst[..n].copy_from_slice(&taken);
        self.decoded = self.decoded.saturating_sub(n);
        self.revalidate();
        n
    }

    /// Shrink the decoded boundary if a raw read left it mid-character.
    fn revalidate(&mut self) {
        if let Err(e) = str::from_utf8(&self.buf[..self.decoded]) {
            self.decoded = e.valid_up_to();
        }
    }

    /// Total unconsumed bytes, carry-over included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes held back from the text view (decoder carry-over).
    pub fn pending(&self) -> usize {
        self.buf.len() - self.decoded
    }
}

/// Ordered queue of outbound bytes awaiting a flush.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    buf: BytesMut,
}

impl WriteBuffer {
    /// Create an empty write buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the UTF-8 bytes of `text`. An empty string is a no-op.
    pub fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.buf.extend_from_slice(text.as_bytes());
        }
    }

    /// Queue raw bytes, bypassing encoding.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take everything queued so far, or `None` if nothing is queued.
    ///
    /// The buffer is empty afterwards; the caller sends the returned bytes
    /// in a single channel call.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
