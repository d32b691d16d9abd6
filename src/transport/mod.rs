//! The channel collaborator boundary.
//!
//! A [`ChannelSession`] models an already-established secure channel: it can
//! be opened, asked for a pseudo-terminal and a shell, handed raw bytes to
//! send, and disposed. Inbound data and the close notification arrive as
//! [`ChannelEvent`]s on a feed the stream takes over at construction:
//! push-style callbacks become messages to a single consumer, so the
//! producer side never blocks.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::channel::TerminalConfig;
use crate::error::Result;

#[cfg(feature = "russh")]
mod ssh;

#[cfg(feature = "russh")]
pub use ssh::RusshChannel;

/// An event raised by the channel's background context.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A chunk of raw bytes arrived from the peer.
    Data(Bytes),

    /// The channel closed; no further events follow.
    Closed,
}

/// Contract consumed by [`ShellStream`](crate::ShellStream).
///
/// Implementations wrap a concrete transport (see `RusshChannel` behind the
/// `russh` feature); tests substitute a mock.
pub trait ChannelSession: Send {
    /// Open the underlying channel.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Request a pseudo-terminal with the given parameters.
    ///
    /// Returns `false` if the peer refuses the request.
    fn request_pty(
        &mut self,
        config: &TerminalConfig,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Request a shell on the channel.
    ///
    /// Returns `false` if the peer refuses the request.
    fn request_shell(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Send raw bytes to the peer.
    fn send_data(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Hand over the channel's event feed.
    ///
    /// Called exactly once, after the shell request succeeds. Data and the
    /// close notification are delivered in arrival order; the feed ends
    /// after [`ChannelEvent::Closed`].
    fn subscribe(&mut self) -> UnboundedReceiver<ChannelEvent>;

    /// Dispose the channel, releasing transport resources.
    fn dispose(&mut self) -> impl Future<Output = ()> + Send;
}
