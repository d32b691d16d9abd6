//! Error types for shellstream.
//!
//! Timeouts and disposal-during-a-wait are deliberately *not* errors: the
//! read and expect operations surface them as `None`/zero results instead.

use thiserror::Error;

/// Main error type for shellstream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (sending on the underlying channel)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel negotiation and lifecycle errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Transport layer errors raised by the channel collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH protocol error from the russh binding
    #[cfg(feature = "russh")]
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,
}

/// Channel layer errors (negotiation, lifecycle).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The peer refused the pseudo-terminal request
    #[error("Failed to open PTY channel")]
    PtyOpenFailed,

    /// The peer refused the shell request
    #[error("Failed to request shell")]
    ShellRequestFailed,

    /// Operation attempted before the channel was opened
    #[error("Channel not open - call open() first")]
    NotOpen,

    /// Stream already disposed
    #[error("Channel closed")]
    Closed,
}

/// Result type alias using shellstream's Error.
pub type Result<T> = std::result::Result<T, Error>;
