//! # Shellstream
//!
//! Expect-style shell stream adapter for SSH PTY channels.
//!
//! Shellstream sits on top of an already-established secure channel (one
//! that delivers raw byte chunks asynchronously and accepts raw byte sends)
//! and turns it into the line- and pattern-oriented read/write API of classic
//! "expect" automation tools.
//!
//! ## Features
//!
//! - Blocking-with-timeout reads (`read`, `read_line`, `expect`) over an
//!   asynchronous chunk feed, without data loss
//! - Multi-byte-safe incremental UTF-8 decoding across chunk boundaries
//! - Write buffering with flush-before-wait ordering, so a command is on the
//!   wire before its response is awaited
//! - Prompt disposal: a closed channel unblocks any in-progress wait without
//!   waiting out its timeout
//! - Pluggable channel boundary ([`ChannelSession`]), with a built-in
//!   [russh](https://crates.io/crates/russh) binding behind the `russh`
//!   feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shellstream::{RusshChannel, ShellStream, TerminalConfig};
//! use std::time::Duration;
//!
//! // `handle` is an authenticated russh client session.
//! let channel = RusshChannel::new(handle);
//! let mut shell = ShellStream::new(channel, TerminalConfig::default()).await?;
//!
//! shell.expect("$ ", Some(Duration::from_secs(10))).await?;
//! shell.write_line("uname -a");
//! if let Some(output) = shell.expect("$ ", Some(Duration::from_secs(10))).await? {
//!     println!("{output}");
//! }
//! shell.close().await;
//! ```

pub mod channel;
pub mod error;
pub mod stream;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Matcher, TerminalConfig, TerminalMode};
pub use error::Error;
pub use stream::ShellStream;
pub use transport::{ChannelEvent, ChannelSession};

#[cfg(feature = "russh")]
pub use transport::RusshChannel;
