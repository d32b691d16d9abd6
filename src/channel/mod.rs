//! Channel layer: buffering, pattern matching, and PTY parameters.
//!
//! This module holds the pieces the stream facade composes: the inbound
//! accumulator with its incremental decoder, the outbound write queue, the
//! expect-matcher seam, and the terminal negotiation config.

mod buffer;
mod patterns;
mod pty;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use patterns::Matcher;
pub use pty::{TerminalConfig, TerminalMode};
