//! Pseudo-terminal negotiation parameters.
//!
//! Everything here is passed through to the channel collaborator verbatim;
//! the wire encoding of the request belongs to the channel, not to us.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Terminal mode opcodes from RFC 4254 section 8.
///
/// Values are opaque to the stream core; they travel to the channel as
/// `(opcode, argument)` pairs during PTY negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalMode {
    /// Interrupt character.
    VIntr = 1,
    /// Quit character.
    VQuit = 2,
    /// Erase the character to the left of the cursor.
    VErase = 3,
    /// Kill the current input line.
    VKill = 4,
    /// End-of-file character.
    VEof = 5,
    /// Resume output.
    VStart = 8,
    /// Pause output.
    VStop = 9,
    /// Ignore CR on input.
    IgnCr = 35,
    /// Map CR to NL on input.
    ICrNl = 36,
    /// Enable output flow control.
    IXon = 38,
    /// Enable input flow control.
    IXoff = 40,
    /// Enable signal characters.
    ISig = 50,
    /// Canonicalize input lines.
    ICanon = 51,
    /// Enable echoing.
    Echo = 53,
    /// Visually erase characters.
    EchoE = 54,
    /// Echo NL after kill character.
    EchoK = 55,
    /// Echo NL even if echo is off.
    EchoNl = 56,
    /// Don't flush after interrupt.
    NoFlsh = 57,
    /// Enable output processing.
    OPost = 70,
    /// Map NL to CR-NL on output.
    OnlCr = 72,
    /// 8-bit mode.
    Cs8 = 91,
    /// Parity enable.
    ParEnb = 92,
    /// Input baud rate.
    TtyOpIspeed = 128,
    /// Output baud rate.
    TtyOpOspeed = 129,
}

impl TerminalMode {
    /// The RFC 4254 opcode value.
    pub fn opcode(self) -> u32 {
        self as u32
    }
}

/// Parameters for the pseudo-terminal request plus the stream's buffer hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Terminal name sent to the peer (the `TERM` value).
    pub term: String,

    /// Terminal width in character columns.
    pub width_columns: u32,

    /// Terminal height in rows.
    pub height_rows: u32,

    /// Terminal width in pixels (0 when unused).
    pub width_pixels: u32,

    /// Terminal height in pixels (0 when unused).
    pub height_pixels: u32,

    /// Terminal mode flags forwarded to the negotiation.
    #[serde(default)]
    pub modes: IndexMap<TerminalMode, u32>,

    /// Capacity hint for the inbound read buffer.
    pub buffer_size: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            width_columns: 511,
            height_rows: 24,
            width_pixels: 0,
            height_pixels: 0,
            modes: IndexMap::new(),
            buffer_size: 4096,
        }
    }
}

impl TerminalConfig {
    /// Create a config with the given terminal name and defaults elsewhere.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }

    /// Set a terminal mode flag.
    pub fn with_mode(mut self, mode: TerminalMode, value: u32) -> Self {
        self.modes.insert(mode, value);
        self
    }
}
