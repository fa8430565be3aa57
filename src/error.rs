//! Crate-wide error types.
//!
//! Mirrors the error taxonomy of the reference `error.rs` ambient module: a
//! top-level enum wrapping domain-specific error kinds, each with a hand
//! rolled `Display` and `std::error::Error` impl plus `From` conversions, so
//! callers can use `?` across module boundaries without an intermediate
//! derive macro.

use std::fmt;
use std::io;

/// The single error type returned by every fallible operation in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tn5250Error {
    /// TCP/TLS handshake failed, or retries were exhausted.
    ConnectFailed { cause: String },
    /// Telnet or TN5250E option negotiation deadlocked or a required option
    /// was refused.
    NegotiationFailed { reason: String },
    /// One of the four session timeouts elapsed.
    Timeout { kind: TimeoutKind },
    /// The circuit breaker is open; the connect attempt was rejected without
    /// performing I/O.
    BreakerOpen,
    /// The transport reached EOF in the middle of a record.
    StreamEnded,
    /// A TN5250E record header failed validation.
    BadHeader,
    /// An unrecognized 5250 command byte.
    BadCommand(u8),
    /// An unrecognized order byte inside a Write-To-Display command.
    BadOrder(u8),
    /// A malformed Telnet sub-negotiation.
    BadSubneg,
    /// The save stack already holds the maximum of 10 entries.
    SaveStackOverflow,
    /// A restore was requested with nothing on the save stack.
    SaveStackUnderflow,
    /// A position was addressed outside the screen's `R*C` bounds and
    /// clamping was not permitted at that call site.
    NotOnScreen { pos: usize },
    /// The keyboard is locked; the input event was rejected.
    KeyboardLocked,
    /// A character or operation was rejected by field validation.
    FieldRejected { reason: FieldRejectReason },
    /// A structured field, order, or sub-negotiation this crate does not
    /// implement.
    UnsupportedFeature(String),
}

/// Which of the session's four independent timeouts fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    Connect,
    Read,
    Write,
    Inactivity,
    Keepalive,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutKind::Connect => "connect",
            TimeoutKind::Read => "read",
            TimeoutKind::Write => "write",
            TimeoutKind::Inactivity => "inactivity",
            TimeoutKind::Keepalive => "keepalive",
        };
        f.write_str(s)
    }
}

/// Why an input engine denied a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRejectReason {
    Bypass,
    InvalidChar,
    Full,
}

impl fmt::Display for FieldRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldRejectReason::Bypass => "bypass",
            FieldRejectReason::InvalidChar => "invalid-char",
            FieldRejectReason::Full => "full",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Tn5250Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tn5250Error::ConnectFailed { cause } => write!(f, "connect failed: {cause}"),
            Tn5250Error::NegotiationFailed { reason } => write!(f, "negotiation failed: {reason}"),
            Tn5250Error::Timeout { kind } => write!(f, "{kind} timeout elapsed"),
            Tn5250Error::BreakerOpen => write!(f, "circuit breaker is open"),
            Tn5250Error::StreamEnded => write!(f, "stream ended inside a record"),
            Tn5250Error::BadHeader => write!(f, "malformed record header"),
            Tn5250Error::BadCommand(b) => write!(f, "unrecognized command byte 0x{b:02X}"),
            Tn5250Error::BadOrder(b) => write!(f, "unrecognized order byte 0x{b:02X}"),
            Tn5250Error::BadSubneg => write!(f, "malformed telnet sub-negotiation"),
            Tn5250Error::SaveStackOverflow => write!(f, "save stack is full"),
            Tn5250Error::SaveStackUnderflow => write!(f, "save stack is empty"),
            Tn5250Error::NotOnScreen { pos } => write!(f, "position {pos} is outside the screen"),
            Tn5250Error::KeyboardLocked => write!(f, "keyboard is locked"),
            Tn5250Error::FieldRejected { reason } => write!(f, "field rejected input: {reason}"),
            Tn5250Error::UnsupportedFeature(what) => write!(f, "unsupported feature: {what}"),
        }
    }
}

impl std::error::Error for Tn5250Error {}

impl From<io::Error> for Tn5250Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Tn5250Error::Timeout { kind: TimeoutKind::Read },
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => Tn5250Error::ConnectFailed { cause: err.to_string() },
            io::ErrorKind::UnexpectedEof => Tn5250Error::StreamEnded,
            _ => Tn5250Error::ConnectFailed { cause: err.to_string() },
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Tn5250Error>;
