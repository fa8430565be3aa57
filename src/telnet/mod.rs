//! Telnet framing (RFC 854) and TN5250E option negotiation.

pub mod framer;
pub mod negotiator;

pub use framer::{FramerEvent, TelnetFramer};
pub use negotiator::{Negotiator, NegotiatorOutcome};

/// Interpret-As-Command escape byte.
pub const IAC: u8 = 0xFF;
/// End-of-record marker, `IAC EOR`.
pub const EOR: u8 = 0xEF;
/// Begin sub-negotiation.
pub const SB: u8 = 0xFA;
/// End sub-negotiation.
pub const SE: u8 = 0xF0;
pub const WILL: u8 = 0xFB;
pub const WONT: u8 = 0xFC;
pub const DO: u8 = 0xFD;
pub const DONT: u8 = 0xFE;

/// Telnet options this crate negotiates (spec §6).
pub const OPT_BINARY: u8 = 0;
pub const OPT_SGA: u8 = 3;
pub const OPT_TERMINAL_TYPE: u8 = 24;
pub const OPT_EOR: u8 = 25;
pub const OPT_NEW_ENVIRON: u8 = 39;
/// TN5250E device sub-negotiation option ("5250-TERM").
pub const OPT_TN5250E: u8 = 0x2A;
