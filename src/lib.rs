//! Client-side IBM 5250 / TN5250E terminal protocol implementation.
//!
//! This crate implements the wire protocol and screen/field/input model a
//! 5250 terminal emulator needs, without any presentation layer: connect a
//! [`session::SessionController`] to a host, feed it keystrokes through
//! [`input::InputEngine`], and read back the resulting [`screen::Screen`].
//! Drawing the screen, handling user-facing configuration UI, and session
//! profile persistence are all left to a caller.

/// EBCDIC code page translation.
pub mod codec;

/// Session configuration: host, timeouts, retry/backoff, and circuit
/// breaker parameters.
pub mod config;

/// The crate-wide error type and its `Result` alias.
pub mod error;

/// Keyboard/field input handling: data keys, cursor motion, field
/// navigation, and AID key dispatch.
pub mod input;

/// The 5250 command/order protocol: record header, inbound dispatcher, and
/// outbound response builder.
pub mod protocol;

/// The screen model: planes, field table, cursor, OIA, and save stack.
pub mod screen;

/// The session controller: connection lifecycle, retry/backoff, circuit
/// breaker, and the negotiation/record pump.
pub mod session;

/// Telnet framing and TN5250E option negotiation.
pub mod telnet;

/// The byte-stream transport abstraction: plain TCP or TLS.
pub mod transport;

pub use codec::CodePage;
pub use config::{ScreenSize, SessionConfig, TlsMode};
pub use error::{FieldRejectReason, Result, TimeoutKind, Tn5250Error};
pub use input::{keyboard_state, InputEngine, InputOutcome, KeyEvent, KeyboardState};
pub use protocol::{AidKey, Command, Order};
pub use screen::{FieldOps, Screen, ScreenOps};
pub use session::{LifecycleState, Observer, SessionController, SessionEvent};
