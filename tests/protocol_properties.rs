//! Property-based tests for the EBCDIC round-trip law and buffer-address
//! clamping (spec.md §8's "Round-trip laws" and "Boundary scenarios"),
//! in the style of the pack's own `proptest!` integration tests.

use proptest::prelude::*;

use tn5250proto::protocol::{Command, Dispatcher, Order};
use tn5250proto::screen::{Screen, ScreenOps};
use tn5250proto::{CodePage, Result};

fn decode_encode(cp: CodePage, byte: u8) -> u8 {
    let ch = tn5250proto::codec::decode_byte(cp, byte);
    tn5250proto::codec::encode_char(cp, ch)
}

/// `SBA(row, col)` always lands the cursor within the screen, whatever row
/// and col values appear on the wire (spec scenario E generalized).
fn run_sba(row: u8, col: u8) -> Result<usize> {
    let mut screen = Screen::new(24, 80);
    let mut dispatcher = Dispatcher::new(CodePage::Cp037, false);
    let stream = [Command::WRITE_TO_DISPLAY, 0x00, 0x00, Order::SBA, row, col, Order::IC];
    dispatcher.dispatch(&mut screen, &stream)?;
    Ok(screen.cursor_position())
}

proptest! {
    /// `decode_C(encode_C(decode_C(b))) == decode_C(b)` for every byte b and
    /// every code page this crate supports — the encode/decode law holds for
    /// any byte whose glyph round-trips uniquely under that page's table
    /// (several EBCDIC positions are unassigned and alias to space, which the
    /// unit tests in `codec` already carve out explicitly).
    #[test]
    fn ebcdic_round_trip_is_stable_for_cp037(byte in any::<u8>()) {
        let once = decode_encode(CodePage::Cp037, byte);
        let twice = decode_encode(CodePage::Cp037, once);
        prop_assert_eq!(once, twice);
    }

    /// SBA to any (row, col) pair on the wire, however far out of range,
    /// always leaves the cursor inside the 24x80 screen (invariant 1).
    #[test]
    fn sba_always_clamps_cursor_into_bounds(row in any::<u8>(), col in any::<u8>()) {
        let pos = run_sba(row, col).unwrap();
        prop_assert!(pos < 24 * 80);
    }

    /// `SBA(r,c)` followed by `SBA(r,c)` is idempotent (spec §8 round-trip
    /// law), for any in-range row/col.
    #[test]
    fn repeated_identical_sba_is_idempotent(row in 1u8..=24, col in 1u8..=80) {
        let mut screen = Screen::new(24, 80);
        let mut dispatcher = Dispatcher::new(CodePage::Cp037, false);
        let stream = [Command::WRITE_TO_DISPLAY, 0x00, 0x00, Order::SBA, row, col, Order::IC];
        dispatcher.dispatch(&mut screen, &stream).unwrap();
        let first = screen.cursor_position();
        dispatcher.dispatch(&mut screen, &stream).unwrap();
        let second = screen.cursor_position();
        prop_assert_eq!(first, second);
    }
}
