//! The input engine (spec §4.7): turns key events into screen mutations,
//! cursor motion, and outbound AID triggers.
//!
//! The reference's closest analogue, `field_manager::FieldManager`, detects
//! fields by scanning rendered text for underscores and colons and keeps its
//! own `Field` structs with a `get_display_content`/`validate` pair instead
//! of consulting a field table built from `SF` orders. This module instead
//! drives the field table and planes built by [`crate::screen`], reusing
//! [`crate::protocol::dispatcher::Dispatcher::validate_input_char`] for
//! per-character validation so input-time and field-declaration semantics
//! stay in one place. `FieldManager::next_field`/`previous_field`/
//! `type_char`/`backspace` supplied the operation *shapes* this module's
//! `tab`/`back_tab`/`type_char`/`backspace` follow.

use crate::error::{FieldRejectReason, Result, Tn5250Error};
use crate::protocol::codes::AidKey;
use crate::protocol::dispatcher::Dispatcher;
use crate::screen::oia::InhibitReason;
use crate::screen::{FieldOps, ScreenOps};

/// One key event delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyEvent {
    Char(char),
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    Tab,
    BackTab,
    Home,
    FieldExit,
    EraseEof,
    DupFieldFill(char),
    Backspace,
    ToggleInsert,
    Reset,
    Aid(AidKey),
}

/// What handling a key event did.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// The event was applied to the screen; no outbound traffic is implied.
    Accepted,
    /// The event was refused outright; nothing changed.
    Rejected(Tn5250Error),
    /// An AID key was pressed; the caller (session controller) must still
    /// build and transmit the response via [`Dispatcher::handle_aid`].
    AidTriggered(AidKey),
}

/// The keyboard's logical state (spec §4.7), derived from OIA rather than
/// tracked independently — OIA is the single source of truth for
/// lock/inhibit state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardState {
    Ready,
    Locked,
    InhibitedSystemWait,
    InhibitedError(InhibitReason),
}

/// Reads the keyboard's current logical state off an OIA snapshot.
pub fn keyboard_state(oia: &crate::screen::oia::Oia) -> KeyboardState {
    match oia.inhibit_reason() {
        InhibitReason::NotInhibited => {
            if oia.keyboard_locked() {
                KeyboardState::Locked
            } else {
                KeyboardState::Ready
            }
        }
        InhibitReason::SystemWait => KeyboardState::InhibitedSystemWait,
        other => KeyboardState::InhibitedError(other),
    }
}

/// Stateless dispatcher from [`KeyEvent`] to screen mutation. One instance is
/// shared across a session; it holds no per-field state of its own (spec §9:
/// fields are plain values, the engine takes the screen as an explicit
/// parameter rather than owning or wrapping it).
#[derive(Debug, Default)]
pub struct InputEngine;

impl InputEngine {
    pub fn new() -> Self {
        InputEngine
    }

    /// Top-level entry point: routes one key event to the matching handler.
    pub fn handle_key<S: ScreenOps + FieldOps>(&self, screen: &mut S, event: KeyEvent) -> Result<InputOutcome> {
        match event {
            KeyEvent::Char(ch) => self.type_char(screen, ch),
            KeyEvent::CursorLeft => self.move_cursor(screen, Direction::Left),
            KeyEvent::CursorRight => self.move_cursor(screen, Direction::Right),
            KeyEvent::CursorUp => self.move_cursor(screen, Direction::Up),
            KeyEvent::CursorDown => self.move_cursor(screen, Direction::Down),
            KeyEvent::Tab => self.tab(screen),
            KeyEvent::BackTab => self.back_tab(screen),
            KeyEvent::Home => self.home(screen),
            KeyEvent::FieldExit => self.field_exit(screen),
            KeyEvent::EraseEof => self.erase_eof(screen),
            KeyEvent::DupFieldFill(ch) => self.dup_field_fill(screen, ch),
            KeyEvent::Backspace => self.backspace(screen),
            KeyEvent::ToggleInsert => self.toggle_insert(screen),
            KeyEvent::Reset => self.reset(screen),
            KeyEvent::Aid(key) => self.aid(screen, key),
        }
    }

    /// Data-key entry (spec §4.7): keyboard lock rejects it outright,
    /// otherwise the governing field validates the character, insert or
    /// overwrite mode decides how it lands, and the cursor advances.
    fn type_char<S: ScreenOps + FieldOps>(&self, screen: &mut S, ch: char) -> Result<InputOutcome> {
        if screen.oia().keyboard_locked() {
            return Ok(InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
        }
        let pos = screen.cursor_position();
        let idx = match screen.index_of_field_at(pos) {
            Some(idx) => idx,
            None => return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Bypass })),
        };
        let field = screen.field_at_index(idx).expect("index_of_field_at returned a valid index").clone();
        let ch = match Dispatcher::validate_input_char(&field, ch) {
            Ok(ch) => ch,
            Err(e) => return Ok(InputOutcome::Rejected(e)),
        };

        if screen.oia().insert_mode() {
            let last = field.end_pos();
            let tail_char = screen.glyph_at(last)?;
            if tail_char != ' ' {
                screen.oia_mut().lock_keyboard();
                return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Full }));
            }
            let mut cursor = last;
            while cursor > pos {
                let prev = screen.glyph_at(cursor - 1)?;
                screen.set_char(cursor, prev)?;
                cursor -= 1;
            }
        }
        screen.set_char(pos, ch)?;
        if let Some(f) = screen.field_at_index_mut(idx) {
            f.set_modified(true);
        }

        if pos >= field.end_pos() {
            if field.is_auto_enter() {
                return Ok(InputOutcome::AidTriggered(AidKey::Enter));
            }
            if field.is_fer() {
                screen.oia_mut().lock_keyboard();
                return Ok(InputOutcome::Accepted);
            }
            if let Some(next_idx) = screen.next_field(pos) {
                if let Some(next) = screen.field_at_index(next_idx) {
                    screen.set_cursor_position(next.start_pos());
                }
            }
        } else {
            screen.set_cursor_position(pos + 1);
        }
        Ok(InputOutcome::Accepted)
    }

    /// Backspace: in insert mode, shifts the field's tail left by one and
    /// blanks the vacated last position; otherwise just moves the cursor
    /// back one position within the field.
    fn backspace<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        if screen.oia().keyboard_locked() {
            return Ok(InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
        }
        let pos = screen.cursor_position();
        let idx = match screen.index_of_field_at(pos) {
            Some(idx) => idx,
            None => return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Bypass })),
        };
        let field = screen.field_at_index(idx).expect("index_of_field_at returned a valid index").clone();
        if pos <= field.start_pos() {
            return Ok(InputOutcome::Accepted);
        }
        let prev_pos = pos - 1;
        if screen.oia().insert_mode() {
            let end = field.end_pos();
            let mut cursor = prev_pos;
            while cursor < end {
                let next_char = screen.glyph_at(cursor + 1)?;
                screen.set_char(cursor, next_char)?;
                cursor += 1;
            }
            screen.set_char(end, ' ')?;
        }
        if let Some(f) = screen.field_at_index_mut(idx) {
            f.set_modified(true);
        }
        screen.set_cursor_position(prev_pos);
        Ok(InputOutcome::Accepted)
    }

    /// Cursor motion with screen-edge wraparound (spec §4.7): left from
    /// column 0 wraps to the previous row's last column (and up from row 0
    /// wraps to the last row), with right/down mirroring symmetrically.
    fn move_cursor<S: ScreenOps>(&self, screen: &mut S, dir: Direction) -> Result<InputOutcome> {
        let cols = screen.cols().max(1);
        let rows = screen.rows().max(1);
        let pos = screen.cursor_position();
        let row = pos / cols;
        let col = pos % cols;
        let (new_row, new_col) = match dir {
            Direction::Left => {
                if col == 0 {
                    (if row == 0 { rows - 1 } else { row - 1 }, cols - 1)
                } else {
                    (row, col - 1)
                }
            }
            Direction::Right => {
                if col + 1 >= cols {
                    (if row + 1 >= rows { 0 } else { row + 1 }, 0)
                } else {
                    (row, col + 1)
                }
            }
            Direction::Up => (if row == 0 { rows - 1 } else { row - 1 }, col),
            Direction::Down => (if row + 1 >= rows { 0 } else { row + 1 }, col),
        };
        screen.set_cursor_position(new_row * cols + new_col);
        Ok(InputOutcome::Accepted)
    }

    /// Tab: advances to the next input field's start position, honoring a
    /// field's cursor-progression override via [`FieldOps::next_field`].
    fn tab<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        let pos = screen.cursor_position();
        if let Some(idx) = screen.next_field(pos) {
            if let Some(field) = screen.field_at_index(idx) {
                screen.set_cursor_position(field.start_pos());
            }
        }
        Ok(InputOutcome::Accepted)
    }

    fn back_tab<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        let pos = screen.cursor_position();
        if let Some(idx) = screen.prev_field(pos) {
            if let Some(field) = screen.field_at_index(idx) {
                screen.set_cursor_position(field.start_pos());
            }
        }
        Ok(InputOutcome::Accepted)
    }

    /// Home: the first non-bypass field's start position, or (0,0) if the
    /// screen has no input fields at all.
    fn home<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        let target = (0..screen.field_count())
            .filter_map(|i| screen.field_at_index(i))
            .find(|f| !f.is_bypass())
            .map(|f| f.start_pos())
            .unwrap_or(0);
        screen.set_cursor_position(target);
        Ok(InputOutcome::Accepted)
    }

    /// Field Exit: blank-fills the remainder of the current field, sets MDT,
    /// and advances to the next field (spec §4.7).
    fn field_exit<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        if screen.oia().keyboard_locked() {
            return Ok(InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
        }
        let pos = screen.cursor_position();
        let idx = match screen.index_of_field_at(pos) {
            Some(idx) => idx,
            None => return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Bypass })),
        };
        let end = screen.field_at_index(idx).expect("index_of_field_at returned a valid index").end_pos();
        for p in pos..=end {
            screen.set_char(p, ' ')?;
        }
        if let Some(f) = screen.field_at_index_mut(idx) {
            f.set_modified(true);
        }
        if let Some(next_idx) = screen.next_field(pos) {
            if let Some(field) = screen.field_at_index(next_idx) {
                screen.set_cursor_position(field.start_pos());
            }
        }
        Ok(InputOutcome::Accepted)
    }

    /// Erase-EOF: blanks from the cursor to the end of the governing field.
    fn erase_eof<S: ScreenOps + FieldOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        if screen.oia().keyboard_locked() {
            return Ok(InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
        }
        let pos = screen.cursor_position();
        let idx = match screen.index_of_field_at(pos) {
            Some(idx) => idx,
            None => return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Bypass })),
        };
        let end = screen.field_at_index(idx).expect("index_of_field_at returned a valid index").end_pos();
        for p in pos..=end {
            screen.set_char(p, ' ')?;
        }
        if let Some(f) = screen.field_at_index_mut(idx) {
            f.set_modified(true);
        }
        Ok(InputOutcome::Accepted)
    }

    /// Dup/field-fill: fills every data cell in the field with `ch` (the
    /// duplicate-character or field-mark byte the caller has already decoded).
    fn dup_field_fill<S: ScreenOps + FieldOps>(&self, screen: &mut S, ch: char) -> Result<InputOutcome> {
        if screen.oia().keyboard_locked() {
            return Ok(InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
        }
        let pos = screen.cursor_position();
        let idx = match screen.index_of_field_at(pos) {
            Some(idx) => idx,
            None => return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Bypass })),
        };
        let field = screen.field_at_index(idx).expect("index_of_field_at returned a valid index").clone();
        if !field.is_dup_enabled() {
            return Ok(InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::InvalidChar }));
        }
        for p in field.start_pos()..=field.end_pos() {
            screen.set_char(p, ch)?;
        }
        if let Some(f) = screen.field_at_index_mut(idx) {
            f.set_modified(true);
        }
        if let Some(next_idx) = screen.next_field(pos) {
            if let Some(next) = screen.field_at_index(next_idx) {
                screen.set_cursor_position(next.start_pos());
            }
        }
        Ok(InputOutcome::Accepted)
    }

    fn toggle_insert<S: ScreenOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        let current = screen.oia().insert_mode();
        screen.oia_mut().set_insert_mode(!current);
        Ok(InputOutcome::Accepted)
    }

    /// Reset clears an error-level inhibit but leaves a system-wait inhibit
    /// alone (spec §4.7: the host, not the user, lifts a system-wait).
    fn reset<S: ScreenOps>(&self, screen: &mut S) -> Result<InputOutcome> {
        if screen.oia().inhibit_reason() != InhibitReason::SystemWait {
            screen.oia_mut().unlock_keyboard();
        }
        Ok(InputOutcome::Accepted)
    }

    /// AID keys are accepted regardless of keyboard-lock state — real 5250
    /// keyboards let Attn/SysReq/Reset-adjacent keys through even while
    /// locked. Response encoding is left to the caller
    /// ([`Dispatcher::handle_aid`]) since it needs the collection-mode state
    /// the dispatcher owns.
    fn aid<S: ScreenOps>(&self, _screen: &mut S, key: AidKey) -> Result<InputOutcome> {
        Ok(InputOutcome::AidTriggered(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::Screen;

    fn numeric_field_screen() -> Screen {
        let mut screen = Screen::new(2, 4);
        screen.add_field(0, 3, 0x60, 0, 0, 0); // numeric, 3 chars starting at pos 1
        screen.set_cursor_position(1);
        screen
    }

    #[test]
    fn typing_a_digit_advances_the_cursor() {
        let engine = InputEngine::new();
        let mut screen = numeric_field_screen();
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('5')).unwrap();
        assert_eq!(outcome, InputOutcome::Accepted);
        assert_eq!(screen.glyph_at(1).unwrap(), '5');
        assert_eq!(screen.cursor_position(), 2);
    }

    #[test]
    fn non_digit_is_rejected_in_a_numeric_field() {
        let engine = InputEngine::new();
        let mut screen = numeric_field_screen();
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('Q')).unwrap();
        assert_eq!(outcome, InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::InvalidChar }));
    }

    #[test]
    fn locked_keyboard_rejects_data_keys() {
        let engine = InputEngine::new();
        let mut screen = numeric_field_screen();
        screen.oia_mut().lock_keyboard();
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('1')).unwrap();
        assert_eq!(outcome, InputOutcome::Rejected(Tn5250Error::KeyboardLocked));
    }

    #[test]
    fn cursor_left_from_column_zero_wraps_to_previous_row() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(2, 4);
        screen.set_cursor_position(4); // row 1, col 0
        engine.handle_key(&mut screen, KeyEvent::CursorLeft).unwrap();
        assert_eq!(screen.cursor_position(), 3); // row 0, col 3
    }

    #[test]
    fn cursor_up_from_row_zero_wraps_to_last_row() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(2, 4);
        screen.set_cursor_position(1);
        engine.handle_key(&mut screen, KeyEvent::CursorUp).unwrap();
        assert_eq!(screen.cursor_position(), 5); // last row, same column
    }

    #[test]
    fn tab_advances_to_next_field_start() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(2, 8);
        screen.add_field(0, 2, 0, 0, 0, 0);
        screen.add_field(4, 2, 0, 0, 0, 0);
        screen.set_cursor_position(1);
        engine.handle_key(&mut screen, KeyEvent::Tab).unwrap();
        assert_eq!(screen.cursor_position(), 5);
    }

    #[test]
    fn home_with_no_fields_goes_to_zero() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(2, 4);
        screen.set_cursor_position(6);
        engine.handle_key(&mut screen, KeyEvent::Home).unwrap();
        assert_eq!(screen.cursor_position(), 0);
    }

    #[test]
    fn home_skips_bypass_fields() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(2, 8);
        screen.add_field(0, 2, 0x10, 0, 0, 0); // bypass
        screen.add_field(4, 2, 0, 0, 0, 0);
        screen.set_cursor_position(7);
        engine.handle_key(&mut screen, KeyEvent::Home).unwrap();
        assert_eq!(screen.cursor_position(), 5);
    }

    #[test]
    fn field_exit_blanks_remainder_and_sets_modified() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(1, 6);
        screen.add_field(0, 5, 0, 0, 0, 0);
        screen.set_char(1, 'A').unwrap();
        screen.set_char(2, 'B').unwrap();
        screen.set_cursor_position(2);
        engine.handle_key(&mut screen, KeyEvent::FieldExit).unwrap();
        assert_eq!(screen.glyph_at(2).unwrap(), ' ');
        assert_eq!(screen.glyph_at(1).unwrap(), 'A');
        assert!(screen.field_at_index(0).unwrap().is_modified());
    }

    #[test]
    fn fer_field_locks_keyboard_at_field_end() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(1, 4);
        screen.add_field(0, 1, 0, 0x80, 0, 0); // FER set, 1-char field
        screen.set_cursor_position(1);
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('X')).unwrap();
        assert_eq!(outcome, InputOutcome::Accepted);
        assert!(screen.oia().keyboard_locked());
    }

    #[test]
    fn auto_enter_field_triggers_enter_aid_at_field_end() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(1, 4);
        screen.add_field(0, 1, 0x01, 0, 0, 0); // auto-enter, 1-char field
        screen.set_cursor_position(1);
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('X')).unwrap();
        assert_eq!(outcome, InputOutcome::AidTriggered(AidKey::Enter));
    }

    #[test]
    fn insert_mode_shifts_tail_right_and_overflow_locks_keyboard() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(1, 5);
        screen.add_field(0, 4, 0, 0, 0, 0);
        screen.oia_mut().set_insert_mode(true);
        screen.set_char(1, 'A').unwrap();
        screen.set_char(2, 'B').unwrap();
        screen.set_cursor_position(1);
        engine.handle_key(&mut screen, KeyEvent::Char('X')).unwrap();
        assert_eq!(screen.glyph_at(1).unwrap(), 'X');
        assert_eq!(screen.glyph_at(2).unwrap(), 'A');
        assert_eq!(screen.glyph_at(3).unwrap(), 'B');

        // Field is now full (no trailing space); one more insert overflows.
        let outcome = engine.handle_key(&mut screen, KeyEvent::Char('Y')).unwrap();
        assert_eq!(outcome, InputOutcome::Rejected(Tn5250Error::FieldRejected { reason: FieldRejectReason::Full }));
        assert!(screen.oia().keyboard_locked());
    }

    #[test]
    fn reset_unlocks_keyboard_unless_system_wait() {
        let engine = InputEngine::new();
        let mut screen = Screen::new(1, 4);
        screen.oia_mut().inhibit(InhibitReason::ProgCheck);
        engine.handle_key(&mut screen, KeyEvent::Reset).unwrap();
        assert!(!screen.oia().keyboard_locked());

        screen.oia_mut().inhibit(InhibitReason::SystemWait);
        engine.handle_key(&mut screen, KeyEvent::Reset).unwrap();
        assert!(screen.oia().keyboard_locked());
    }
}
