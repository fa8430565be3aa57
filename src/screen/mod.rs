//! The screen model: planes, field table, cursor, OIA, and save stack,
//! composed behind the `ScreenOps`/`FieldOps` capability traits called for
//! by spec §9 ("deep inheritance of screen test doubles" in the reference
//! is replaced here with alternative trait implementations rather than
//! subclassing a concrete `Screen`).

pub mod cursor;
pub mod field;
pub mod oia;
pub mod planes;
pub mod save_stack;

use crate::error::Result;
use cursor::Cursor;
use field::{Field, FieldTable};
use oia::Oia;
use planes::{Planes, RowSnapshot};
use save_stack::SaveStack;

/// A full point-in-time copy of everything a save/restore order must
/// round-trip: planes, cursor, fields, and OIA (spec §8 round-trip law).
#[derive(Debug, Clone)]
pub struct Snapshot {
    planes: Planes,
    cursor: Cursor,
    fields: FieldTable,
    oia: Oia,
}

/// Capability interface for the order dispatcher's screen-mutating side.
/// Implemented by [`Screen`]; a test can supply any other implementation
/// without subclassing.
pub trait ScreenOps {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn set_char(&mut self, pos: usize, ch: char) -> Result<()>;
    fn glyph_at(&self, pos: usize) -> Result<char>;
    fn gui_hint_at(&self, pos: usize) -> Result<planes::GuiHint>;
    fn set_attribute(&mut self, pos: usize, code: u8) -> Result<()>;
    fn fill_range(&mut self, from: usize, to: usize, ch: char) -> Result<()>;
    fn erase_range(&mut self, from: usize, to: usize) -> Result<()>;
    fn roll(&mut self, lines: i32) -> Result<()>;
    fn clear_planes(&mut self);
    fn row_col_to_pos(&self, row: usize, col: usize) -> Result<usize>;
    fn clamp_row_col(&self, row: usize, col: usize) -> (usize, usize);

    fn cursor_position(&self) -> usize;
    fn set_cursor_position(&mut self, pos: usize);
    fn cursor_home(&mut self);

    fn oia(&self) -> &Oia;
    fn oia_mut(&mut self) -> &mut Oia;

    fn save_error_line(&mut self) -> Result<()>;
    fn restore_error_line(&mut self) -> Result<()>;

    fn push_save_stack(&mut self) -> Result<()>;
    fn pop_save_stack(&mut self) -> Result<()>;
    fn save_stack_depth(&self) -> usize;
}

/// Capability interface for field-table operations, kept separate from
/// `ScreenOps` per spec §9 so dispatcher code that only manipulates fields
/// can be exercised against a field-only stub.
pub trait FieldOps {
    fn add_field(&mut self, attr_pos: usize, length: usize, ffw1: u8, ffw2: u8, fcw1: u8, fcw2: u8) -> usize;
    fn find_field_at(&self, pos: usize) -> Option<&Field>;
    fn index_of_field_at(&self, pos: usize) -> Option<usize>;
    fn field_count(&self) -> usize;
    fn field_at_index(&self, idx: usize) -> Option<&Field>;
    fn field_at_index_mut(&mut self, idx: usize) -> Option<&mut Field>;
    fn next_field(&self, pos: usize) -> Option<usize>;
    fn prev_field(&self, pos: usize) -> Option<usize>;
    fn collect_modified_indices(&self) -> Vec<usize>;
    fn clear_fields(&mut self);
}

/// The concrete, owned screen model: one per session.
#[derive(Debug, Clone)]
pub struct Screen {
    planes: Planes,
    fields: FieldTable,
    cursor: Cursor,
    oia: Oia,
    save_stack: SaveStack<Snapshot>,
    error_line: Option<RowSnapshot>,
}

impl Screen {
    pub fn new(rows: usize, cols: usize) -> Self {
        Screen {
            planes: Planes::new(rows, cols),
            fields: FieldTable::new(),
            cursor: Cursor::new(0),
            oia: Oia::new(),
            save_stack: SaveStack::new(),
            error_line: None,
        }
    }

    pub fn planes(&self) -> &Planes {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut Planes {
        &mut self.planes
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldTable {
        &mut self.fields
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Clear Unit (spec §4.3): reset planes, clear fields, cursor to home,
    /// OIA cleared. Per DESIGN.md's Open Question 2 resolution, this also
    /// resets any pending SOH header state the dispatcher holds — that
    /// reset happens in the dispatcher, which owns header state.
    pub fn clear_unit(&mut self) {
        self.planes.clear_all();
        self.fields.clear_all();
        self.cursor = Cursor::new(0);
        self.oia.reset();
        self.error_line = None;
    }

    /// Scans for the first non-protected (non-bypass) position, used by
    /// Home when no input field exists.
    pub fn first_input_field_start(&self) -> Option<usize> {
        self.fields.iter().find(|f| !f.is_bypass()).map(|f| f.start_pos())
    }
}

impl ScreenOps for Screen {
    fn rows(&self) -> usize {
        self.planes.rows()
    }

    fn cols(&self) -> usize {
        self.planes.cols()
    }

    fn set_char(&mut self, pos: usize, ch: char) -> Result<()> {
        self.planes.set_char(pos, ch)
    }

    fn glyph_at(&self, pos: usize) -> Result<char> {
        self.planes.glyph_at(pos)
    }

    fn gui_hint_at(&self, pos: usize) -> Result<planes::GuiHint> {
        self.planes.gui_hint_at(pos)
    }

    fn set_attribute(&mut self, pos: usize, code: u8) -> Result<()> {
        self.planes.set_attribute(pos, code)
    }

    fn fill_range(&mut self, from: usize, to: usize, ch: char) -> Result<()> {
        self.planes.fill_range(from, to, ch)
    }

    fn erase_range(&mut self, from: usize, to: usize) -> Result<()> {
        self.planes.erase_range(from, to)
    }

    fn roll(&mut self, lines: i32) -> Result<()> {
        self.planes.roll(lines)
    }

    fn clear_planes(&mut self) {
        self.planes.clear_all();
    }

    fn row_col_to_pos(&self, row: usize, col: usize) -> Result<usize> {
        self.planes.row_col_to_pos(row, col)
    }

    fn clamp_row_col(&self, row: usize, col: usize) -> (usize, usize) {
        self.planes.clamp_row_col(row, col)
    }

    fn cursor_position(&self) -> usize {
        self.cursor.position()
    }

    fn set_cursor_position(&mut self, pos: usize) {
        let bound = self.planes.len();
        self.cursor.set_position(pos, bound);
    }

    fn cursor_home(&mut self) {
        self.cursor.go_home();
    }

    fn oia(&self) -> &Oia {
        &self.oia
    }

    fn oia_mut(&mut self) -> &mut Oia {
        &mut self.oia
    }

    fn save_error_line(&mut self) -> Result<()> {
        if self.error_line.is_none() {
            let last_row = self.planes.rows().saturating_sub(1);
            self.error_line = Some(self.planes.snapshot_row(last_row)?);
        }
        Ok(())
    }

    fn restore_error_line(&mut self) -> Result<()> {
        if let Some(snapshot) = self.error_line.take() {
            let last_row = self.planes.rows().saturating_sub(1);
            self.planes.restore_row(last_row, &snapshot)?;
        }
        Ok(())
    }

    fn push_save_stack(&mut self) -> Result<()> {
        let snapshot = Snapshot {
            planes: self.planes.clone(),
            cursor: self.cursor,
            fields: self.fields.clone(),
            oia: self.oia.clone(),
        };
        self.save_stack.push(snapshot)
    }

    fn pop_save_stack(&mut self) -> Result<()> {
        let snapshot = self.save_stack.pop()?;
        self.planes = snapshot.planes;
        self.cursor = snapshot.cursor;
        self.fields = snapshot.fields;
        self.oia = snapshot.oia;
        Ok(())
    }

    fn save_stack_depth(&self) -> usize {
        self.save_stack.depth()
    }
}

impl FieldOps for Screen {
    fn add_field(&mut self, attr_pos: usize, length: usize, ffw1: u8, ffw2: u8, fcw1: u8, fcw2: u8) -> usize {
        self.fields.add_field(attr_pos, length, ffw1, ffw2, fcw1, fcw2)
    }

    fn find_field_at(&self, pos: usize) -> Option<&Field> {
        self.fields.find_field_at(pos)
    }

    fn index_of_field_at(&self, pos: usize) -> Option<usize> {
        self.fields.index_of_field_at(pos)
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field_at_index(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    fn field_at_index_mut(&mut self, idx: usize) -> Option<&mut Field> {
        self.fields.get_mut(idx)
    }

    fn next_field(&self, pos: usize) -> Option<usize> {
        self.fields.next(pos)
    }

    fn prev_field(&self, pos: usize) -> Option<usize> {
        self.fields.prev(pos)
    }

    fn collect_modified_indices(&self) -> Vec<usize> {
        self.fields.iter().enumerate().filter(|(_, f)| f.is_modified()).map(|(i, _)| i).collect()
    }

    fn clear_fields(&mut self) {
        self.fields.clear_all();
    }
}

pub use planes::Color as ScreenColor;
pub use planes::Modifiers as ScreenModifiers;
pub use oia::InhibitReason as OiaInhibitReason;

#[cfg(test)]
mod tests {
    use super::*;

    /// Save/restore round-trip law (spec §8).
    #[test]
    fn save_then_mutate_then_restore_round_trips() {
        let mut screen = Screen::new(24, 80);
        screen.set_char(0, 'A').unwrap();
        screen.push_save_stack().unwrap();
        screen.set_char(0, 'B').unwrap();
        screen.add_field(5, 3, 0, 0, 0, 0);
        screen.pop_save_stack().unwrap();
        assert_eq!(screen.glyph_at(0).unwrap(), 'A');
        assert_eq!(screen.field_count(), 0);
    }

    #[test]
    fn clear_unit_resets_cursor_fields_and_oia() {
        let mut screen = Screen::new(24, 80);
        screen.add_field(5, 3, 0, 0, 0, 0);
        screen.set_cursor_position(42);
        screen.oia_mut().lock_keyboard();
        screen.clear_unit();
        assert_eq!(screen.field_count(), 0);
        assert_eq!(screen.cursor_position(), 0);
        assert!(!screen.oia().keyboard_locked());
    }

    #[test]
    fn double_save_error_line_is_a_no_op() {
        let mut screen = Screen::new(2, 4);
        screen.set_char(4, 'X').unwrap();
        screen.save_error_line().unwrap();
        screen.set_char(4, 'Y').unwrap();
        screen.save_error_line().unwrap(); // first save wins
        screen.restore_error_line().unwrap();
        assert_eq!(screen.glyph_at(4).unwrap(), 'X');
    }
}
