//! The six parallel display planes (spec §3 "Planes").
//!
//! Grounded in the reference `lib5250::display::Display`/`TerminalScreen`
//! shape (a flat character buffer plus cursor/indicator state) but
//! reworked per spec §9: plane independence is explicit (writing `char`
//! never touches `attr`), every positional access is length-checked and
//! returns `NotOnScreen` rather than the reference's unchecked array index
//! (the reference has a confirmed out-of-bounds read at `R*C` in
//! `getWhichGUI`; this module cannot reproduce that class of bug because
//! `Planes::get`/`set` always bounds-check first).

use crate::error::{Result, Tn5250Error};

/// Display color derived from the logical attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    White,
    Red,
    Pink,
    Turquoise,
    Yellow,
    Blue,
    NonDisplay,
}

/// Rendering modifiers derived from the logical attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub reverse: bool,
    pub underline: bool,
    pub blink: bool,
    pub non_display: bool,
}

/// A GUI renderer's hint for how to draw one position, derived from color
/// and modifiers rather than stored as its own array (spec §3 lists
/// "gui-hint" among the six planes but also calls it "computed from attr";
/// this crate takes that literally and computes it on read instead of
/// keeping a seventh array in lockstep with every mutation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiHint {
    Normal,
    ReverseImage,
    Underline,
    Hidden,
}

fn derive_gui_hint(color: Color, modifiers: Modifiers) -> GuiHint {
    if modifiers.non_display || color == Color::NonDisplay {
        GuiHint::Hidden
    } else if modifiers.reverse {
        GuiHint::ReverseImage
    } else if modifiers.underline {
        GuiHint::Underline
    } else {
        GuiHint::Normal
    }
}

/// Logical 5250 attribute byte → (color, modifiers). Spec §4.4's table is a
/// subset; codes not listed here fall back to green/normal, which matches
/// how the reference renderer treats attribute bytes it doesn't recognize.
fn map_attribute(code: u8) -> (Color, Modifiers) {
    match code {
        0x20 => (Color::Green, Modifiers::default()),
        0x21 => (Color::Green, Modifiers { reverse: true, ..Default::default() }),
        0x22 => (Color::White, Modifiers::default()),
        0x24 => (Color::Green, Modifiers { underline: true, ..Default::default() }),
        0x28 => (Color::Red, Modifiers::default()),
        0x2C => (Color::Red, Modifiers { reverse: true, ..Default::default() }),
        0x30 => (Color::Turquoise, Modifiers::default()),
        0x32 => (Color::Yellow, Modifiers::default()),
        0x38 => (Color::Pink, Modifiers { non_display: true, ..Default::default() }),
        0x3A => (Color::Blue, Modifiers::default()),
        0x3F => (Color::Green, Modifiers { non_display: true, ..Default::default() }),
        _ => (Color::Green, Modifiers::default()),
    }
}

/// The six fixed-length parallel arrays backing one screen.
#[derive(Debug, Clone)]
pub struct Planes {
    rows: usize,
    cols: usize,
    char_plane: Vec<char>,
    attr_plane: Vec<u8>,
    is_attr_plane: Vec<bool>,
    extended_plane: Vec<Modifiers>,
    color_plane: Vec<Color>,
    dirty_plane: Vec<bool>,
}

impl Planes {
    pub fn new(rows: usize, cols: usize) -> Self {
        let len = rows * cols;
        Planes {
            rows,
            cols,
            char_plane: vec![' '; len],
            attr_plane: vec![0x20; len],
            is_attr_plane: vec![false; len],
            extended_plane: vec![Modifiers::default(); len],
            color_plane: vec![Color::Green; len],
            dirty_plane: vec![false; len],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invariant 1: `0 <= p < R*C`. The single checked-access chokepoint
    /// every other method routes through.
    fn check(&self, pos: usize) -> Result<usize> {
        if pos < self.len() {
            Ok(pos)
        } else {
            Err(Tn5250Error::NotOnScreen { pos })
        }
    }

    pub fn row_col_to_pos(&self, row: usize, col: usize) -> Result<usize> {
        if row < self.rows && col < self.cols {
            Ok(row * self.cols + col)
        } else {
            Err(Tn5250Error::NotOnScreen { pos: row * self.cols + col })
        }
    }

    pub fn pos_to_row_col(&self, pos: usize) -> Result<(usize, usize)> {
        let pos = self.check(pos)?;
        Ok((pos / self.cols, pos % self.cols))
    }

    /// Clamps an out-of-range row/col pair into bounds rather than failing,
    /// used by orders the spec requires to clamp (SBA, cursor placement).
    pub fn clamp_row_col(&self, row: usize, col: usize) -> (usize, usize) {
        (row.min(self.rows.saturating_sub(1)), col.min(self.cols.saturating_sub(1)))
    }

    /// The displayed glyph at `pos`: a space if the cell is an attribute
    /// position, regardless of what the char plane holds there (invariant 4).
    pub fn glyph_at(&self, pos: usize) -> Result<char> {
        let pos = self.check(pos)?;
        if self.is_attr_plane[pos] {
            Ok(' ')
        } else {
            Ok(self.char_plane[pos])
        }
    }

    pub fn raw_char_at(&self, pos: usize) -> Result<char> {
        let pos = self.check(pos)?;
        Ok(self.char_plane[pos])
    }

    pub fn set_char(&mut self, pos: usize, ch: char) -> Result<()> {
        let pos = self.check(pos)?;
        self.char_plane[pos] = ch;
        self.is_attr_plane[pos] = false;
        self.dirty_plane[pos] = true;
        Ok(())
    }

    pub fn is_attr(&self, pos: usize) -> Result<bool> {
        let pos = self.check(pos)?;
        Ok(self.is_attr_plane[pos])
    }

    pub fn attr_byte(&self, pos: usize) -> Result<u8> {
        let pos = self.check(pos)?;
        Ok(self.attr_plane[pos])
    }

    pub fn color_at(&self, pos: usize) -> Result<Color> {
        let pos = self.check(pos)?;
        Ok(self.color_plane[pos])
    }

    pub fn modifiers_at(&self, pos: usize) -> Result<Modifiers> {
        let pos = self.check(pos)?;
        Ok(self.extended_plane[pos])
    }

    pub fn gui_hint_at(&self, pos: usize) -> Result<GuiHint> {
        let pos = self.check(pos)?;
        Ok(derive_gui_hint(self.color_plane[pos], self.extended_plane[pos]))
    }

    pub fn dirty(&self, pos: usize) -> Result<bool> {
        let pos = self.check(pos)?;
        Ok(self.dirty_plane[pos])
    }

    pub fn clear_dirty(&mut self, pos: usize) -> Result<()> {
        let pos = self.check(pos)?;
        self.dirty_plane[pos] = false;
        Ok(())
    }

    /// Writes an attribute byte at `pos`: sets `is-attr`, stores the 6-bit
    /// code, derives color/modifiers via the fixed mapping table, and
    /// blanks the displayed glyph (§4.4).
    pub fn set_attribute(&mut self, pos: usize, code: u8) -> Result<()> {
        let pos = self.check(pos)?;
        let (color, modifiers) = map_attribute(code & 0x3F);
        self.attr_plane[pos] = code & 0x3F;
        self.is_attr_plane[pos] = true;
        self.char_plane[pos] = ' ';
        self.color_plane[pos] = color;
        self.extended_plane[pos] = modifiers;
        self.dirty_plane[pos] = true;
        Ok(())
    }

    /// Fills `[from, to)` linear positions with `ch`, wrapping past the end
    /// of the plane back to zero if `to <= from` (used by RA wraparound).
    pub fn fill_range(&mut self, from: usize, to: usize, ch: char) -> Result<()> {
        let from = self.check(from)?;
        let to_checked = if to == self.len() { to } else { self.check(to)? };
        if to_checked >= from {
            for p in from..to_checked {
                self.set_char(p, ch)?;
            }
        } else {
            for p in from..self.len() {
                self.set_char(p, ch)?;
            }
            for p in 0..to_checked {
                self.set_char(p, ch)?;
            }
        }
        Ok(())
    }

    /// Erases `[from, to)` to blanks, clearing attribute state too
    /// (used by Erase-to-Address).
    pub fn erase_range(&mut self, from: usize, to: usize) -> Result<()> {
        let from = self.check(from)?;
        let to = self.check(to.min(self.len()))?;
        for p in from..to {
            self.char_plane[p] = ' ';
            self.is_attr_plane[p] = false;
            self.dirty_plane[p] = true;
        }
        Ok(())
    }

    /// Resets every plane to its power-on state (Clear Unit).
    pub fn clear_all(&mut self) {
        self.char_plane.fill(' ');
        self.attr_plane.fill(0x20);
        self.is_attr_plane.fill(false);
        self.extended_plane.fill(Modifiers::default());
        self.color_plane.fill(Color::Green);
        self.dirty_plane.fill(true);
    }

    /// Rolls the display `lines` rows (positive = up, negative = down),
    /// blank-filling the rows scrolled into view.
    pub fn roll(&mut self, lines: i32) -> Result<()> {
        if lines == 0 || self.rows == 0 {
            return Ok(());
        }
        let abs = (lines.unsigned_abs() as usize).min(self.rows);
        let row_len = self.cols;
        if lines > 0 {
            self.char_plane.copy_within(abs * row_len.., 0);
            self.attr_plane.copy_within(abs * row_len.., 0);
            self.is_attr_plane.copy_within(abs * row_len.., 0);
            self.extended_plane.copy_within(abs * row_len.., 0);
            self.color_plane.copy_within(abs * row_len.., 0);
            let blank_from = (self.rows - abs) * row_len;
            self.blank_from(blank_from);
        } else {
            self.char_plane.copy_within(..(self.rows - abs) * row_len, abs * row_len);
            self.attr_plane.copy_within(..(self.rows - abs) * row_len, abs * row_len);
            self.is_attr_plane.copy_within(..(self.rows - abs) * row_len, abs * row_len);
            self.extended_plane.copy_within(..(self.rows - abs) * row_len, abs * row_len);
            self.color_plane.copy_within(..(self.rows - abs) * row_len, abs * row_len);
            self.blank_from_to(0, abs * row_len);
        }
        self.dirty_plane.fill(true);
        Ok(())
    }

    fn blank_from(&mut self, from: usize) {
        self.blank_from_to(from, self.len());
    }

    fn blank_from_to(&mut self, from: usize, to: usize) {
        for p in from..to {
            self.char_plane[p] = ' ';
            self.attr_plane[p] = 0x20;
            self.is_attr_plane[p] = false;
            self.extended_plane[p] = Modifiers::default();
            self.color_plane[p] = Color::Green;
        }
    }

    /// Snapshot of one row's character/attribute/is-attr/color state, used
    /// by the error-line save slot.
    pub fn snapshot_row(&self, row: usize) -> Result<RowSnapshot> {
        if row >= self.rows {
            return Err(Tn5250Error::NotOnScreen { pos: row * self.cols });
        }
        let start = row * self.cols;
        let end = start + self.cols;
        Ok(RowSnapshot {
            chars: self.char_plane[start..end].to_vec(),
            attrs: self.attr_plane[start..end].to_vec(),
            is_attr: self.is_attr_plane[start..end].to_vec(),
            colors: self.color_plane[start..end].to_vec(),
        })
    }

    pub fn restore_row(&mut self, row: usize, snapshot: &RowSnapshot) -> Result<()> {
        if row >= self.rows {
            return Err(Tn5250Error::NotOnScreen { pos: row * self.cols });
        }
        let start = row * self.cols;
        for i in 0..self.cols {
            self.char_plane[start + i] = snapshot.chars[i];
            self.attr_plane[start + i] = snapshot.attrs[i];
            self.is_attr_plane[start + i] = snapshot.is_attr[i];
            self.color_plane[start + i] = snapshot.colors[i];
            self.dirty_plane[start + i] = true;
        }
        Ok(())
    }
}

/// A saved row's char/attr/is-attr/color state (error-line save slot).
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    chars: Vec<char>,
    attrs: Vec<u8>,
    is_attr: Vec<bool>,
    colors: Vec<Color>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_access_is_an_error_not_a_panic() {
        let planes = Planes::new(24, 80);
        assert_eq!(planes.glyph_at(24 * 80), Err(Tn5250Error::NotOnScreen { pos: 24 * 80 }));
    }

    #[test]
    fn attribute_write_blanks_the_glyph_regardless_of_char_plane() {
        let mut planes = Planes::new(24, 80);
        planes.set_char(5, 'X').unwrap();
        planes.set_attribute(5, 0x20).unwrap();
        assert_eq!(planes.glyph_at(5).unwrap(), ' ');
        assert!(planes.is_attr(5).unwrap());
    }

    #[test]
    fn writing_char_never_touches_other_planes() {
        let mut planes = Planes::new(24, 80);
        planes.set_attribute(5, 0x28).unwrap();
        let color_before = planes.color_at(5).unwrap();
        planes.set_char(6, 'Y').unwrap();
        assert_eq!(planes.color_at(5).unwrap(), color_before);
    }

    #[test]
    fn mutation_sets_dirty_bit() {
        let mut planes = Planes::new(24, 80);
        assert!(!planes.dirty(10).unwrap());
        planes.set_char(10, 'Z').unwrap();
        assert!(planes.dirty(10).unwrap());
    }

    #[test]
    fn fill_range_wraps_around_the_end() {
        let mut planes = Planes::new(1, 4);
        planes.fill_range(3, 1, 'Q').unwrap();
        assert_eq!(planes.glyph_at(3).unwrap(), 'Q');
        assert_eq!(planes.glyph_at(0).unwrap(), 'Q');
        assert_eq!(planes.glyph_at(1).unwrap(), ' ');
    }
}
