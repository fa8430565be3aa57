//! Outbound response builder: AID responses and their three body formats
//! (spec §4.6).
//!
//! Grounded in the reference `lib5250::session::create_field_response`,
//! which left every collection mode as a `TODO` ("Implement field
//! traversal and data collection" / "Implement MDT field collection") and
//! never appended any field data. This module implements all three.

use crate::codec::{self, CodePage};
use crate::error::Result;
use crate::protocol::codes::AidKey;
use crate::screen::field::Field;
use crate::screen::{FieldOps, ScreenOps};

/// Which fields an AID response's body includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    None,
    Modified,
    All,
}

/// Structured response location-tag base (`0xC0..0xCF`, extended attribute
/// echo range).
const STRUCTURED_TAG_BASE: u8 = 0xC0;

pub struct OutboundBuilder;

impl OutboundBuilder {
    /// Builds the command-stream body of an AID response: `AID ++ row ++
    /// col ++ optional field data`, clamping the cursor into range at
    /// encode time (spec testable property 7) and clearing OIA error state
    /// (spec §4.6 "Clearing error state").
    pub fn build_aid_response<S>(screen: &mut S, aid: AidKey, mode: CollectionMode, code_page: CodePage) -> Result<Vec<u8>>
    where
        S: ScreenOps + FieldOps,
    {
        let (row, col) = screen.clamp_row_col(
            screen.cursor_position() / screen.cols().max(1),
            screen.cursor_position() % screen.cols().max(1),
        );

        let mut body = vec![aid.to_byte(), row as u8, col as u8];

        match mode {
            CollectionMode::None => {}
            CollectionMode::Modified | CollectionMode::All => {
                let indices: Vec<usize> = match mode {
                    CollectionMode::Modified => screen.collect_modified_indices(),
                    _ => (0..screen.field_count()).collect(),
                };
                for idx in indices {
                    if let Some(field) = screen.field_at_index(idx) {
                        Self::append_long_field(&mut body, field, screen, code_page);
                    }
                }
            }
        }

        screen.oia_mut().unlock_keyboard();
        screen.restore_error_line()?;
        Ok(body)
    }

    /// Long-response field data: `SBA(row,col) ++ raw EBCDIC content`.
    fn append_long_field<S: ScreenOps>(body: &mut Vec<u8>, field: &Field, screen: &S, code_page: CodePage) {
        let (row, col) = field_row_col(field, screen.cols());
        body.push(0x11); // SBA
        body.push((row + 1) as u8);
        body.push((col + 1) as u8);
        let text = field_text(field, screen);
        body.extend_from_slice(&codec::encode(code_page, &text));
    }

    /// Structured-response field data: a `0xC0..0xCF` location tag, a length
    /// byte, then content.
    pub fn build_structured_response<S>(screen: &S, code_page: CodePage, mode: CollectionMode) -> Vec<u8>
    where
        S: ScreenOps + FieldOps,
    {
        let indices: Vec<usize> = match mode {
            CollectionMode::None => Vec::new(),
            CollectionMode::Modified => screen.collect_modified_indices(),
            CollectionMode::All => (0..screen.field_count()).collect(),
        };
        let mut body = Vec::new();
        for (tag_offset, idx) in indices.into_iter().enumerate() {
            if let Some(field) = screen.field_at_index(idx) {
                let tag = STRUCTURED_TAG_BASE.wrapping_add((tag_offset % 16) as u8);
                body.push(tag);
                let text = field_text(field, screen);
                let encoded = codec::encode(code_page, &text);
                body.push(encoded.len() as u8);
                body.extend_from_slice(&encoded);
            }
        }
        body
    }
}

fn field_row_col(field: &Field, cols: usize) -> (usize, usize) {
    if cols == 0 {
        (0, 0)
    } else {
        (field.start_pos() / cols, field.start_pos() % cols)
    }
}

fn field_text<S: ScreenOps>(field: &Field, screen: &S) -> String {
    (0..field.length)
        .map(|i| screen.glyph_at(field.start_pos() + i).unwrap_or(' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::Screen;

    /// Scenario D from spec.md §8 (0-based cursor contract): one modified
    /// field at row 2 col 1 containing "HELLO", cursor at (2,6).
    #[test]
    fn enter_response_includes_modified_field_data() {
        let mut screen = Screen::new(24, 80);
        let attr_pos = screen.row_col_to_pos(2, 0).unwrap();
        screen.add_field(attr_pos, 5, 0, 0, 0, 0);
        let start = attr_pos + 1;
        for (i, ch) in "HELLO".chars().enumerate() {
            screen.set_char(start + i, ch).unwrap();
        }
        screen.field_at_index_mut(0).unwrap().set_modified(true);
        let cursor_pos = screen.row_col_to_pos(2, 6).unwrap();
        screen.set_cursor_position(cursor_pos);

        let body = OutboundBuilder::build_aid_response(&mut screen, AidKey::Enter, CollectionMode::Modified, CodePage::Cp037).unwrap();
        assert_eq!(body[0], AidKey::Enter.to_byte());
        assert_eq!(body[1], 2);
        assert_eq!(body[2], 6);
        // The field's data starts one position after its attribute byte
        // (attr_pos row2/col0 -> data row2/col1), and the SBA targets that
        // data start in 1-based coordinates: (row+1, col+1) = (3, 2).
        assert_eq!(&body[3..6], &[0x11, 3, 2]);
    }

    #[test]
    fn aid_response_unlocks_keyboard_and_clears_error_line() {
        let mut screen = Screen::new(24, 80);
        screen.oia_mut().lock_keyboard();
        screen.save_error_line().unwrap();
        OutboundBuilder::build_aid_response(&mut screen, AidKey::Clear, CollectionMode::None, CodePage::Cp037).unwrap();
        assert!(!screen.oia().keyboard_locked());
    }

    #[test]
    fn short_response_has_no_body_beyond_aid_and_cursor() {
        let mut screen = Screen::new(24, 80);
        let body = OutboundBuilder::build_aid_response(&mut screen, AidKey::Clear, CollectionMode::None, CodePage::Cp037).unwrap();
        assert_eq!(body.len(), 3);
    }
}
