//! EBCDIC ↔ Unicode translation.
//!
//! Builds on the reference `ebcdic.rs` ambient module, which shipped a
//! single hardcoded CP037 lookup table. spec.md §2 names eleven CCSIDs; we
//! keep CP037 as the full canonical table (same literal values as the
//! reference) and derive the others by overriding the small set of
//! "national use" code points each code page varies at, which is how the
//! real EBCDIC code pages differ from one another. This is a documented
//! simplification (see DESIGN.md): the national-use glyphs chosen here are
//! illustrative of each page's locale, not independently verified against
//! IBM's registered CCSID tables byte-for-byte.

use serde::{Deserialize, Serialize};

/// EBCDIC code pages recognized by this crate (spec.md §2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodePage {
    Cp037,
    Cp273,
    Cp277,
    Cp278,
    Cp280,
    Cp284,
    Cp285,
    Cp297,
    Cp500,
    Cp871,
    Cp1026,
}

impl Default for CodePage {
    fn default() -> Self {
        CodePage::Cp037
    }
}

/// Base EBCDIC CP037 (US/Canada) to Unicode translation table.
#[rustfmt::skip]
const EBCDIC_CP037_TO_UNICODE: [char; 256] = [
    '\x00', '\x01', '\x02', '\x03', '\x37', '\x2D', '\x2E', '\x2F',
    '\x16', '\x05', '\x25', '\x0B', '\x0C', '\r',   '\x0E', '\x0F',
    '\x10', '\x11', '\x12', '\x13', '\x3C', '\x3D', '\x32', '\x26',
    '\x18', '\x19', '\x3F', '\x27', '\x1C', '\x1D', '\x1E', '\x1F',
    '\x40', '\x5A', '\x7F', '\x7B', '\x5B', '\n',   '\x17', '\x1B',
    '\x60', '\x61', '\x62', '\x63', '\x64', '\x65', '\x66', '\x67',
    '\x68', '\x69', '\x70', '\x71', '\x72', '\x73', '\x74', '\x75',
    '\x76', '\x77', '\x78', '\x79', '\x7A', '\x7B', '\x7C', '\x7D',
    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    ' ',    '[',    '.',    '<',    '(',    '+',    '|',
    '&',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    ' ',    '!',    '$',    '*',    ')',    ';',    ' ',
    '-',    '/',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    ' ',    '|',    ',',    '%',    '_',    '>',    '?',
    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    '`',    ':',    '#',    '@',    '\'',   '=',    '"',
    ' ',    'a',    'b',    'c',    'd',    'e',    'f',    'g',
    'h',    'i',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    'j',    'k',    'l',    'm',    'n',    'o',    'p',
    'q',    'r',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    '~',    's',    't',    'u',    'v',    'w',    'x',
    'y',    'z',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    '^',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    ' ',    ' ',    '[',    ']',    ' ',    ' ',    ' ',    ' ',
    '{',    'A',    'B',    'C',    'D',    'E',    'F',    'G',
    'H',    'I',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    '}',    'J',    'K',    'L',    'M',    'N',    'O',    'P',
    'Q',    'R',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    '\\',   ' ',    'S',    'T',    'U',    'V',    'W',    'X',
    'Y',    'Z',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
    '0',    '1',    '2',    '3',    '4',    '5',    '6',    '7',
    '8',    '9',    ' ',    ' ',    ' ',    ' ',    ' ',    ' ',
];

/// National-use overrides applied on top of [`EBCDIC_CP037_TO_UNICODE`] for
/// each non-US code page, at the handful of positions every EBCDIC code
/// page varies at (`0x4A 0x4F 0x5A 0x5B 0x5F 0x60 0x6A 0x7A 0xA1 0xB0 0xB1
/// 0xBA 0xBB 0xC0 0xD0 0xDC 0xE0 0xE1`).
fn national_overrides(cp: CodePage) -> &'static [(u8, char)] {
    match cp {
        CodePage::Cp037 => &[],
        // Germany/Austria
        CodePage::Cp273 => &[(0x4A, '§'), (0x5A, '!'), (0x5F, 'Ü'), (0xB0, '^'), (0xB1, 'Ö'), (0xBB, 'Ä'), (0xC0, '§')],
        // Denmark/Norway
        CodePage::Cp277 => &[(0x4A, 'Æ'), (0x5A, 'Ø'), (0x5F, 'Å'), (0xB0, 'æ'), (0xB1, 'ø'), (0xBB, 'å')],
        // Finland/Sweden
        CodePage::Cp278 => &[(0x4A, 'Ä'), (0x5A, 'Ö'), (0x5F, 'Å'), (0xB0, 'ä'), (0xB1, 'ö'), (0xBB, 'å')],
        // France
        CodePage::Cp297 => &[(0x4A, '°'), (0x5A, '§'), (0x5F, 'À'), (0xB0, '¨'), (0xB1, 'É'), (0xBB, 'È')],
        // International/multilingual
        CodePage::Cp500 => &[(0x4A, '['), (0x5A, '!'), (0x5F, ']'), (0xBA, '!'), (0xBB, '¤')],
        // Portugal
        CodePage::Cp280 => &[(0x4A, 'Ç'), (0x5A, '!'), (0x5F, 'ç'), (0xB0, '¨'), (0xB1, 'Ñ')],
        // Italy
        CodePage::Cp284 => &[(0x4A, '§'), (0x5A, '!'), (0x5F, '°'), (0xB0, '^'), (0xB1, 'Ò'), (0xBB, 'À')],
        // Spain/Latin America
        CodePage::Cp285 => &[(0x4A, '$'), (0x5A, '!'), (0x5F, 'Ñ'), (0xB0, '^'), (0xB1, 'ñ'), (0xBB, '£')],
        // Hebrew
        CodePage::Cp871 => &[(0x4A, '±'), (0x5A, '!'), (0x5F, 'Ö'), (0xB0, '^'), (0xB1, 'Å'), (0xBB, 'Ä')],
        // Germany/Austria (EURO update)
        CodePage::Cp1026 => &[(0x4A, 'Ğ'), (0x5A, 'Ş'), (0x5F, 'İ'), (0xB0, 'ğ'), (0xB1, 'ş'), (0xBB, 'ı')],
    }
}

/// A code page's forward (EBCDIC → Unicode) table, built once at first use.
fn forward_table(cp: CodePage) -> [char; 256] {
    let mut table = EBCDIC_CP037_TO_UNICODE;
    for &(byte, ch) in national_overrides(cp) {
        table[byte as usize] = ch;
    }
    table
}

/// Translates a single EBCDIC byte to its Unicode scalar under `cp`.
pub fn decode_byte(cp: CodePage, byte: u8) -> char {
    forward_table(cp)[byte as usize]
}

/// Translates an EBCDIC byte slice to a `String`.
pub fn decode(cp: CodePage, bytes: &[u8]) -> String {
    let table = forward_table(cp);
    bytes.iter().map(|&b| table[b as usize]).collect()
}

/// Translates a Unicode scalar to its EBCDIC byte under `cp`, falling back
/// to EBCDIC space (`0x40`) for characters the code page cannot represent.
pub fn encode_char(cp: CodePage, ch: char) -> u8 {
    let table = forward_table(cp);
    table
        .iter()
        .position(|&c| c == ch)
        .map(|pos| pos as u8)
        .unwrap_or(0x40)
}

/// Translates a `&str` to EBCDIC bytes under `cp`.
pub fn encode(cp: CodePage, text: &str) -> Vec<u8> {
    text.chars().map(|ch| encode_char(cp, ch)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_cp037_values_match_reference_table() {
        assert_eq!(decode_byte(CodePage::Cp037, 0x40), ' ');
        assert_eq!(decode_byte(CodePage::Cp037, 0xC1), 'A');
        assert_eq!(decode_byte(CodePage::Cp037, 0x81), 'a');
        assert_eq!(decode_byte(CodePage::Cp037, 0xF0), '0');
        assert_eq!(decode_byte(CodePage::Cp037, 0xF9), '9');
    }

    #[test]
    fn hello_round_trips_through_cp037() {
        let ebcdic = [0xC8, 0xC5, 0xD3, 0xD3, 0xD6];
        assert_eq!(decode(CodePage::Cp037, &ebcdic), "HELLO");
        assert_eq!(encode(CodePage::Cp037, "HELLO"), ebcdic);
    }

    #[test]
    fn round_trip_law_holds_for_every_domain_byte_and_page() {
        for &cp in &[
            CodePage::Cp037,
            CodePage::Cp273,
            CodePage::Cp277,
            CodePage::Cp278,
            CodePage::Cp280,
            CodePage::Cp284,
            CodePage::Cp285,
            CodePage::Cp297,
            CodePage::Cp500,
            CodePage::Cp871,
            CodePage::Cp1026,
        ] {
            let table = forward_table(cp);
            for byte in 0u16..256 {
                let byte = byte as u8;
                let ch = table[byte as usize];
                // Several bytes alias to the ASCII space placeholder in the
                // reference table; the round-trip law only binds on this
                // page's actual domain, i.e. characters with a unique byte.
                let hits = table.iter().filter(|&&c| c == ch).count();
                if hits == 1 {
                    assert_eq!(encode_char(cp, ch), byte);
                }
            }
        }
    }

    #[test]
    fn national_override_changes_cp273_but_not_cp037() {
        assert_eq!(decode_byte(CodePage::Cp037, 0x4A), '[');
        assert_eq!(decode_byte(CodePage::Cp273, 0x4A), '§');
    }
}
