//! The TN5250E record header (spec §6 "Inbound 5250 record layout").
//!
//! Not exercised at all by the reference, which only tracks a bare
//! `read_opcode` byte inline in `lib5250::session::Session`; this module
//! gives the header its own type with full opcode dispatch.

use crate::error::{Result, Tn5250Error};

/// TN5250E header opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    NoOp,
    Invite,
    OutputOnly,
    PutGet,
    Save,
    Restore,
    ReadImmediate,
    ReadScreenImmediate,
    CancelInvite,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x00 => Opcode::NoOp,
            0x01 => Opcode::Invite,
            0x02 => Opcode::OutputOnly,
            0x03 => Opcode::PutGet,
            0x04 => Opcode::Save,
            0x05 => Opcode::Restore,
            0x06 => Opcode::ReadImmediate,
            0x07 => Opcode::ReadScreenImmediate,
            0x08 => Opcode::CancelInvite,
            _ => return Err(Tn5250Error::BadHeader),
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Opcode::NoOp => 0x00,
            Opcode::Invite => 0x01,
            Opcode::OutputOnly => 0x02,
            Opcode::PutGet => 0x03,
            Opcode::Save => 0x04,
            Opcode::Restore => 0x05,
            Opcode::ReadImmediate => 0x06,
            Opcode::ReadScreenImmediate => 0x07,
            Opcode::CancelInvite => 0x08,
        }
    }
}

const HEADER_LEN: u8 = 3;

/// A parsed TN5250E record header plus the command-stream bytes that follow
/// it within the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub flags: u8,
    pub opcode: Opcode,
}

impl RecordHeader {
    /// Parses a complete record (as delivered by the Telnet framer) into
    /// its header and command-stream tail.
    pub fn parse(record: &[u8]) -> Result<(Self, &[u8])> {
        if record.len() < 7 {
            return Err(Tn5250Error::BadHeader);
        }
        let declared_len = u16::from_be_bytes([record[0], record[1]]) as usize;
        if declared_len != record.len() {
            return Err(Tn5250Error::BadHeader);
        }
        if record[2] != 0 || record[3] != 0 {
            return Err(Tn5250Error::BadHeader);
        }
        let flags = record[4];
        let opcode = Opcode::from_u8(record[5])?;
        if record[6] != HEADER_LEN {
            return Err(Tn5250Error::BadHeader);
        }
        Ok((RecordHeader { flags, opcode }, &record[7..]))
    }

    /// Builds a complete outbound record, stamping in `sequence` at bytes
    /// 2-3 (wraps 0..255 per spec, encoded little-endian as the spec's
    /// outbound framing note specifies).
    pub fn build(flags: u8, opcode: Opcode, sequence: u8, command_stream: &[u8]) -> Vec<u8> {
        let mut record = Vec::with_capacity(7 + command_stream.len());
        record.push(0); // length placeholder, high byte
        record.push(0); // length placeholder, low byte
        record.push(sequence);
        record.push(0);
        record.push(flags);
        record.push(opcode.to_u8());
        record.push(HEADER_LEN);
        record.extend_from_slice(command_stream);
        let total_len = record.len() as u16;
        record[0] = (total_len >> 8) as u8;
        record[1] = (total_len & 0xFF) as u8;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_header() {
        let record = RecordHeader::build(0, Opcode::Invite, 0, &[0x40, 0x41]);
        let (header, stream) = RecordHeader::parse(&record).unwrap();
        assert_eq!(header.opcode, Opcode::Invite);
        assert_eq!(stream, &[0x40, 0x41]);
    }

    #[test]
    fn mismatched_length_is_bad_header() {
        let mut record = RecordHeader::build(0, Opcode::NoOp, 0, &[1, 2, 3]);
        record.truncate(record.len() - 1);
        assert_eq!(RecordHeader::parse(&record), Err(Tn5250Error::BadHeader));
    }

    #[test]
    fn short_record_is_bad_header() {
        assert_eq!(RecordHeader::parse(&[0, 1, 2]), Err(Tn5250Error::BadHeader));
    }
}
