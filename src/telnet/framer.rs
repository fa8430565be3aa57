//! Byte-level Telnet framer: IAC escaping, `IAC EOR` record framing, and
//! routing of option and sub-negotiation commands to the negotiator.
//!
//! Grounded in the two-state DATA/SAW_IAC shape described for the
//! negotiator in the reference `lib5250::telnet` module, extended here with
//! a third state for `IAC SB ... IAC SE` collection since the reference
//! negotiator only handled already-extracted sub-negotiation payloads.

use super::{DO, DONT, EOR, IAC, SB, SE, WILL, WONT};
use crate::error::{Result, Tn5250Error};

/// Something the framer extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// A complete 5250 record: IAC-unescaped, with the terminating
    /// `IAC EOR` stripped.
    Record(Vec<u8>),
    /// `IAC <WILL|WONT|DO|DONT> <option>`.
    OptionNegotiation { command: u8, option: u8 },
    /// `IAC SB <option> ... IAC SE`, with inner `IAC IAC` unescaped.
    Subnegotiation { option: u8, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Data,
    SawIac,
    SawCommand,
    Sb { option: Option<u8>, buf: Vec<u8> },
    SbSawIac { option: Option<u8>, buf: Vec<u8> },
}

/// The inbound framer. One instance per session; fed bytes as they arrive
/// off the transport.
#[derive(Debug)]
pub struct TelnetFramer {
    state: State,
    record: Vec<u8>,
    pending_command: u8,
}

impl Default for TelnetFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetFramer {
    pub fn new() -> Self {
        TelnetFramer { state: State::Data, record: Vec::new(), pending_command: 0 }
    }

    /// True when a record is partially buffered — used by the reader task
    /// to decide whether an EOF is a clean close or a `StreamEnded` error.
    pub fn has_partial_record(&self) -> bool {
        !matches!(self.state, State::Data) || !self.record.is_empty()
    }

    /// Feeds a chunk of bytes, returning every event completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<FramerEvent>> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.feed_byte(byte, &mut events)?;
        }
        Ok(events)
    }

    fn feed_byte(&mut self, byte: u8, events: &mut Vec<FramerEvent>) -> Result<()> {
        match &mut self.state {
            State::Data => {
                if byte == IAC {
                    self.state = State::SawIac;
                } else {
                    self.record.push(byte);
                }
            }
            State::SawIac => match byte {
                IAC => {
                    self.record.push(IAC);
                    self.state = State::Data;
                }
                EOR => {
                    let record = std::mem::take(&mut self.record);
                    events.push(FramerEvent::Record(record));
                    self.state = State::Data;
                }
                SB => {
                    self.state = State::Sb { option: None, buf: Vec::new() };
                }
                WILL | WONT | DO | DONT => {
                    self.pending_command = byte;
                    self.state = State::SawCommand;
                }
                _ => {
                    // IAC <other>: ignore, return to DATA.
                    self.state = State::Data;
                }
            },
            State::SawCommand => {
                events.push(FramerEvent::OptionNegotiation { command: self.pending_command, option: byte });
                self.state = State::Data;
            }
            State::Sb { option, buf } => {
                if option.is_none() {
                    *option = Some(byte);
                } else if byte == IAC {
                    let option = *option;
                    let buf = std::mem::take(buf);
                    self.state = State::SbSawIac { option, buf };
                } else {
                    buf.push(byte);
                }
            }
            State::SbSawIac { option, buf } => match byte {
                IAC => {
                    buf.push(IAC);
                    let option = *option;
                    let buf = std::mem::take(buf);
                    self.state = State::Sb { option, buf };
                }
                SE => {
                    let option = option.ok_or(Tn5250Error::BadSubneg)?;
                    let data = std::mem::take(buf);
                    events.push(FramerEvent::Subnegotiation { option, data });
                    self.state = State::Data;
                }
                _ => return Err(Tn5250Error::BadSubneg),
            },
        }
        Ok(())
    }

    /// Called when the transport reports EOF. Returns `StreamEnded` if a
    /// record was only partially received.
    pub fn on_eof(&self) -> Result<()> {
        if self.has_partial_record() {
            Err(Tn5250Error::StreamEnded)
        } else {
            Ok(())
        }
    }

    /// Encodes a complete outbound record: escapes `0xFF` and appends
    /// `IAC EOR`.
    pub fn encode_record(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 2);
        for &b in data {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.push(IAC);
        out.push(EOR);
        out
    }

    /// Encodes a `IAC <command> <option>` negotiation reply.
    pub fn encode_option(command: u8, option: u8) -> Vec<u8> {
        vec![IAC, command, option]
    }

    /// Encodes a `IAC SB <option> <data, IAC-escaped> IAC SE` sub-negotiation.
    pub fn encode_subnegotiation(option: u8, data: &[u8]) -> Vec<u8> {
        let mut out = vec![IAC, SB, option];
        for &b in data {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.push(IAC);
        out.push(SE);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_record_terminated_by_eor() {
        let mut framer = TelnetFramer::new();
        let events = framer.feed(&[0x40, 0x41, IAC, EOR]).unwrap();
        assert_eq!(events, vec![FramerEvent::Record(vec![0x40, 0x41])]);
    }

    /// Scenario F from spec.md §8: double-IAC escape.
    #[test]
    fn double_iac_escape_yields_single_literal_byte() {
        let mut framer = TelnetFramer::new();
        let input = [0x40, IAC, IAC, 0x40, IAC, EOR];
        let events = framer.feed(&input).unwrap();
        assert_eq!(events, vec![FramerEvent::Record(vec![0x40, 0xFF, 0x40])]);
    }

    #[test]
    fn option_negotiation_is_routed_as_its_own_event() {
        let mut framer = TelnetFramer::new();
        let events = framer.feed(&[IAC, DO, 0]).unwrap();
        assert_eq!(events, vec![FramerEvent::OptionNegotiation { command: DO, option: 0 }]);
    }

    #[test]
    fn subnegotiation_with_inner_iac_escape_is_unescaped() {
        let mut framer = TelnetFramer::new();
        let input = [IAC, SB, 24, 1, IAC, IAC, 2, IAC, SE];
        let events = framer.feed(&input).unwrap();
        assert_eq!(events, vec![FramerEvent::Subnegotiation { option: 24, data: vec![1, IAC, 2] }]);
    }

    #[test]
    fn eof_mid_record_is_stream_ended() {
        let mut framer = TelnetFramer::new();
        framer.feed(&[0x40, 0x41]).unwrap();
        assert_eq!(framer.on_eof(), Err(Tn5250Error::StreamEnded));
    }

    #[test]
    fn eof_between_records_is_clean() {
        let mut framer = TelnetFramer::new();
        framer.feed(&[0x40, IAC, EOR]).unwrap();
        assert_eq!(framer.on_eof(), Ok(()));
    }

    #[test]
    fn encode_record_escapes_and_terminates() {
        let encoded = TelnetFramer::encode_record(&[0x01, 0xFF, 0x02]);
        assert_eq!(encoded, vec![0x01, IAC, IAC, 0x02, IAC, EOR]);
    }
}
