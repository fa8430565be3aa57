//! Telnet option dance and TN5250E device sub-negotiation.
//!
//! Grounded in the reference `lib5250::telnet::TelnetNegotiator`: a map of
//! per-option negotiation state plus `process_command`/`process_subnegotiation`
//! entry points reached from the framer. The reference negotiator stops at
//! plain TN5250 (BINARY/EOR/SGA/TERMINAL-TYPE/NEW-ENVIRON); this module adds
//! the TN5250E device sub-negotiation (spec §6) the reference never
//! implemented (`lib5250::protocol` — "uses wrong command codes" — was
//! disabled rather than fixed).

use std::collections::HashMap;

use super::framer::{FramerEvent, TelnetFramer};
use super::{DO, DONT, OPT_BINARY, OPT_EOR, OPT_NEW_ENVIRON, OPT_SGA, OPT_TERMINAL_TYPE, OPT_TN5250E, WILL, WONT};
use crate::config::{ScreenSize, SessionConfig};
use crate::error::{Result, Tn5250Error};

/// One TN5250E device sub-negotiation command code.
const TNE_TNESCFG: u8 = 0x41;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionState {
    Unknown,
    Enabled,
    Disabled,
}

/// Device-type/function outcome of the TN5250E sub-negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNegotiation {
    pub device_name: String,
    pub device_type_display: bool,
    pub record_mode: bool,
    pub structured_field_response_mode: bool,
}

/// What happened as a result of feeding one framer event to the negotiator.
#[derive(Debug, Clone, Default)]
pub struct NegotiatorOutcome {
    /// Raw bytes to write back to the transport, if any.
    pub reply: Vec<u8>,
    /// Set once basic negotiation (BINARY/EOR/SGA both ways) is settled.
    pub basic_complete: bool,
    /// Set once the TN5250E device sub-negotiation concludes, successfully
    /// or by falling back to non-E mode.
    pub device: Option<DeviceNegotiation>,
    /// Set when negotiation of a required option was refused outright.
    pub failed: Option<String>,
}

pub struct Negotiator {
    local: HashMap<u8, OptionState>,
    remote: HashMap<u8, OptionState>,
    terminal_type: &'static str,
    device_name: String,
    enhanced_5250: bool,
    device: Option<DeviceNegotiation>,
}

impl Negotiator {
    pub fn new(config: &SessionConfig) -> Self {
        Negotiator {
            local: HashMap::new(),
            remote: HashMap::new(),
            terminal_type: config.screen_size.terminal_type(),
            device_name: sanitize_device_name(&config.device_name),
            enhanced_5250: config.enhanced_5250,
            device: None,
        }
    }

    /// Bytes to send as soon as the transport is up, offering every option
    /// this crate supports in both directions.
    pub fn start(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        for &opt in &[OPT_BINARY, OPT_EOR, OPT_SGA] {
            out.extend_from_slice(&TelnetFramer::encode_option(WILL, opt));
            out.extend_from_slice(&TelnetFramer::encode_option(DO, opt));
        }
        out.extend_from_slice(&TelnetFramer::encode_option(WILL, OPT_TERMINAL_TYPE));
        out.extend_from_slice(&TelnetFramer::encode_option(WILL, OPT_NEW_ENVIRON));
        if self.enhanced_5250 {
            out.extend_from_slice(&TelnetFramer::encode_option(WILL, OPT_TN5250E));
            out.extend_from_slice(&TelnetFramer::encode_option(DO, OPT_TN5250E));
        }
        out
    }

    /// True once BINARY, EOR, and SGA are enabled in both directions.
    pub fn basic_negotiation_complete(&self) -> bool {
        [OPT_BINARY, OPT_EOR, OPT_SGA]
            .iter()
            .all(|o| self.local.get(o) == Some(&OptionState::Enabled) && self.remote.get(o) == Some(&OptionState::Enabled))
    }

    pub fn device_negotiation(&self) -> Option<&DeviceNegotiation> {
        self.device.as_ref()
    }

    fn should_accept(&self, option: u8) -> bool {
        matches!(option, OPT_BINARY | OPT_EOR | OPT_SGA | OPT_TERMINAL_TYPE | OPT_NEW_ENVIRON)
            || (option == OPT_TN5250E && self.enhanced_5250)
    }

    /// Feeds one event extracted by the framer and produces the reply bytes
    /// (if any) plus any state-transition results.
    pub fn handle(&mut self, event: FramerEvent) -> Result<NegotiatorOutcome> {
        let mut outcome = NegotiatorOutcome::default();
        match event {
            FramerEvent::Record(_) => {
                // Not the negotiator's concern; the caller routes records to
                // the record queue instead of here.
            }
            FramerEvent::OptionNegotiation { command, option } => {
                match command {
                    WILL => {
                        if self.should_accept(option) {
                            self.remote.insert(option, OptionState::Enabled);
                            outcome.reply.extend_from_slice(&TelnetFramer::encode_option(DO, option));
                        } else {
                            self.remote.insert(option, OptionState::Disabled);
                            outcome.reply.extend_from_slice(&TelnetFramer::encode_option(DONT, option));
                        }
                    }
                    WONT => {
                        self.remote.insert(option, OptionState::Disabled);
                        if matches!(option, OPT_BINARY | OPT_EOR | OPT_SGA) {
                            outcome.failed = Some(format!("required option {option} refused by host (WONT)"));
                        }
                    }
                    DO => {
                        if self.should_accept(option) {
                            self.local.insert(option, OptionState::Enabled);
                            outcome.reply.extend_from_slice(&TelnetFramer::encode_option(WILL, option));
                        } else {
                            self.local.insert(option, OptionState::Disabled);
                            outcome.reply.extend_from_slice(&TelnetFramer::encode_option(WONT, option));
                        }
                    }
                    DONT => {
                        self.local.insert(option, OptionState::Disabled);
                        if matches!(option, OPT_BINARY | OPT_EOR | OPT_SGA) {
                            outcome.failed = Some(format!("required option {option} refused by host (DONT)"));
                        }
                    }
                    _ => return Err(Tn5250Error::BadSubneg),
                }
                outcome.basic_complete = self.basic_negotiation_complete();
            }
            FramerEvent::Subnegotiation { option, data } => {
                self.handle_subnegotiation(option, &data, &mut outcome)?;
            }
        }
        Ok(outcome)
    }

    fn handle_subnegotiation(&mut self, option: u8, data: &[u8], outcome: &mut NegotiatorOutcome) -> Result<()> {
        match option {
            OPT_TERMINAL_TYPE => {
                if data.first() == Some(&1) {
                    let mut reply = vec![0u8]; // IS
                    reply.extend_from_slice(self.terminal_type.as_bytes());
                    outcome.reply.extend_from_slice(&TelnetFramer::encode_subnegotiation(OPT_TERMINAL_TYPE, &reply));
                }
            }
            OPT_NEW_ENVIRON => {
                if data.first() == Some(&1) {
                    // SEND with no requested variables: reply with an empty IS.
                    outcome.reply.extend_from_slice(&TelnetFramer::encode_subnegotiation(OPT_NEW_ENVIRON, &[0]));
                }
            }
            OPT_TN5250E => {
                self.handle_tn5250e_subneg(data, outcome)?;
            }
            _ => return Err(Tn5250Error::BadSubneg),
        }
        Ok(())
    }

    fn handle_tn5250e_subneg(&mut self, data: &[u8], outcome: &mut NegotiatorOutcome) -> Result<()> {
        // length(2 BE) | 0x41 | 0x00 | 0x00 | flags | mode_mask | device_name[0..8]
        if data.len() < 7 || data[2] != TNE_TNESCFG {
            self.device = Some(fallback_device(&self.device_name));
            outcome.device = self.device.clone();
            return Ok(());
        }
        let length = u16::from_be_bytes([data[0], data[1]]) as usize;
        let reserved1 = data[3];
        let reserved2 = data[4];
        let flags = data[5];
        let mode_mask = data[6];
        let name_bytes = &data[7..];

        if length != data.len() || reserved1 != 0 || reserved2 != 0 {
            self.device = Some(fallback_device(&self.device_name));
            outcome.device = self.device.clone();
            return Ok(());
        }

        let device_type = flags & 0x07;
        let bypass_bit_set = flags & 0x08 != 0;
        let reserved_bits = flags & 0xF0;
        if device_type > 2 || reserved_bits != 0 {
            self.device = Some(fallback_device(&self.device_name));
            outcome.device = self.device.clone();
            return Ok(());
        }
        let _ = bypass_bit_set;

        let reserved_mode_bits = mode_mask & 0xFC;
        if reserved_mode_bits != 0 {
            self.device = Some(fallback_device(&self.device_name));
            outcome.device = self.device.clone();
            return Ok(());
        }

        let device_name = decode_device_name(name_bytes);
        let negotiated = DeviceNegotiation {
            device_name,
            device_type_display: device_type == 0,
            record_mode: mode_mask & 0x01 != 0,
            structured_field_response_mode: mode_mask & 0x02 != 0,
        };
        self.device = Some(negotiated.clone());
        outcome.device = Some(negotiated);
        Ok(())
    }

    /// Encodes the outbound TNESCFG request this client sends to offer its
    /// device name and capabilities.
    pub fn encode_tnescfg_request(&self, screen_size: ScreenSize) -> Vec<u8> {
        let name = self.device_name.as_bytes();
        let mut body = vec![0u8, 0u8, TNE_TNESCFG, 0, 0];
        let flags = 0u8; // device type 0 == display
        let mode_mask = 0x03u8; // record mode + structured-field response mode
        body.push(flags);
        body.push(mode_mask);
        body.extend_from_slice(name);
        let total_len = body.len() as u16;
        body[0] = (total_len >> 8) as u8;
        body[1] = (total_len & 0xFF) as u8;
        let _ = screen_size;
        TelnetFramer::encode_subnegotiation(OPT_TN5250E, &body)
    }
}

fn fallback_device(device_name: &str) -> DeviceNegotiation {
    DeviceNegotiation {
        device_name: sanitize_device_name(device_name),
        device_type_display: true,
        record_mode: false,
        structured_field_response_mode: false,
    }
}

/// ASCII, 1..8 characters; truncates at an embedded NUL or at 8 bytes.
fn sanitize_device_name(name: &str) -> String {
    let bytes: Vec<u8> = name.bytes().take_while(|&b| b != 0).take(8).collect();
    if bytes.is_empty() {
        "TN5250".to_string()
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn decode_device_name(bytes: &[u8]) -> String {
    sanitize_device_name(&String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::{DO as T_DO, WILL as T_WILL};

    fn cfg() -> SessionConfig {
        SessionConfig::new("host", 23, "DSP01")
    }

    #[test]
    fn accepting_binary_both_ways_completes_basic_negotiation() {
        let mut neg = Negotiator::new(&cfg());
        neg.start();
        neg.handle(FramerEvent::OptionNegotiation { command: T_DO, option: OPT_BINARY }).unwrap();
        neg.handle(FramerEvent::OptionNegotiation { command: T_WILL, option: OPT_BINARY }).unwrap();
        neg.handle(FramerEvent::OptionNegotiation { command: T_DO, option: OPT_EOR }).unwrap();
        neg.handle(FramerEvent::OptionNegotiation { command: T_WILL, option: OPT_EOR }).unwrap();
        neg.handle(FramerEvent::OptionNegotiation { command: T_DO, option: OPT_SGA }).unwrap();
        let outcome = neg.handle(FramerEvent::OptionNegotiation { command: T_WILL, option: OPT_SGA }).unwrap();
        assert!(outcome.basic_complete);
    }

    #[test]
    fn terminal_type_send_gets_configured_type_back() {
        let mut neg = Negotiator::new(&cfg());
        let outcome = neg.handle(FramerEvent::Subnegotiation { option: OPT_TERMINAL_TYPE, data: vec![1] }).unwrap();
        assert!(outcome.reply.windows(b"IBM-3179-2".len()).any(|w| w == b"IBM-3179-2"));
    }

    #[test]
    fn malformed_tnescfg_falls_back_to_non_e() {
        let mut neg = Negotiator::new(&cfg());
        let outcome = neg
            .handle(FramerEvent::Subnegotiation { option: OPT_TN5250E, data: vec![0, 1, 0x99, 0, 0, 0, 0] })
            .unwrap();
        let device = outcome.device.unwrap();
        assert!(device.device_type_display);
        assert!(!device.record_mode);
    }

    #[test]
    fn valid_tnescfg_is_parsed() {
        let mut neg = Negotiator::new(&cfg());
        let name = b"DSP01";
        let mut data = vec![0u8, 0u8, TNE_TNESCFG, 0, 0, 0x00, 0x03];
        data.extend_from_slice(name);
        let len = data.len() as u16;
        data[0] = (len >> 8) as u8;
        data[1] = (len & 0xFF) as u8;
        let outcome = neg.handle(FramerEvent::Subnegotiation { option: OPT_TN5250E, data }).unwrap();
        let device = outcome.device.unwrap();
        assert_eq!(device.device_name, "DSP01");
        assert!(device.record_mode);
        assert!(device.structured_field_response_mode);
    }

    #[test]
    fn device_name_truncates_at_eight_bytes() {
        assert_eq!(sanitize_device_name("TOOLONGNAME"), "TOOLONGN");
    }
}
