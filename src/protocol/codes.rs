//! 5250 command, order, and AID byte constants.
//!
//! Grounded in the reference `lib5250::codes` module's *shape* — enums with
//! `from_u8`/`to_u8`, doc-commented constants, inline tests — but not its
//! byte *values*: the reference's `CMD_*` constants disagree with the
//! literal command table this crate implements in several places (e.g. its
//! Clear Format Table is `0x50`, Read Input Fields is `0x42`) and the
//! reference's own `lib5250::protocol` module was disabled as "uses wrong
//! command codes". The values below come straight from the command/order/
//! AID tables this implementation targets.

use crate::error::{Result, Tn5250Error};

/// Top-level 5250 command bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ClearUnit,
    ClearFormatTable,
    WriteToDisplay,
    WriteErrorCode,
    ReadInputFields,
    ReadMdtFields,
    ReadScreenImmediate,
    ReadImmediate,
    Escape,
    SaveScreen,
    RestoreScreen,
    ReadScreenToPrinter,
    WriteStructuredField,
}

impl Command {
    pub const CLEAR_UNIT: u8 = 0x40;
    pub const CLEAR_FORMAT_TABLE: u8 = 0x4F;
    pub const WRITE_TO_DISPLAY: u8 = 0x11;
    pub const WRITE_ERROR_CODE: u8 = 0xF3;
    pub const READ_INPUT_FIELDS: u8 = 0xF1;
    pub const READ_MDT_FIELDS: u8 = 0xF2;
    pub const READ_SCREEN_IMMEDIATE: u8 = 0x62;
    pub const READ_IMMEDIATE: u8 = 0x6B;
    pub const ESCAPE: u8 = 0x04;
    pub const SAVE_SCREEN: u8 = 0xF0;
    pub const RESTORE_SCREEN: u8 = 0xF5;
    pub const READ_SCREEN_TO_PRINTER: u8 = 0x12;
    pub const WRITE_STRUCTURED_FIELD: u8 = 0xD0;

    pub fn from_u8(byte: u8) -> Result<Self> {
        Ok(match byte {
            Self::CLEAR_UNIT => Command::ClearUnit,
            Self::CLEAR_FORMAT_TABLE => Command::ClearFormatTable,
            Self::WRITE_TO_DISPLAY => Command::WriteToDisplay,
            Self::WRITE_ERROR_CODE => Command::WriteErrorCode,
            Self::READ_INPUT_FIELDS => Command::ReadInputFields,
            Self::READ_MDT_FIELDS => Command::ReadMdtFields,
            Self::READ_SCREEN_IMMEDIATE => Command::ReadScreenImmediate,
            Self::READ_IMMEDIATE => Command::ReadImmediate,
            Self::ESCAPE => Command::Escape,
            Self::SAVE_SCREEN => Command::SaveScreen,
            Self::RESTORE_SCREEN => Command::RestoreScreen,
            Self::READ_SCREEN_TO_PRINTER => Command::ReadScreenToPrinter,
            Self::WRITE_STRUCTURED_FIELD => Command::WriteStructuredField,
            other => return Err(Tn5250Error::BadCommand(other)),
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Command::ClearUnit => Self::CLEAR_UNIT,
            Command::ClearFormatTable => Self::CLEAR_FORMAT_TABLE,
            Command::WriteToDisplay => Self::WRITE_TO_DISPLAY,
            Command::WriteErrorCode => Self::WRITE_ERROR_CODE,
            Command::ReadInputFields => Self::READ_INPUT_FIELDS,
            Command::ReadMdtFields => Self::READ_MDT_FIELDS,
            Command::ReadScreenImmediate => Self::READ_SCREEN_IMMEDIATE,
            Command::ReadImmediate => Self::READ_IMMEDIATE,
            Command::Escape => Self::ESCAPE,
            Command::SaveScreen => Self::SAVE_SCREEN,
            Command::RestoreScreen => Self::RESTORE_SCREEN,
            Command::ReadScreenToPrinter => Self::READ_SCREEN_TO_PRINTER,
            Command::WriteStructuredField => Self::WRITE_STRUCTURED_FIELD,
        }
    }
}

/// Orders recognized inside a Write-To-Display order stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Soh,
    Ra,
    Ea,
    Td,
    Sba,
    Ic,
    Mc,
    Sf,
    Wea,
    Src,
    StructuredField,
}

impl Order {
    pub const SOH: u8 = 0x01;
    pub const RA: u8 = 0x02;
    pub const EA: u8 = 0x03;
    pub const TD: u8 = 0x10;
    pub const SBA: u8 = 0x11;
    pub const IC: u8 = 0x13;
    pub const MC: u8 = 0x14;
    pub const SF: u8 = 0x1D;
    pub const WEA_LOW: u8 = 0x28;
    pub const WEA_HIGH: u8 = 0x29;
    pub const SRC: u8 = 0x2B;
    pub const STRUCTURED_FIELD: u8 = 0xF3;

    pub fn from_u8(byte: u8) -> Result<Self> {
        Ok(match byte {
            Self::SOH => Order::Soh,
            Self::RA => Order::Ra,
            Self::EA => Order::Ea,
            Self::TD => Order::Td,
            Self::SBA => Order::Sba,
            Self::IC => Order::Ic,
            Self::MC => Order::Mc,
            Self::SF => Order::Sf,
            Self::WEA_LOW | Self::WEA_HIGH => Order::Wea,
            Self::SRC => Order::Src,
            Self::STRUCTURED_FIELD => Order::StructuredField,
            other => return Err(Tn5250Error::BadOrder(other)),
        })
    }

    /// True when `byte` is printable data rather than an order code — the
    /// order dispatcher falls through to writing a character in this case.
    pub fn is_printable_data(byte: u8) -> bool {
        Self::from_u8(byte).is_err() && byte >= 0x40
    }
}

/// Attention Identifier bytes (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    Enter,
    Help,
    PageUp,
    PageDown,
    Print,
    Clear,
    Pf(u8),
    SysReq,
    Attn,
}

impl AidKey {
    pub const ENTER: u8 = 0xF1;
    pub const HELP: u8 = 0xF3;
    pub const PAGE_UP: u8 = 0xF4;
    pub const PAGE_DOWN: u8 = 0xF5;
    pub const PRINT: u8 = 0xF6;
    pub const CLEAR: u8 = 0xBD;
    pub const PF1: u8 = 0x31;
    pub const PF12: u8 = 0x3C;
    pub const PF13: u8 = 0xB1;
    pub const PF24: u8 = 0xBC;
    /// Not given a literal byte by spec.md; chosen per the real IBM 5250
    /// AID table and recorded as an Open-Question-adjacent decision in
    /// DESIGN.md.
    pub const SYS_REQ: u8 = 0x66;
    pub const ATTN: u8 = 0x6C;

    pub fn to_byte(self) -> u8 {
        match self {
            AidKey::Enter => Self::ENTER,
            AidKey::Help => Self::HELP,
            AidKey::PageUp => Self::PAGE_UP,
            AidKey::PageDown => Self::PAGE_DOWN,
            AidKey::Print => Self::PRINT,
            AidKey::Clear => Self::CLEAR,
            AidKey::Pf(n) if (1..=12).contains(&n) => Self::PF1 + (n - 1),
            AidKey::Pf(n) if (13..=24).contains(&n) => Self::PF13 + (n - 13),
            AidKey::Pf(_) => 0,
            AidKey::SysReq => Self::SYS_REQ,
            AidKey::Attn => Self::ATTN,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            Self::ENTER => AidKey::Enter,
            Self::HELP => AidKey::Help,
            Self::PAGE_UP => AidKey::PageUp,
            Self::PAGE_DOWN => AidKey::PageDown,
            Self::PRINT => AidKey::Print,
            Self::CLEAR => AidKey::Clear,
            Self::SYS_REQ => AidKey::SysReq,
            Self::ATTN => AidKey::Attn,
            b if (Self::PF1..=Self::PF12).contains(&b) => AidKey::Pf(b - Self::PF1 + 1),
            b if (Self::PF13..=Self::PF24).contains(&b) => AidKey::Pf(b - Self::PF13 + 13),
            _ => return None,
        })
    }
}
