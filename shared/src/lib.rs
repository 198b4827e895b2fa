//! Forwarding Board Protocol
//!
//! This crate provides the frame codec and command codes shared by the
//! operator client and the board emulator.

pub mod codec;

pub use codec::{CodecError, FrameDecoder, ParsedFrame};

use std::fmt::Write;

/// Address that every board on the bus answers to
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Operation codes understood by the forwarding board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Forward the payload to the serial side unchanged
    Passthrough = 0x00,
    SerialConfig = 0x01,
    SetCurrent = 0x03,
    ReadScr = 0x04,
    WriteScr = 0x05,
    /// Board uptime in seconds
    Runtime = 0xF2,
    /// MCU temperature in °C
    Temperature = 0xF6,
    /// MCU supply voltage in tenths of a volt
    Voltage = 0xF7,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Passthrough,
        Command::SerialConfig,
        Command::SetCurrent,
        Command::ReadScr,
        Command::WriteScr,
        Command::Runtime,
        Command::Temperature,
        Command::Voltage,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd.code()
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|cmd| cmd.code() == code)
            .ok_or(code)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Passthrough => "PASSTHROUGH",
            Command::SerialConfig => "SERIAL_CONFIG",
            Command::SetCurrent => "SET_CURRENT",
            Command::ReadScr => "READ_SCR",
            Command::WriteScr => "WRITE_SCR",
            Command::Runtime => "RUNTIME",
            Command::Temperature => "TEMPERATURE",
            Command::Voltage => "VOLTAGE",
        };
        write!(f, "{}({:#04X})", name, self.code())
    }
}

/// Format bytes as uppercase space separated hex, e.g. `AA 55 0D 0A`
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::try_from(0x04), Ok(Command::ReadScr));
        assert_eq!(Command::try_from(0xF7), Ok(Command::Voltage));
        assert_eq!(Command::try_from(0x02), Err(0x02));
        assert_eq!(u8::from(Command::Runtime), 0xF2);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::Temperature.to_string(), "TEMPERATURE(0xF6)");
        assert_eq!(Command::Passthrough.to_string(), "PASSTHROUGH(0x00)");
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[]), "");
        assert_eq!(hex_dump(&[0xAA, 0x55, 0x0d, 0x0a]), "AA 55 0D 0A");
    }
}
