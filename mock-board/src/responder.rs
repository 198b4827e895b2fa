//! Canned replies of the reference board

use board_protocol::{codec, Command, ParsedFrame};
use bytes::Bytes;

/// Reply payload for a request, keyed on its command code
pub fn reply_payload(frame: &ParsedFrame) -> Bytes {
    match Command::try_from(frame.command) {
        Ok(Command::Passthrough) => frame.data.clone(),
        Ok(Command::SerialConfig) => Bytes::from_static(&[0x01]),
        Ok(Command::ReadScr) => Bytes::from_static(&[0x48]),
        Ok(Command::WriteScr) => Bytes::from_static(&[0x06]),
        // 1000 seconds of uptime
        Ok(Command::Runtime) => Bytes::from_static(&[0x00, 0x00, 0x03, 0xE8]),
        // 45 °C
        Ok(Command::Temperature) => Bytes::from_static(&[0x00, 0x2D]),
        // 250.0 V in tenths
        Ok(Command::Voltage) => Bytes::from_static(&[0x09, 0xC4]),
        Ok(Command::SetCurrent) | Err(_) => Bytes::from_static(&[0x00]),
    }
}

/// Full reply frame, addressed back to the requester
pub fn respond(frame: &ParsedFrame) -> Bytes {
    let payload = reply_payload(frame);
    // Request payloads are at most 255 bytes, so the echo always fits
    codec::encode(frame.address, frame.command, &payload)
        .unwrap_or_else(|_| Bytes::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(address: u8, command: u8, data: &[u8]) -> ParsedFrame {
        ParsedFrame {
            address,
            command,
            data: Bytes::copy_from_slice(data),
        }
    }

    #[test]
    fn test_canned_payloads() {
        let cases: [(u8, &[u8]); 8] = [
            (0x01, &[0x01]),
            (0x03, &[0x00]),
            (0x04, &[0x48]),
            (0x05, &[0x06]),
            (0xF2, &[0x00, 0x00, 0x03, 0xE8]),
            (0xF6, &[0x00, 0x2D]),
            (0xF7, &[0x09, 0xC4]),
            (0x42, &[0x00]),
        ];
        for (command, expected) in cases {
            assert_eq!(&reply_payload(&request(1, command, &[7]))[..], expected, "cmd {command:#04X}");
        }
    }

    #[test]
    fn test_passthrough_echo_frame() {
        let reply = respond(&request(0x09, 0x00, &[1, 2, 3]));
        let parsed = codec::decode(&reply).unwrap();
        assert_eq!(parsed.address, 0x09);
        assert_eq!(parsed.command, 0x00);
        assert_eq!(&parsed.data[..], &[1, 2, 3]);
    }
}
