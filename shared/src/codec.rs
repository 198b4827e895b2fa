//! Fixed-layout frame codec
//!
//! Every message on the wire is framed as:
//! ```text
//! [ AA 55 ][ addr ][ cmd ][ len ][ len bytes: payload ][ checksum u16 BE ][ 0D 0A ]
//! ```
//!
//! The checksum is `(addr + cmd + len + sum(payload)) mod 65536`.
//! Frames carry no sequence number, so responses are matched to requests
//! purely by order on the connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Frame start marker
pub const HEADER: [u8; 2] = [0xAA, 0x55];

/// Frame end marker
pub const FOOTER: [u8; 2] = [0x0D, 0x0A];

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Shortest buffer the decoders will look at (header through checksum)
pub const MIN_FRAME_LEN: usize = 7;

/// Bytes in a frame that are not payload
pub const FRAME_OVERHEAD: usize = 9;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Payload too large: {0} bytes (max: {MAX_PAYLOAD_LEN})")]
    PayloadTooLarge(usize),

    #[error("Frame too short: {0} bytes (min: {MIN_FRAME_LEN})")]
    TooShort(usize),

    #[error("Bad frame header: {:02X} {:02X}", .0[0], .0[1])]
    BadHeader([u8; 2]),

    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Checksum mismatch: expected {expected:#06X}, got {actual:#06X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Bad frame footer: {:02X} {:02X}", .0[0], .0[1])]
    BadFooter([u8; 2]),
}

impl CodecError {
    /// True for malformed input, false for caller misuse (oversized payload)
    pub fn is_format_error(&self) -> bool {
        !matches!(self, CodecError::PayloadTooLarge(_))
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub address: u8,
    pub command: u8,
    pub data: Bytes,
}

/// Compute the frame checksum over address, command, length and payload
pub fn checksum(address: u8, command: u8, payload: &[u8]) -> u16 {
    let seed = address as u32 + command as u32 + payload.len() as u32;
    let sum = payload.iter().fold(seed, |acc, &b| acc + b as u32);
    (sum & 0xFFFF) as u16
}

/// Encode a frame into a new buffer
pub fn encode(address: u8, command: u8, payload: &[u8]) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    encode_into(address, command, payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame directly into a provided buffer
pub fn encode_into(
    address: u8,
    command: u8,
    payload: &[u8],
    buf: &mut BytesMut,
) -> Result<(), CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }

    buf.reserve(FRAME_OVERHEAD + payload.len());
    buf.put_slice(&HEADER);
    buf.put_u8(address);
    buf.put_u8(command);
    buf.put_u8(payload.len() as u8);
    buf.put_slice(payload);
    buf.put_u16(checksum(address, command, payload));
    buf.put_slice(&FOOTER);

    Ok(())
}

fn check_prefix(buf: &[u8]) -> Result<(), CodecError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(CodecError::TooShort(buf.len()));
    }
    if buf[..2] != HEADER {
        return Err(CodecError::BadHeader([buf[0], buf[1]]));
    }
    Ok(())
}

/// Decode a complete frame, verifying checksum and footer
///
/// Trailing bytes after the footer are ignored.
pub fn decode(buf: &[u8]) -> Result<ParsedFrame, CodecError> {
    check_prefix(buf)?;

    let len = buf[4] as usize;
    let needed = FRAME_OVERHEAD + len;
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: buf.len(),
        });
    }

    let (address, command) = (buf[2], buf[3]);
    let payload = &buf[5..5 + len];

    let expected = checksum(address, command, payload);
    let actual = u16::from_be_bytes([buf[5 + len], buf[6 + len]]);
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    let footer = [buf[7 + len], buf[8 + len]];
    if footer != FOOTER {
        return Err(CodecError::BadFooter(footer));
    }

    Ok(ParsedFrame {
        address,
        command,
        data: Bytes::copy_from_slice(payload),
    })
}

/// Decode trusting the length field, without checksum or footer checks
///
/// Matches what older boards and tools accept: only the minimum length and
/// the header are checked, and the payload is clipped to what is present.
pub fn decode_lenient(buf: &[u8]) -> Result<ParsedFrame, CodecError> {
    check_prefix(buf)?;

    let len = buf[4] as usize;
    let end = (5 + len).min(buf.len());

    Ok(ParsedFrame {
        address: buf[2],
        command: buf[3],
        data: Bytes::copy_from_slice(&buf[5..end]),
    })
}

/// Streaming decoder for byte streams that may split or coalesce frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Bytes before a header are discarded. A corrupt frame is consumed and
    /// reported so the caller can keep going with the rest of the stream.
    /// Returns `Ok(None)` when more data is needed.
    pub fn decode_next(&mut self) -> Result<Option<ParsedFrame>, CodecError> {
        self.resync();

        if self.buffer.len() < MIN_FRAME_LEN {
            return Ok(None);
        }

        let total = FRAME_OVERHEAD + self.buffer[4] as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total);
        decode(&frame).map(Some)
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    fn resync(&mut self) {
        let start = self
            .buffer
            .windows(2)
            .position(|w| w == HEADER)
            .unwrap_or_else(|| {
                // Keep a trailing 0xAA, it may be the first half of a header
                match self.buffer.last() {
                    Some(&b) if b == HEADER[0] => self.buffer.len() - 1,
                    _ => self.buffer.len(),
                }
            });
        self.buffer.advance(start);
    }
}
