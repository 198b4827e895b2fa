//! Parsing of operator-typed byte strings

use thiserror::Error;

/// How the operator typed the bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    /// `AA BB CC`, `AABBCC`, `AA-BB:CC`
    #[default]
    Hex,
    /// `170 187 204` or `170,187,204`
    Decimal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadParseError {
    #[error("No data to send")]
    Empty,

    #[error("Invalid byte '{0}'")]
    InvalidByte(String),

    #[error("Byte value {0} out of range [0-255]")]
    OutOfRange(String),
}

/// Parse operator input into raw bytes
pub fn parse_payload(input: &str, radix: Radix) -> Result<Vec<u8>, PayloadParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PayloadParseError::Empty);
    }

    let bytes = match radix {
        Radix::Hex => parse_hex(input)?,
        Radix::Decimal => parse_decimal(input)?,
    };

    if bytes.is_empty() {
        return Err(PayloadParseError::Empty);
    }
    Ok(bytes)
}

/// Parse a single byte typed as decimal (`72`) or `0x`-prefixed hex (`0x48`)
pub fn parse_byte(input: &str) -> Result<u8, PayloadParseError> {
    let input = input.trim();
    let value = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse::<u32>(),
    }
    .map_err(|_| PayloadParseError::InvalidByte(input.to_string()))?;
    u8::try_from(value).map_err(|_| PayloadParseError::OutOfRange(input.to_string()))
}

fn parse_hex(input: &str) -> Result<Vec<u8>, PayloadParseError> {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | ':' | ','))
        .collect();

    if compact.len() % 2 == 0 {
        return (0..compact.len())
            .step_by(2)
            .map(|i| {
                let pair = compact.get(i..i + 2).unwrap_or_default();
                hex_byte(pair)
            })
            .collect();
    }

    // Odd digit count: fall back to whitespace separated tokens like "A BB CC"
    input.split_whitespace().map(hex_byte).collect()
}

fn hex_byte(token: &str) -> Result<u8, PayloadParseError> {
    let value = u32::from_str_radix(token, 16)
        .map_err(|_| PayloadParseError::InvalidByte(token.to_string()))?;
    u8::try_from(value).map_err(|_| PayloadParseError::OutOfRange(token.to_string()))
}

fn parse_decimal(input: &str) -> Result<Vec<u8>, PayloadParseError> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let value: i64 = part
                .parse()
                .map_err(|_| PayloadParseError::InvalidByte(part.to_string()))?;
            u8::try_from(value).map_err(|_| PayloadParseError::OutOfRange(part.to_string()))
        })
        .collect()
}
