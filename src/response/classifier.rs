//! Response classifier
//!
//! Turns a raw response plus the context of the task that produced it into
//! a typed [`Classification`]. Failures stay local: `handle` logs them and
//! moves on, so one bad response never stops the ones behind it.

use super::history::History;
use crate::command::TaskContext;
use crate::polling::format_runtime;
use board_protocol::{codec, hex_dump, CodecError, ParsedFrame};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Widest payload read as a big-endian integer
const MAX_VALUE_BYTES: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("Undecodable response: {0}")]
    Decode(#[from] CodecError),

    #[error("Response carried no payload")]
    EmptyPayload,

    #[error("Payload of {0} bytes is too wide for a value")]
    PayloadTooWide(usize),
}

/// What a response meant, given the request it answered
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// No context attached; nothing to interpret
    Raw { response: Bytes },
    CurrentApplied { address: u8, value: u8 },
    ScrValue { address: u8, value: u8 },
    ScrWritten { address: u8, value: u8 },
    Temperature { celsius: u64 },
    /// Tenths of a volt as reported by the board
    Voltage { tenths: u64 },
    DeviceRuntime { address: u8, seconds: u64 },
    Unclassified { label: String, response: Bytes },
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Raw { response } => write!(f, "Raw response: {}", hex_dump(response)),
            Classification::CurrentApplied { address, value } => {
                write!(f, "Device {:#04X} current set to {}", address, value)
            }
            Classification::ScrValue { address, value } => {
                write!(f, "Device {:#04X} SCR value: {}", address, value)
            }
            Classification::ScrWritten { address, value } => {
                write!(f, "Device {:#04X} SCR write acknowledged ({:#04X})", address, value)
            }
            Classification::Temperature { celsius } => write!(f, "Temperature: {} °C", celsius),
            Classification::Voltage { tenths } => {
                write!(f, "Voltage: {}.{} V", tenths / 10, tenths % 10)
            }
            Classification::DeviceRuntime { address, seconds } => write!(
                f,
                "Device {:#04X} runtime: {}",
                address,
                format_runtime(Duration::from_secs(*seconds))
            ),
            Classification::Unclassified { label, response } => {
                write!(f, "Unclassified response ({}): {}", label, hex_dump(response))
            }
        }
    }
}

/// Interpret a payload as a big-endian unsigned integer
pub fn be_value(data: &[u8]) -> Result<u64, ClassificationError> {
    if data.is_empty() {
        return Err(ClassificationError::EmptyPayload);
    }
    if data.len() > MAX_VALUE_BYTES {
        return Err(ClassificationError::PayloadTooWide(data.len()));
    }
    Ok(data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

pub struct ResponseClassifier {
    verify_checksum: bool,
    temperatures: History<u64>,
    voltages: History<f64>,
}

impl ResponseClassifier {
    pub fn new(history_len: usize, verify_checksum: bool) -> Self {
        Self {
            verify_checksum,
            temperatures: History::new(history_len),
            voltages: History::new(history_len),
        }
    }

    /// Recent temperatures in °C
    pub fn temperature_history(&self) -> &History<u64> {
        &self.temperatures
    }

    /// Recent voltages in volts
    pub fn voltage_history(&self) -> &History<f64> {
        &self.voltages
    }

    pub fn classify(
        &mut self,
        response: &[u8],
        context: Option<&TaskContext>,
    ) -> Result<Classification, ClassificationError> {
        let Some(context) = context else {
            return Ok(Classification::Raw {
                response: Bytes::copy_from_slice(response),
            });
        };

        let classification = match context {
            TaskContext::CurrentSetting { address, value } => Classification::CurrentApplied {
                address: *address,
                value: *value,
            },
            TaskContext::WriteScr { address, value } => Classification::ScrWritten {
                address: *address,
                value: *value,
            },
            TaskContext::ReadScr { address } => {
                let frame = self.decode(response)?;
                let value = *frame.data.first().ok_or(ClassificationError::EmptyPayload)?;
                Classification::ScrValue {
                    address: *address,
                    value,
                }
            }
            TaskContext::Temperature => {
                let celsius = be_value(&self.decode(response)?.data)?;
                self.temperatures.push(celsius);
                Classification::Temperature { celsius }
            }
            TaskContext::Voltage => {
                let tenths = be_value(&self.decode(response)?.data)?;
                self.voltages.push(tenths as f64 / 10.0);
                Classification::Voltage { tenths }
            }
            TaskContext::Runtime { address } => Classification::DeviceRuntime {
                address: *address,
                seconds: be_value(&self.decode(response)?.data)?,
            },
            TaskContext::Custom { label } => Classification::Unclassified {
                label: label.clone(),
                response: Bytes::copy_from_slice(response),
            },
        };

        Ok(classification)
    }

    /// Classify and log; errors are reported here and go no further
    pub fn handle(&mut self, response: &[u8], context: Option<&TaskContext>) -> Option<Classification> {
        match self.classify(response, context) {
            Ok(classification) => {
                info!("[CLASSIFY] {}", classification);
                Some(classification)
            }
            Err(e) => {
                let kind = context.map_or("raw", |c| c.kind());
                warn!("[CLASSIFY] {} response {}: {}", kind, hex_dump(response), e);
                None
            }
        }
    }

    fn decode(&self, response: &[u8]) -> Result<ParsedFrame, CodecError> {
        if self.verify_checksum {
            codec::decode(response)
        } else {
            codec::decode_lenient(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(address: u8, command: u8, payload: &[u8]) -> Bytes {
        codec::encode(address, command, payload).unwrap()
    }

    #[test]
    fn test_read_scr_value() {
        let mut classifier = ResponseClassifier::new(20, true);
        let result = classifier
            .classify(&reply(0x02, 0x04, &[0x48]), Some(&TaskContext::ReadScr { address: 0x02 }))
            .unwrap();
        assert_eq!(
            result,
            Classification::ScrValue {
                address: 0x02,
                value: 72
            }
        );
        assert_eq!(result.to_string(), "Device 0x02 SCR value: 72");
    }

    #[test]
    fn test_read_scr_empty_payload() {
        let mut classifier = ResponseClassifier::new(20, true);
        let err = classifier
            .classify(&reply(0x02, 0x04, &[]), Some(&TaskContext::ReadScr { address: 0x02 }))
            .unwrap_err();
        assert_eq!(err, ClassificationError::EmptyPayload);
    }

    #[test]
    fn test_context_only_kinds_skip_decoding() {
        let mut classifier = ResponseClassifier::new(20, true);
        // Garbage response is fine: the outcome is carried by the context
        let current = classifier
            .classify(&[0x00], Some(&TaskContext::CurrentSetting { address: 1, value: 5 }))
            .unwrap();
        assert_eq!(current, Classification::CurrentApplied { address: 1, value: 5 });

        let written = classifier
            .classify(&[0x00], Some(&TaskContext::WriteScr { address: 2, value: 0x48 }))
            .unwrap();
        assert_eq!(written.to_string(), "Device 0x02 SCR write acknowledged (0x48)");
    }

    #[test]
    fn test_temperature_and_voltage_histories() {
        let mut classifier = ResponseClassifier::new(3, true);
        for t in [40u8, 41, 42, 43] {
            classifier
                .classify(&reply(0xFF, 0xF6, &[0x00, t]), Some(&TaskContext::Temperature))
                .unwrap();
        }
        assert_eq!(
            classifier.temperature_history().iter().copied().collect::<Vec<_>>(),
            vec![41, 42, 43]
        );

        let voltage = classifier
            .classify(&reply(0xFF, 0xF7, &[0x09, 0xC4]), Some(&TaskContext::Voltage))
            .unwrap();
        assert_eq!(voltage, Classification::Voltage { tenths: 2500 });
        assert_eq!(voltage.to_string(), "Voltage: 250.0 V");
        assert_eq!(classifier.voltage_history().latest(), Some(&250.0));
    }

    #[test]
    fn test_runtime_display() {
        let mut classifier = ResponseClassifier::new(20, true);
        let runtime = classifier
            .classify(
                &reply(0x01, 0xF2, &[0x00, 0x00, 0x03, 0xE8]),
                Some(&TaskContext::Runtime { address: 0x01 }),
            )
            .unwrap();
        assert_eq!(runtime.to_string(), "Device 0x01 runtime: 00:16:40");
    }

    #[test]
    fn test_raw_and_custom() {
        let mut classifier = ResponseClassifier::new(20, true);
        let raw = classifier.classify(&[0xAA, 0x55], None).unwrap();
        assert_eq!(raw.to_string(), "Raw response: AA 55");

        let custom = TaskContext::Custom {
            label: "AA BB".into(),
        };
        let result = classifier.classify(&[0x01, 0x02], Some(&custom)).unwrap();
        assert_eq!(result.to_string(), "Unclassified response (AA BB): 01 02");
    }

    #[test]
    fn test_strict_and_lenient_checksum() {
        let mut frame = reply(0x02, 0x04, &[0x48]).to_vec();
        frame[6] ^= 0xFF;
        let ctx = TaskContext::ReadScr { address: 0x02 };

        let mut strict = ResponseClassifier::new(20, true);
        assert!(matches!(
            strict.classify(&frame, Some(&ctx)),
            Err(ClassificationError::Decode(CodecError::ChecksumMismatch { .. }))
        ));

        let mut lenient = ResponseClassifier::new(20, false);
        assert_eq!(
            lenient.classify(&frame, Some(&ctx)).unwrap(),
            Classification::ScrValue {
                address: 0x02,
                value: 0x48
            }
        );
    }

    #[test]
    fn test_failure_does_not_poison_next_response() {
        let mut classifier = ResponseClassifier::new(20, true);
        assert!(classifier
            .handle(&[0x01, 0x02, 0x03], Some(&TaskContext::Temperature))
            .is_none());
        assert!(classifier
            .handle(&reply(0xFF, 0xF6, &[0x2D]), Some(&TaskContext::Temperature))
            .is_some());
        assert_eq!(classifier.temperature_history().len(), 1);
    }

    #[test]
    fn test_be_value_bounds() {
        assert_eq!(be_value(&[0x01, 0x00]), Ok(256));
        assert_eq!(be_value(&[]), Err(ClassificationError::EmptyPayload));
        assert_eq!(be_value(&[0u8; 9]), Err(ClassificationError::PayloadTooWide(9)));
        assert_eq!(be_value(&[0xFF; 8]), Ok(u64::MAX));
    }
}
