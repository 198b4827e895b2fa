//! Builders for the requests the operator can issue

use super::task::{Task, TaskContext};
use board_protocol::{codec, CodecError, Command, BROADCAST_ADDRESS};

fn build(address: u8, command: Command, payload: &[u8], context: TaskContext) -> Task {
    // Payloads built here are at most one byte, well inside the frame limit
    let frame = codec::encode(address, command.code(), payload)
        .unwrap_or_else(|e| unreachable!("fixed request payload rejected: {e}"));
    Task::new(frame, Some(context))
}

/// Set the output current of one board channel (cmd 0x03)
pub fn set_current(address: u8, value: u8) -> Task {
    build(
        address,
        Command::SetCurrent,
        &[value],
        TaskContext::CurrentSetting { address, value },
    )
}

/// Read the SCR register (cmd 0x04)
pub fn read_scr(address: u8) -> Task {
    build(
        address,
        Command::ReadScr,
        &[],
        TaskContext::ReadScr { address },
    )
}

/// Write the SCR register (cmd 0x05)
pub fn write_scr(address: u8, value: u8) -> Task {
    build(
        address,
        Command::WriteScr,
        &[value],
        TaskContext::WriteScr { address, value },
    )
}

/// Board uptime (cmd 0xF2)
pub fn query_runtime(address: u8) -> Task {
    build(
        address,
        Command::Runtime,
        &[],
        TaskContext::Runtime { address },
    )
}

/// Broadcast temperature query (cmd 0xF6)
pub fn query_temperature() -> Task {
    build(
        BROADCAST_ADDRESS,
        Command::Temperature,
        &[],
        TaskContext::Temperature,
    )
}

/// Broadcast voltage query (cmd 0xF7)
pub fn query_voltage() -> Task {
    build(
        BROADCAST_ADDRESS,
        Command::Voltage,
        &[],
        TaskContext::Voltage,
    )
}

/// Wrap arbitrary payload bytes in a passthrough frame (cmd 0x00)
pub fn passthrough(address: u8, payload: &[u8], label: impl Into<String>) -> Result<Task, CodecError> {
    let frame = codec::encode(address, Command::Passthrough.code(), payload)?;
    Ok(Task::new(
        frame,
        Some(TaskContext::Custom {
            label: label.into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_scr_frame() {
        let task = read_scr(0x02);
        assert_eq!(
            &task.frame()[..],
            &[0xAA, 0x55, 0x02, 0x04, 0x00, 0x00, 0x06, 0x0D, 0x0A]
        );
        assert_eq!(task.context(), Some(&TaskContext::ReadScr { address: 0x02 }));
    }

    #[test]
    fn test_set_current_frame() {
        let task = set_current(0x01, 0x05);
        let parsed = codec::decode(task.frame()).unwrap();
        assert_eq!(parsed.command, 0x03);
        assert_eq!(&parsed.data[..], &[0x05]);
        assert_eq!(
            task.context(),
            Some(&TaskContext::CurrentSetting {
                address: 0x01,
                value: 0x05
            })
        );
    }

    #[test]
    fn test_status_queries_are_broadcast() {
        for (task, cmd) in [(query_temperature(), 0xF6), (query_voltage(), 0xF7)] {
            let parsed = codec::decode(task.frame()).unwrap();
            assert_eq!(parsed.address, BROADCAST_ADDRESS);
            assert_eq!(parsed.command, cmd);
            assert!(parsed.data.is_empty());
        }
    }

    #[test]
    fn test_passthrough_rejects_oversized_payload() {
        assert!(passthrough(0x01, &[0u8; 256], "big").is_err());
        let task = passthrough(0x01, &[1, 2, 3], "small").unwrap();
        assert_eq!(task.frame().len(), 12);
    }
}
