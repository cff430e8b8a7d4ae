//! Command protocol for the serial device.
//!
//! The command set is closed: four symbolic commands with fixed wire
//! values. Outbound, one command is one 4-byte little-endian signed
//! word, no framing. Inbound, the device answers with newline
//! terminated lines each carrying one 4-byte little-endian signed
//! word. Values outside the closed set are rejected at this boundary,
//! never encoded.

use std::fmt;

/// A symbolic instruction for the microcontroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Command {
    DoNothing = 0,
    EmergencyStop = 1,
    TestLedOn = 2,
    TestLedOff = 3,
}

/// Command protocol errors. `UnknownValue`/`UnknownName` are reported
/// to the caller so a frontend can surface them; nothing is sent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command value {0}")]
    UnknownValue(i32),

    #[error("unknown command name {0:?}")]
    UnknownName(String),

    #[error("device word has {0} payload byte(s), expected 4")]
    WordLength(usize),
}

impl Command {
    /// Every command, in wire-value order.
    pub const ALL: [Command; 4] = [
        Command::DoNothing,
        Command::EmergencyStop,
        Command::TestLedOn,
        Command::TestLedOff,
    ];

    /// Wire value of this command.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Display name, matching the controller's command table.
    pub fn name(self) -> &'static str {
        match self {
            Command::DoNothing => "Do Nothing",
            Command::EmergencyStop => "Emergency Stop",
            Command::TestLedOn => "Test LED ON",
            Command::TestLedOff => "Test LED OFF",
        }
    }

    /// Looks up a command by wire value. Values outside {0..=3} are
    /// rejected; callers must not pack them.
    pub fn from_value(value: i32) -> Result<Self, CommandError> {
        match value {
            0 => Ok(Command::DoNothing),
            1 => Ok(Command::EmergencyStop),
            2 => Ok(Command::TestLedOn),
            3 => Ok(Command::TestLedOff),
            other => Err(CommandError::UnknownValue(other)),
        }
    }

    /// Looks up a command by display name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, CommandError> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CommandError::UnknownName(name.to_string()))
    }

    /// Packs this command into its 4-byte little-endian wire form.
    pub fn encode(self) -> [u8; 4] {
        self.value().to_le_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes one device output line into its 4-byte little-endian
/// signed word. A trailing `\n` or `\r\n` is stripped first; anything
/// other than exactly four payload bytes is malformed.
pub fn unpack_device_word(line: &[u8]) -> Result<i32, CommandError> {
    let mut payload = line;
    if payload.last() == Some(&b'\n') {
        payload = &payload[..payload.len() - 1];
    }
    if payload.last() == Some(&b'\r') {
        payload = &payload[..payload.len() - 1];
    }

    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| CommandError::WordLength(payload.len()))?;
    Ok(i32::from_le_bytes(bytes))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_value_are_mutual_inverses() {
        for command in Command::ALL {
            assert_eq!(Command::from_value(command.value()), Ok(command));
            assert_eq!(Command::from_name(command.name()), Ok(command));
        }
    }

    #[test]
    fn rejects_values_outside_closed_set() {
        for value in [-1, 4, 42, i32::MAX] {
            assert_eq!(
                Command::from_value(value),
                Err(CommandError::UnknownValue(value))
            );
        }
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(matches!(
            Command::from_name("Self Destruct"),
            Err(CommandError::UnknownName(_))
        ));
    }

    #[test]
    fn emergency_stop_wire_form() {
        assert_eq!(Command::EmergencyStop.encode(), [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(Command::TestLedOff.encode(), [0x03, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn unpacks_device_word_with_newline() {
        assert_eq!(unpack_device_word(b"\x02\x00\x00\x00\n"), Ok(2));
        assert_eq!(unpack_device_word(b"\x02\x00\x00\x00\r\n"), Ok(2));
        assert_eq!(unpack_device_word(b"\x02\x00\x00\x00"), Ok(2));
    }

    #[test]
    fn unpacks_negative_word() {
        assert_eq!(unpack_device_word(b"\xff\xff\xff\xff\n"), Ok(-1));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(unpack_device_word(b"\n"), Err(CommandError::WordLength(0)));
        assert_eq!(
            unpack_device_word(b"\x01\x02\n"),
            Err(CommandError::WordLength(2))
        );
        assert_eq!(
            unpack_device_word(b"\x01\x02\x03\x04\x05\n"),
            Err(CommandError::WordLength(5))
        );
    }
}
