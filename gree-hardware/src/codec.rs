//! Frame encoding and decoding
//!
//! Every frame starts with two sync bytes, a length byte and a command byte,
//! and ends with a checksum:
//!
//! ```text
//! 7E 7E <len> <cmd> <data ...> <checksum>
//! ```
//!
//! `len` counts every byte after itself, so a frame is `len + 3` bytes long.
//! The checksum is the byte sum of everything from `len` up to, but not
//! including, the checksum byte itself.

use gree_core::{DecodeError, EncodeError};

use crate::registers::{DeviceRegisters, FORCE_UPDATE_BYTE, FORCE_UPDATE_VALUE};

/// Frame synchronization byte, sent twice at the start of every frame
pub const SYNC_BYTE: u8 = 0x7E;

/// Sync, sync, length, command
pub const HEADER_LEN: usize = 4;

/// Longest frame either side sends
pub const MAX_FRAME_LEN: usize = FrameKind::Report.frame_len();

/// Frame kinds understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Sent to the unit every polling cycle
    Command = 0x01,
    /// Sent by the unit in reply to a command
    Report = 0x31,
}

impl FrameKind {
    pub fn from_command_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameKind::Command),
            0x31 => Some(FrameKind::Report),
            _ => None,
        }
    }

    pub const fn command_byte(self) -> u8 {
        self as u8
    }

    /// Value of the length byte for this kind
    pub const fn length_byte(self) -> u8 {
        match self {
            FrameKind::Command => 0x2F,
            FrameKind::Report => 0x31,
        }
    }

    /// Total frame length in bytes
    pub const fn frame_len(self) -> usize {
        self.length_byte() as usize + 3
    }
}

/// A length-delimited frame whose checksum has been verified (or computed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFrame {
    kind: FrameKind,
    bytes: Vec<u8>,
}

impl ProtocolFrame {
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Whether the frame asks the unit to apply its register block
    pub fn is_forced(&self) -> bool {
        self.bytes[FORCE_UPDATE_BYTE] == FORCE_UPDATE_VALUE
    }
}

/// Content of an outgoing command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFields {
    pub registers: DeviceRegisters,
    /// When false the unit only answers with a report and ignores the registers
    pub force_update: bool,
}

impl CommandFields {
    /// Command that the unit applies
    pub fn forced(registers: DeviceRegisters) -> Self {
        Self {
            registers,
            force_update: true,
        }
    }

    /// Command that only solicits a report
    pub fn passive(registers: DeviceRegisters) -> Self {
        Self {
            registers,
            force_update: false,
        }
    }

    /// Passive command sent before the unit's state is known
    pub fn handshake() -> Self {
        Self::passive(DeviceRegisters::default())
    }
}

/// Checksum over a frame body that does not yet include its checksum byte
pub fn checksum(body: &[u8]) -> u8 {
    body.iter()
        .skip(2)
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Build a command frame
///
/// # Errors
///
/// Returns `EncodeError::OutOfRange` if a register value does not fit its
/// field.
pub fn encode(fields: &CommandFields) -> Result<ProtocolFrame, EncodeError> {
    let mut registers = fields.registers;
    registers.indoor_temperature = None;

    let mut bytes = build(FrameKind::Command, &registers)?;
    if fields.force_update {
        bytes[FORCE_UPDATE_BYTE] = FORCE_UPDATE_VALUE;
    }
    Ok(seal(FrameKind::Command, bytes))
}

/// Build a report frame as the unit would send it
pub fn encode_report(registers: &DeviceRegisters) -> Result<ProtocolFrame, EncodeError> {
    let bytes = build(FrameKind::Report, registers)?;
    Ok(seal(FrameKind::Report, bytes))
}

fn build(kind: FrameKind, registers: &DeviceRegisters) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = vec![0u8; kind.frame_len()];
    bytes[0] = SYNC_BYTE;
    bytes[1] = SYNC_BYTE;
    bytes[2] = kind.length_byte();
    bytes[3] = kind.command_byte();
    registers.pack_into(&mut bytes)?;
    Ok(bytes)
}

fn seal(kind: FrameKind, mut bytes: Vec<u8>) -> ProtocolFrame {
    let last = bytes.len() - 1;
    bytes[last] = checksum(&bytes[..last]);
    ProtocolFrame { kind, bytes }
}

/// Total frame length announced by a header
///
/// `header` must hold at least [`HEADER_LEN`] bytes.
pub fn frame_len_for_header(header: &[u8]) -> Result<usize, DecodeError> {
    if header.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            actual: header.len(),
        });
    }
    if header[0] != SYNC_BYTE {
        return Err(DecodeError::UnknownHeader(header[0]));
    }
    if header[1] != SYNC_BYTE {
        return Err(DecodeError::UnknownHeader(header[1]));
    }

    let kind = FrameKind::from_command_byte(header[3]).ok_or(DecodeError::UnknownHeader(header[3]))?;
    if header[2] != kind.length_byte() {
        return Err(DecodeError::LengthMismatch {
            expected: kind.frame_len(),
            actual: header[2] as usize + 3,
        });
    }

    Ok(kind.frame_len())
}

/// Verify and wrap a complete frame
///
/// # Errors
///
/// - `Truncated` if fewer bytes than the header announces are present
/// - `UnknownHeader` for bad sync bytes or an unknown command byte
/// - `LengthMismatch` if the length byte does not match the command, or
///   trailing bytes follow the frame
/// - `ChecksumMismatch` if the checksum does not verify
pub fn decode(bytes: &[u8]) -> Result<ProtocolFrame, DecodeError> {
    let expected = frame_len_for_header(bytes)?;

    if bytes.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let last = expected - 1;
    let computed = checksum(&bytes[..last]);
    if computed != bytes[last] {
        return Err(DecodeError::ChecksumMismatch {
            expected: computed,
            actual: bytes[last],
        });
    }

    let kind = FrameKind::from_command_byte(bytes[3]).ok_or(DecodeError::UnknownHeader(bytes[3]))?;
    Ok(ProtocolFrame {
        kind,
        bytes: bytes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{Code, OperatingMode};
    use gree_core::FanMode;

    fn sample_registers() -> DeviceRegisters {
        DeviceRegisters {
            power: true,
            mode: Code::Known(OperatingMode::Cool),
            fan: Code::Known(FanMode::Medium),
            ..DeviceRegisters::default()
        }
    }

    #[test]
    fn test_frame_lengths() {
        assert_eq!(FrameKind::Command.frame_len(), 50);
        assert_eq!(FrameKind::Report.frame_len(), 52);
        assert_eq!(MAX_FRAME_LEN, 52);
    }

    #[test]
    fn test_checksum_skips_sync_bytes() {
        assert_eq!(checksum(&[0x7E, 0x7E, 0x01, 0x02, 0x03]), 0x06);
        assert_eq!(checksum(&[0x7E, 0x7E, 0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_encode_command_header() {
        let frame = encode(&CommandFields::forced(sample_registers())).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(frame.kind(), FrameKind::Command);
        assert_eq!(bytes.len(), 50);
        assert_eq!(&bytes[..4], &[0x7E, 0x7E, 0x2F, 0x01]);
        assert_eq!(frame.checksum(), checksum(&bytes[..49]));
        assert!(frame.is_forced());
    }

    #[test]
    fn test_passive_command_not_forced() {
        let frame = encode(&CommandFields::passive(sample_registers())).unwrap();
        assert!(!frame.is_forced());

        let handshake = encode(&CommandFields::handshake()).unwrap();
        assert!(!handshake.is_forced());
    }

    #[test]
    fn test_command_omits_indoor_temperature() {
        let registers = DeviceRegisters {
            indoor_temperature: Some(62),
            ..sample_registers()
        };
        let frame = encode(&CommandFields::forced(registers)).unwrap();
        assert_eq!(frame.as_bytes().len(), 50);
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = encode_report(&sample_registers()).unwrap();
        let decoded = decode(frame.as_bytes()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.kind(), FrameKind::Report);
    }

    #[test]
    fn test_decode_rejects_every_payload_bit_flip() {
        let frame = encode_report(&sample_registers()).unwrap();
        let original = frame.into_bytes();

        for index in HEADER_LEN..original.len() {
            for bit in 0..8 {
                let mut corrupted = original.clone();
                corrupted[index] ^= 1 << bit;
                assert!(
                    matches!(
                        decode(&corrupted),
                        Err(DecodeError::ChecksumMismatch { .. })
                    ),
                    "flip of bit {} in byte {} was accepted",
                    bit,
                    index
                );
            }
        }
    }

    #[test]
    fn test_decode_truncated() {
        let frame = encode_report(&sample_registers()).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(
            decode(&bytes[..30]),
            Err(DecodeError::Truncated {
                expected: 52,
                actual: 30
            })
        );
        assert_eq!(
            decode(&bytes[..2]),
            Err(DecodeError::Truncated {
                expected: HEADER_LEN,
                actual: 2
            })
        );
    }

    #[test]
    fn test_decode_unknown_header() {
        let mut bytes = encode_report(&sample_registers()).unwrap().into_bytes();
        bytes[0] = 0x55;
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownHeader(0x55)));

        let mut bytes = encode_report(&sample_registers()).unwrap().into_bytes();
        bytes[3] = 0x99;
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownHeader(0x99)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut bytes = encode_report(&sample_registers()).unwrap().into_bytes();
        bytes[2] = 0x2F;
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::LengthMismatch {
                expected: 52,
                actual: 50
            })
        );

        let mut bytes = encode_report(&sample_registers()).unwrap().into_bytes();
        bytes.push(0x00);
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::LengthMismatch {
                expected: 52,
                actual: 53
            })
        );
    }

    #[test]
    fn test_frame_len_for_header() {
        assert_eq!(frame_len_for_header(&[0x7E, 0x7E, 0x31, 0x31]), Ok(52));
        assert_eq!(frame_len_for_header(&[0x7E, 0x7E, 0x2F, 0x01]), Ok(50));
        assert!(frame_len_for_header(&[0x7E, 0x7E, 0x7E, 0x31]).is_err());
    }
}
