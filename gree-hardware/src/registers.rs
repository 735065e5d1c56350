//! Bit-packed register snapshot of an indoor unit
//!
//! Offsets are absolute positions within a frame (sync bytes included), so
//! the same layout applies to command and report frames. Report frames carry
//! the indoor temperature in addition.
//!
//! | Byte | Bits   | Meaning                                             |
//! |------|--------|-----------------------------------------------------|
//! | 4    | `0x08` | sleep                                               |
//! | 6    | `0x04` | plasma                                              |
//! | 6    | `0x08` | x-fan                                               |
//! | 7    | all    | force-update marker (`0xAF` applies the frame)      |
//! | 8    | `0x80` | power                                               |
//! | 8    | `0x70` | operating mode                                      |
//! | 8    | `0x0F` | fan speed                                           |
//! | 9    | all    | target temperature, `(°C - 16) * 16`                |
//! | 10   | `0x10` | turbo                                               |
//! | 12   | `0xF0` | horizontal louver                                   |
//! | 12   | `0x0F` | vertical louver                                     |
//! | 13   | `0xF0` | display mode                                        |
//! | 46   | all    | indoor temperature, `°C + 40` (reports only)        |

use gree_core::unit::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use gree_core::{ClimateMode, DisplayMode, EncodeError, FanMode, HorizontalSwing, VerticalSwing};

use crate::codec::{FrameKind, ProtocolFrame};

pub(crate) const SLEEP_BYTE: usize = 4;
pub(crate) const SLEEP_MASK: u8 = 0x08;
pub(crate) const PLASMA_BYTE: usize = 6;
pub(crate) const PLASMA_MASK: u8 = 0x04;
pub(crate) const XFAN_BYTE: usize = 6;
pub(crate) const XFAN_MASK: u8 = 0x08;
pub(crate) const FORCE_UPDATE_BYTE: usize = 7;
pub(crate) const FORCE_UPDATE_VALUE: u8 = 0xAF;
pub(crate) const MODE_BYTE: usize = 8;
pub(crate) const POWER_MASK: u8 = 0x80;
pub(crate) const MODE_MASK: u8 = 0x70;
pub(crate) const MODE_SHIFT: u8 = 4;
pub(crate) const FAN_MASK: u8 = 0x0F;
pub(crate) const TEMPERATURE_BYTE: usize = 9;
pub(crate) const PRESET_BYTE: usize = 10;
pub(crate) const TURBO_MASK: u8 = 0x10;
pub(crate) const SWING_BYTE: usize = 12;
pub(crate) const DISPLAY_BYTE: usize = 13;
pub(crate) const DISPLAY_SHIFT: u8 = 4;
pub(crate) const INDOOR_TEMP_BYTE: usize = 46;

/// Offset added to the indoor temperature on the wire
const INDOOR_TEMP_OFFSET: i16 = 40;

/// Plausible indoor temperature range; readings outside are treated as absent
const INDOOR_TEMP_RANGE: std::ops::RangeInclusive<f32> = -10.0..=50.0;

/// Raw target-temperature steps per °C
const TEMPERATURE_SCALE: u8 = 16;

/// Largest raw target temperature the unit accepts
pub const MAX_TARGET_RAW: u8 = (MAX_TEMPERATURE - MIN_TEMPERATURE) * TEMPERATURE_SCALE;

/// Operating mode bits. Power is a separate flag, so there is no "off" code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Auto,
    Cool,
    Dry,
    Fan,
    Heat,
}

impl From<OperatingMode> for ClimateMode {
    fn from(mode: OperatingMode) -> Self {
        match mode {
            OperatingMode::Auto => ClimateMode::Auto,
            OperatingMode::Cool => ClimateMode::Cool,
            OperatingMode::Dry => ClimateMode::Dry,
            OperatingMode::Fan => ClimateMode::FanOnly,
            OperatingMode::Heat => ClimateMode::Heat,
        }
    }
}

impl OperatingMode {
    /// Operating mode for a climate mode; `None` for `Off`
    pub fn from_climate(mode: ClimateMode) -> Option<Self> {
        match mode {
            ClimateMode::Off => None,
            ClimateMode::Auto => Some(OperatingMode::Auto),
            ClimateMode::Cool => Some(OperatingMode::Cool),
            ClimateMode::Dry => Some(OperatingMode::Dry),
            ClimateMode::FanOnly => Some(OperatingMode::Fan),
            ClimateMode::Heat => Some(OperatingMode::Heat),
        }
    }
}

pub const MODE_CODES: [(OperatingMode, u8); 5] = [
    (OperatingMode::Auto, 0),
    (OperatingMode::Cool, 1),
    (OperatingMode::Dry, 2),
    (OperatingMode::Fan, 3),
    (OperatingMode::Heat, 4),
];

pub const FAN_CODES: [(FanMode, u8); 4] = [
    (FanMode::Auto, 0),
    (FanMode::Low, 1),
    (FanMode::Medium, 2),
    (FanMode::High, 3),
];

pub const VERTICAL_SWING_CODES: [(VerticalSwing, u8); 7] = [
    (VerticalSwing::Default, 0),
    (VerticalSwing::Swing, 1),
    (VerticalSwing::Top, 2),
    (VerticalSwing::UpperMiddle, 3),
    (VerticalSwing::Middle, 4),
    (VerticalSwing::LowerMiddle, 5),
    (VerticalSwing::Bottom, 6),
];

pub const HORIZONTAL_SWING_CODES: [(HorizontalSwing, u8); 7] = [
    (HorizontalSwing::Default, 0),
    (HorizontalSwing::Swing, 1),
    (HorizontalSwing::Left, 2),
    (HorizontalSwing::MiddleLeft, 3),
    (HorizontalSwing::Middle, 4),
    (HorizontalSwing::MiddleRight, 5),
    (HorizontalSwing::Right, 6),
];

pub const DISPLAY_CODES: [(DisplayMode, u8); 4] = [
    (DisplayMode::Off, 0),
    (DisplayMode::SetTemperature, 1),
    (DisplayMode::IndoorTemperature, 2),
    (DisplayMode::OutdoorTemperature, 3),
];

/// A register field value. Codes missing from the lookup table are kept
/// verbatim so one unexpected byte never aborts a state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code<T> {
    Known(T),
    Unknown(u8),
}

impl<T: Copy + PartialEq> Code<T> {
    /// Look a raw code up in a fixed table
    pub fn decode(table: &[(T, u8)], raw: u8) -> Self {
        table
            .iter()
            .find(|(_, code)| *code == raw)
            .map(|(value, _)| Code::Known(*value))
            .unwrap_or(Code::Unknown(raw))
    }

    /// Raw code for this value
    pub fn encode(&self, table: &[(T, u8)]) -> u8 {
        match self {
            Code::Known(value) => table
                .iter()
                .find(|(v, _)| v == value)
                .map(|(_, code)| *code)
                .unwrap_or_default(),
            Code::Unknown(raw) => *raw,
        }
    }

    pub fn known(&self) -> Option<T> {
        match self {
            Code::Known(value) => Some(*value),
            Code::Unknown(_) => None,
        }
    }
}

/// Raw target temperature for whole degrees Celsius
pub fn encode_target_temperature(celsius: u8) -> Result<u8, EncodeError> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&celsius) {
        return Err(EncodeError::OutOfRange {
            field: "target_temperature",
            value: celsius,
            max: MAX_TEMPERATURE,
        });
    }
    Ok((celsius - MIN_TEMPERATURE) * TEMPERATURE_SCALE)
}

/// Target temperature in °C, or `None` outside the settable range
pub fn decode_target_temperature(raw: u8) -> Option<f32> {
    if raw > MAX_TARGET_RAW {
        return None;
    }
    Some(f32::from(raw) / f32::from(TEMPERATURE_SCALE) + f32::from(MIN_TEMPERATURE))
}

/// Indoor temperature in °C, or `None` when implausible
pub fn decode_indoor_temperature(raw: u8) -> Option<f32> {
    let celsius = f32::from(i16::from(raw) - INDOOR_TEMP_OFFSET);
    INDOOR_TEMP_RANGE.contains(&celsius).then_some(celsius)
}

/// Wire value for an indoor temperature, saturating at the byte range
pub fn encode_indoor_temperature(celsius: f32) -> u8 {
    (celsius.round() as i16)
        .saturating_add(INDOOR_TEMP_OFFSET)
        .clamp(0, 255) as u8
}

/// Immutable snapshot of the unit's registers
///
/// A fresh snapshot replaces the previous one every polling cycle; fields
/// are never patched from an older snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRegisters {
    pub power: bool,
    pub mode: Code<OperatingMode>,
    pub fan: Code<FanMode>,
    /// Raw wire value, see [`decode_target_temperature`]
    pub target_temperature: u8,
    pub turbo: bool,
    pub vertical_swing: Code<VerticalSwing>,
    pub horizontal_swing: Code<HorizontalSwing>,
    pub display: Code<DisplayMode>,
    pub plasma: bool,
    pub sleep: bool,
    pub xfan: bool,
    /// Raw wire value; only present in report frames
    pub indoor_temperature: Option<u8>,
}

impl Default for DeviceRegisters {
    fn default() -> Self {
        Self {
            power: false,
            mode: Code::Known(OperatingMode::Auto),
            fan: Code::Known(FanMode::Auto),
            target_temperature: (24 - MIN_TEMPERATURE) * TEMPERATURE_SCALE,
            turbo: false,
            vertical_swing: Code::Known(VerticalSwing::Default),
            horizontal_swing: Code::Known(HorizontalSwing::Default),
            display: Code::Known(DisplayMode::SetTemperature),
            plasma: false,
            sleep: false,
            xfan: false,
            indoor_temperature: None,
        }
    }
}

impl DeviceRegisters {
    /// Unpack registers from a verified frame
    pub fn from_frame(frame: &ProtocolFrame) -> Self {
        let bytes = frame.as_bytes();
        let indoor_temperature = match frame.kind() {
            FrameKind::Report => Some(bytes[INDOOR_TEMP_BYTE]),
            FrameKind::Command => None,
        };

        let mode_byte = bytes[MODE_BYTE];
        let swing_byte = bytes[SWING_BYTE];

        Self {
            power: mode_byte & POWER_MASK != 0,
            mode: Code::decode(&MODE_CODES, (mode_byte & MODE_MASK) >> MODE_SHIFT),
            fan: Code::decode(&FAN_CODES, mode_byte & FAN_MASK),
            target_temperature: bytes[TEMPERATURE_BYTE],
            turbo: bytes[PRESET_BYTE] & TURBO_MASK != 0,
            vertical_swing: Code::decode(&VERTICAL_SWING_CODES, swing_byte & 0x0F),
            horizontal_swing: Code::decode(&HORIZONTAL_SWING_CODES, swing_byte >> 4),
            display: Code::decode(&DISPLAY_CODES, bytes[DISPLAY_BYTE] >> DISPLAY_SHIFT),
            plasma: bytes[PLASMA_BYTE] & PLASMA_MASK != 0,
            sleep: bytes[SLEEP_BYTE] & SLEEP_MASK != 0,
            xfan: bytes[XFAN_BYTE] & XFAN_MASK != 0,
            indoor_temperature,
        }
    }

    /// Write the register block into a frame buffer
    ///
    /// The buffer must be at least as long as a command frame. The indoor
    /// temperature is written only when the buffer has room for it.
    pub(crate) fn pack_into(&self, buf: &mut [u8]) -> Result<(), EncodeError> {
        let mode = check_width("mode", self.mode.encode(&MODE_CODES), 0x07)?;
        let fan = check_width("fan", self.fan.encode(&FAN_CODES), FAN_MASK)?;
        let vertical = check_width(
            "vertical_swing",
            self.vertical_swing.encode(&VERTICAL_SWING_CODES),
            0x0F,
        )?;
        let horizontal = check_width(
            "horizontal_swing",
            self.horizontal_swing.encode(&HORIZONTAL_SWING_CODES),
            0x0F,
        )?;
        let display = check_width("display", self.display.encode(&DISPLAY_CODES), 0x0F)?;
        let target = check_width("target_temperature", self.target_temperature, MAX_TARGET_RAW)?;

        set_bit(&mut buf[SLEEP_BYTE], SLEEP_MASK, self.sleep);
        set_bit(&mut buf[PLASMA_BYTE], PLASMA_MASK, self.plasma);
        set_bit(&mut buf[XFAN_BYTE], XFAN_MASK, self.xfan);

        let power = if self.power { POWER_MASK } else { 0 };
        buf[MODE_BYTE] = power | (mode << MODE_SHIFT) | fan;
        buf[TEMPERATURE_BYTE] = target;
        set_bit(&mut buf[PRESET_BYTE], TURBO_MASK, self.turbo);
        buf[SWING_BYTE] = (horizontal << 4) | vertical;
        buf[DISPLAY_BYTE] = display << DISPLAY_SHIFT;

        if let Some(raw) = self.indoor_temperature {
            if let Some(slot) = buf.get_mut(INDOOR_TEMP_BYTE) {
                *slot = raw;
            }
        }

        Ok(())
    }

    /// Fields holding codes with no table entry, as (name, raw) pairs
    pub fn unknown_codes(&self) -> Vec<(&'static str, u8)> {
        let mut unknown = Vec::new();
        if let Code::Unknown(raw) = self.mode {
            unknown.push(("mode", raw));
        }
        if let Code::Unknown(raw) = self.fan {
            unknown.push(("fan", raw));
        }
        if let Code::Unknown(raw) = self.vertical_swing {
            unknown.push(("vertical_swing", raw));
        }
        if let Code::Unknown(raw) = self.horizontal_swing {
            unknown.push(("horizontal_swing", raw));
        }
        if let Code::Unknown(raw) = self.display {
            unknown.push(("display", raw));
        }
        if self.target_temperature > MAX_TARGET_RAW {
            unknown.push(("target_temperature", self.target_temperature));
        }
        unknown
    }
}

fn check_width(field: &'static str, value: u8, max: u8) -> Result<u8, EncodeError> {
    if value > max {
        Err(EncodeError::OutOfRange { field, value, max })
    } else {
        Ok(value)
    }
}

fn set_bit(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, CommandFields};

    #[test]
    fn test_target_temperature_roundtrip() {
        for celsius in MIN_TEMPERATURE..=MAX_TEMPERATURE {
            let raw = encode_target_temperature(celsius).unwrap();
            assert_eq!(decode_target_temperature(raw), Some(f32::from(celsius)));
        }
    }

    #[test]
    fn test_target_temperature_wire_values() {
        assert_eq!(encode_target_temperature(16).unwrap(), 0x00);
        assert_eq!(encode_target_temperature(24).unwrap(), 0x80);
        assert_eq!(encode_target_temperature(30).unwrap(), 0xE0);
        assert_eq!(decode_target_temperature(0x88), Some(24.5));
    }

    #[test]
    fn test_target_temperature_out_of_range() {
        assert!(encode_target_temperature(15).is_err());
        assert!(encode_target_temperature(31).is_err());
        assert_eq!(decode_target_temperature(0xF0), None);
    }

    #[test]
    fn test_indoor_temperature() {
        assert_eq!(decode_indoor_temperature(62), Some(22.0));
        assert_eq!(decode_indoor_temperature(30), Some(-10.0));
        assert_eq!(decode_indoor_temperature(0), None);
        assert_eq!(decode_indoor_temperature(200), None);
        assert_eq!(encode_indoor_temperature(22.0), 62);
        assert_eq!(encode_indoor_temperature(-60.0), 0);
    }

    #[test]
    fn test_indoor_temperature_extremes_saturate() {
        assert_eq!(encode_indoor_temperature(f32::MAX), 255);
        assert_eq!(encode_indoor_temperature(40_000.0), 255);
        assert_eq!(encode_indoor_temperature(f32::MIN), 0);
        assert_eq!(encode_indoor_temperature(f32::INFINITY), 255);
    }

    #[test]
    fn test_code_tables_roundtrip() {
        for (mode, raw) in MODE_CODES {
            assert_eq!(Code::decode(&MODE_CODES, raw), Code::Known(mode));
            assert_eq!(Code::Known(mode).encode(&MODE_CODES), raw);
        }
        for (fan, raw) in FAN_CODES {
            assert_eq!(Code::decode(&FAN_CODES, raw), Code::Known(fan));
            assert_eq!(Code::Known(fan).encode(&FAN_CODES), raw);
        }
        for (swing, raw) in VERTICAL_SWING_CODES {
            assert_eq!(Code::decode(&VERTICAL_SWING_CODES, raw), Code::Known(swing));
        }
        for (swing, raw) in HORIZONTAL_SWING_CODES {
            assert_eq!(Code::decode(&HORIZONTAL_SWING_CODES, raw), Code::Known(swing));
        }
        for (display, raw) in DISPLAY_CODES {
            assert_eq!(Code::decode(&DISPLAY_CODES, raw), Code::Known(display));
        }
    }

    #[test]
    fn test_unknown_code_kept_verbatim() {
        let code: Code<FanMode> = Code::decode(&FAN_CODES, 0x0C);
        assert_eq!(code, Code::Unknown(0x0C));
        assert_eq!(code.known(), None);
        assert_eq!(code.encode(&FAN_CODES), 0x0C);
    }

    #[test]
    fn test_operating_mode_mapping() {
        for (mode, _) in MODE_CODES {
            let climate: ClimateMode = mode.into();
            assert_eq!(OperatingMode::from_climate(climate), Some(mode));
        }
        assert_eq!(OperatingMode::from_climate(ClimateMode::Off), None);
    }

    #[test]
    fn test_pack_layout() {
        let registers = DeviceRegisters {
            power: true,
            mode: Code::Known(OperatingMode::Heat),
            fan: Code::Known(FanMode::High),
            target_temperature: encode_target_temperature(22).unwrap(),
            turbo: true,
            vertical_swing: Code::Known(VerticalSwing::Swing),
            horizontal_swing: Code::Known(HorizontalSwing::Left),
            display: Code::Known(DisplayMode::IndoorTemperature),
            plasma: true,
            sleep: true,
            xfan: false,
            indoor_temperature: None,
        };

        let frame = codec::encode(&CommandFields::forced(registers)).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes[MODE_BYTE], 0x80 | 0x40 | 0x03);
        assert_eq!(bytes[TEMPERATURE_BYTE], 0x60);
        assert_eq!(bytes[PRESET_BYTE], TURBO_MASK);
        assert_eq!(bytes[SWING_BYTE], 0x21);
        assert_eq!(bytes[DISPLAY_BYTE], 0x20);
        assert_eq!(bytes[PLASMA_BYTE], PLASMA_MASK);
        assert_eq!(bytes[SLEEP_BYTE], SLEEP_MASK);
        assert_eq!(bytes[FORCE_UPDATE_BYTE], FORCE_UPDATE_VALUE);
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let registers = DeviceRegisters {
            power: true,
            mode: Code::Known(OperatingMode::Dry),
            fan: Code::Known(FanMode::Low),
            xfan: true,
            ..DeviceRegisters::default()
        };

        let frame = codec::encode(&CommandFields::forced(registers)).unwrap();
        assert_eq!(DeviceRegisters::from_frame(&frame), registers);
    }

    #[test]
    fn test_report_carries_indoor_temperature() {
        let registers = DeviceRegisters {
            indoor_temperature: Some(encode_indoor_temperature(21.0)),
            ..DeviceRegisters::default()
        };

        let frame = codec::encode_report(&registers).unwrap();
        let decoded = DeviceRegisters::from_frame(&frame);
        assert_eq!(decoded.indoor_temperature, Some(61));
        assert_eq!(decoded, registers);
    }

    #[test]
    fn test_pack_rejects_oversized_unknown_code() {
        let registers = DeviceRegisters {
            mode: Code::Unknown(0x09),
            ..DeviceRegisters::default()
        };

        let err = codec::encode(&CommandFields::forced(registers)).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OutOfRange {
                field: "mode",
                value: 0x09,
                max: 0x07,
            }
        );
    }

    #[test]
    fn test_unknown_codes_listed() {
        let registers = DeviceRegisters {
            fan: Code::Unknown(0x07),
            target_temperature: 0xF0,
            ..DeviceRegisters::default()
        };
        assert_eq!(
            registers.unknown_codes(),
            vec![("fan", 0x07), ("target_temperature", 0xF0)]
        );
    }
}
