//! Mapping between register snapshots and the climate-entity model
//!
//! Pure functions. Register codes are looked up in fixed tables; values that
//! have no climate counterpart, or that the configuration does not enable,
//! are published as absent rather than guessed.

use gree_core::unit::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use gree_core::{
    Capabilities, ClimateMode, ClimatePreset, ClimateState, DisplayMode, FanMode,
    HorizontalSwing, Intent, VerticalSwing,
};

use crate::registers::{
    decode_indoor_temperature, decode_target_temperature, encode_target_temperature, Code,
    DeviceRegisters, OperatingMode, MAX_TARGET_RAW,
};

/// Single register-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    Power(bool),
    Mode(OperatingMode),
    Fan(FanMode),
    /// Whole degrees Celsius
    TargetTemperature(u8),
    Turbo(bool),
    VerticalSwing(VerticalSwing),
    HorizontalSwing(HorizontalSwing),
    Display(DisplayMode),
    Plasma(bool),
    Sleep(bool),
    XFan(bool),
}

/// Ordered register changes derived from climate intents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterPatch {
    writes: Vec<RegisterWrite>,
}

impl RegisterPatch {
    pub fn writes(&self) -> &[RegisterWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Registers after applying every write to `base`, with the unit's
    /// cross-field rules enforced
    pub fn apply(&self, base: &DeviceRegisters) -> DeviceRegisters {
        let mut registers = *base;
        for write in &self.writes {
            match *write {
                RegisterWrite::Power(on) => registers.power = on,
                RegisterWrite::Mode(mode) => registers.mode = Code::Known(mode),
                RegisterWrite::Fan(fan) => registers.fan = Code::Known(fan),
                RegisterWrite::TargetTemperature(celsius) => {
                    let clamped = celsius.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
                    registers.target_temperature =
                        encode_target_temperature(clamped).unwrap_or(registers.target_temperature);
                }
                RegisterWrite::Turbo(on) => registers.turbo = on,
                RegisterWrite::VerticalSwing(swing) => registers.vertical_swing = Code::Known(swing),
                RegisterWrite::HorizontalSwing(swing) => {
                    registers.horizontal_swing = Code::Known(swing)
                }
                RegisterWrite::Display(display) => registers.display = Code::Known(display),
                RegisterWrite::Plasma(on) => registers.plasma = on,
                RegisterWrite::Sleep(on) => registers.sleep = on,
                RegisterWrite::XFan(on) => registers.xfan = on,
            }
        }
        normalize(registers)
    }
}

/// Enforce rules the unit applies between fields
///
/// - dry mode always runs the fan at low speed
/// - turbo is only available while powered on and cooling or heating
/// - the target temperature stays within the settable range
pub fn normalize(mut registers: DeviceRegisters) -> DeviceRegisters {
    if registers.mode == Code::Known(OperatingMode::Dry) {
        registers.fan = Code::Known(FanMode::Low);
    }
    if !boost_allowed(registers.power, registers.mode) {
        registers.turbo = false;
    }
    if registers.target_temperature > MAX_TARGET_RAW {
        registers.target_temperature = MAX_TARGET_RAW;
    }
    registers
}

fn boost_allowed(power: bool, mode: Code<OperatingMode>) -> bool {
    power
        && matches!(
            mode,
            Code::Known(OperatingMode::Cool) | Code::Known(OperatingMode::Heat)
        )
}

/// Climate-entity view of a register snapshot
pub fn registers_to_climate_state(
    registers: &DeviceRegisters,
    capabilities: &Capabilities,
) -> ClimateState {
    let mode = if registers.power {
        registers.mode.known().map(ClimateMode::from)
    } else {
        Some(ClimateMode::Off)
    };

    let preset = if registers.turbo {
        ClimatePreset::Boost
    } else {
        ClimatePreset::None
    };

    let vertical_swing = registers.vertical_swing.known();
    let horizontal_swing = registers.horizontal_swing.known();

    let mut state = ClimateState {
        mode,
        target_temperature: decode_target_temperature(registers.target_temperature),
        current_temperature: registers
            .indoor_temperature
            .and_then(decode_indoor_temperature),
        fan_mode: registers.fan.known(),
        swing_mode: None,
        preset: capabilities.supports_preset(preset).then_some(preset),
        vertical_swing,
        horizontal_swing,
        display: registers.display.known(),
        plasma: registers.plasma,
        sleep: registers.sleep,
        xfan: registers.xfan,
    };
    state.swing_mode = published_swing_mode(&state, capabilities);
    state
}

/// Apply not-yet-confirmed intents on top of a translated state
pub fn overlay_intents(state: &mut ClimateState, intents: &[Intent], capabilities: &Capabilities) {
    for intent in intents {
        intent.apply_to(state);
    }
    state.swing_mode = published_swing_mode(state, capabilities);
    state.preset = state
        .preset
        .filter(|preset| capabilities.supports_preset(*preset));
}

fn published_swing_mode(state: &ClimateState, capabilities: &Capabilities) -> Option<gree_core::SwingMode> {
    state
        .derived_swing_mode()
        .filter(|swing| capabilities.supports_swing_mode(*swing))
}

/// Register changes that realize a set of intents on top of `current`
pub fn climate_intent_to_register_patch(
    intents: &[Intent],
    current: &DeviceRegisters,
) -> RegisterPatch {
    let mut writes = Vec::with_capacity(intents.len() + 1);
    for intent in intents {
        match *intent {
            Intent::Mode(mode) => match OperatingMode::from_climate(mode) {
                Some(operating) => {
                    writes.push(RegisterWrite::Power(true));
                    writes.push(RegisterWrite::Mode(operating));
                }
                None => writes.push(RegisterWrite::Power(false)),
            },
            Intent::TargetTemperature(celsius) => {
                writes.push(RegisterWrite::TargetTemperature(celsius))
            }
            Intent::FanMode(fan) => writes.push(RegisterWrite::Fan(fan)),
            Intent::Preset(preset) => {
                writes.push(RegisterWrite::Turbo(preset == ClimatePreset::Boost))
            }
            Intent::VerticalSwing(swing) => writes.push(RegisterWrite::VerticalSwing(swing)),
            Intent::HorizontalSwing(swing) => writes.push(RegisterWrite::HorizontalSwing(swing)),
            Intent::Display(display) => writes.push(RegisterWrite::Display(display)),
            Intent::Plasma(on) => writes.push(RegisterWrite::Plasma(on)),
            Intent::Sleep(on) => writes.push(RegisterWrite::Sleep(on)),
            Intent::XFan(on) => writes.push(RegisterWrite::XFan(on)),
        }
    }

    // A mode change into dry overrides any fan request in the same batch.
    let switches_to_dry = writes
        .iter()
        .any(|write| *write == RegisterWrite::Mode(OperatingMode::Dry));
    if switches_to_dry && current.fan != Code::Known(FanMode::Low) {
        writes.push(RegisterWrite::Fan(FanMode::Low));
    }

    RegisterPatch { writes }
}

/// Whether a report shows the unit has taken on an intent
pub fn intent_reflected(intent: &Intent, registers: &DeviceRegisters) -> bool {
    match *intent {
        Intent::Mode(mode) => match OperatingMode::from_climate(mode) {
            Some(operating) => registers.power && registers.mode == Code::Known(operating),
            None => !registers.power,
        },
        Intent::TargetTemperature(celsius) => {
            decode_target_temperature(registers.target_temperature) == Some(f32::from(celsius))
        }
        Intent::FanMode(fan) => registers.fan == Code::Known(fan),
        Intent::Preset(preset) => registers.turbo == (preset == ClimatePreset::Boost),
        Intent::VerticalSwing(swing) => registers.vertical_swing == Code::Known(swing),
        Intent::HorizontalSwing(swing) => registers.horizontal_swing == Code::Known(swing),
        Intent::Display(display) => registers.display == Code::Known(display),
        Intent::Plasma(on) => registers.plasma == on,
        Intent::Sleep(on) => registers.sleep == on,
        Intent::XFan(on) => registers.xfan == on,
    }
}
