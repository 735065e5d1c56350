//! Climate abstraction types shared by the driver and its callers

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{GreeError, Result};
use crate::unit::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// Declares a closed enum with a stable lowercase name per variant, used for
/// configuration files, console input and select options.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable lowercase name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = GreeError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_lowercase().replace('_', "-");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let valid: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        GreeError::InvalidInput(format!(
                            "Unknown {}: '{}'. Valid options: {}",
                            stringify!($name),
                            s,
                            valid.join(", ")
                        ))
                    })
            }
        }
    };
}

named_enum! {
    /// Operating mode as seen by callers. `Off` means the unit is powered down.
    pub enum ClimateMode {
        Off => "off",
        Auto => "auto",
        Cool => "cool",
        Dry => "dry",
        FanOnly => "fan-only",
        Heat => "heat",
    }
}

named_enum! {
    /// Indoor fan speed
    pub enum FanMode {
        Auto => "auto",
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

named_enum! {
    /// Combined louver motion
    pub enum SwingMode {
        Off => "off",
        Both => "both",
        Vertical => "vertical",
        Horizontal => "horizontal",
    }
}

named_enum! {
    /// Named bundles of settings
    pub enum ClimatePreset {
        None => "none",
        Boost => "boost",
    }
}

named_enum! {
    /// Vertical louver position
    pub enum VerticalSwing {
        Default => "default",
        Swing => "swing",
        Top => "top",
        UpperMiddle => "upper-middle",
        Middle => "middle",
        LowerMiddle => "lower-middle",
        Bottom => "bottom",
    }
}

named_enum! {
    /// Horizontal louver position
    pub enum HorizontalSwing {
        Default => "default",
        Swing => "swing",
        Left => "left",
        MiddleLeft => "middle-left",
        Middle => "middle",
        MiddleRight => "middle-right",
        Right => "right",
    }
}

named_enum! {
    /// What the indoor unit's front display shows
    pub enum DisplayMode {
        Off => "off",
        SetTemperature => "set-temperature",
        IndoorTemperature => "indoor-temperature",
        OutdoorTemperature => "outdoor-temperature",
    }
}

impl SwingMode {
    /// Louver positions that realize this swing mode
    pub fn louvers(self) -> (VerticalSwing, HorizontalSwing) {
        match self {
            SwingMode::Off => (VerticalSwing::Default, HorizontalSwing::Default),
            SwingMode::Both => (VerticalSwing::Swing, HorizontalSwing::Swing),
            SwingMode::Vertical => (VerticalSwing::Swing, HorizontalSwing::Default),
            SwingMode::Horizontal => (VerticalSwing::Default, HorizontalSwing::Swing),
        }
    }

    /// Swing mode implied by a pair of louver positions
    ///
    /// Fixed positions count as not swinging.
    pub fn from_louvers(vertical: VerticalSwing, horizontal: HorizontalSwing) -> Self {
        match (
            vertical == VerticalSwing::Swing,
            horizontal == HorizontalSwing::Swing,
        ) {
            (true, true) => SwingMode::Both,
            (true, false) => SwingMode::Vertical,
            (false, true) => SwingMode::Horizontal,
            (false, false) => SwingMode::Off,
        }
    }
}

named_enum! {
    /// Individually commandable settings of the unit
    pub enum Field {
        Mode => "mode",
        TargetTemperature => "target-temperature",
        FanMode => "fan-mode",
        Preset => "preset",
        VerticalSwing => "vertical-swing",
        HorizontalSwing => "horizontal-swing",
        Display => "display",
        Plasma => "plasma",
        Sleep => "sleep",
        XFan => "xfan",
    }
}

/// A desired value for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "field", content = "value")]
pub enum Intent {
    Mode(ClimateMode),
    /// Whole degrees Celsius
    TargetTemperature(u8),
    FanMode(FanMode),
    Preset(ClimatePreset),
    VerticalSwing(VerticalSwing),
    HorizontalSwing(HorizontalSwing),
    Display(DisplayMode),
    Plasma(bool),
    Sleep(bool),
    XFan(bool),
}

impl Intent {
    /// The field this intent targets
    pub fn field(&self) -> Field {
        match self {
            Intent::Mode(_) => Field::Mode,
            Intent::TargetTemperature(_) => Field::TargetTemperature,
            Intent::FanMode(_) => Field::FanMode,
            Intent::Preset(_) => Field::Preset,
            Intent::VerticalSwing(_) => Field::VerticalSwing,
            Intent::HorizontalSwing(_) => Field::HorizontalSwing,
            Intent::Display(_) => Field::Display,
            Intent::Plasma(_) => Field::Plasma,
            Intent::Sleep(_) => Field::Sleep,
            Intent::XFan(_) => Field::XFan,
        }
    }

    /// Overlay this intent on a climate state, as if the unit had applied it
    pub fn apply_to(&self, state: &mut ClimateState) {
        match *self {
            Intent::Mode(mode) => state.mode = Some(mode),
            Intent::TargetTemperature(t) => state.target_temperature = Some(f32::from(t)),
            Intent::FanMode(fan) => state.fan_mode = Some(fan),
            Intent::Preset(preset) => state.preset = Some(preset),
            Intent::VerticalSwing(v) => state.vertical_swing = Some(v),
            Intent::HorizontalSwing(h) => state.horizontal_swing = Some(h),
            Intent::Display(d) => state.display = Some(d),
            Intent::Plasma(on) => state.plasma = on,
            Intent::Sleep(on) => state.sleep = on,
            Intent::XFan(on) => state.xfan = on,
        }
    }
}

/// Validate and round a requested target temperature to whole degrees
pub fn validate_target_temperature(celsius: f32) -> Result<u8> {
    if !celsius.is_finite()
        || celsius < f32::from(MIN_TEMPERATURE)
        || celsius > f32::from(MAX_TEMPERATURE)
    {
        return Err(GreeError::InvalidInput(format!(
            "Target temperature must be {}-{} °C, got {}",
            MIN_TEMPERATURE, MAX_TEMPERATURE, celsius
        )));
    }
    Ok(celsius.round() as u8)
}

/// Climate state exposed to callers
///
/// Fields are `None` when the unit reported a code with no mapping, or a
/// value outside the configured capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    pub mode: Option<ClimateMode>,
    pub target_temperature: Option<f32>,
    pub current_temperature: Option<f32>,
    pub fan_mode: Option<FanMode>,
    pub swing_mode: Option<SwingMode>,
    pub preset: Option<ClimatePreset>,
    pub vertical_swing: Option<VerticalSwing>,
    pub horizontal_swing: Option<HorizontalSwing>,
    pub display: Option<DisplayMode>,
    pub plasma: bool,
    pub sleep: bool,
    pub xfan: bool,
}

impl ClimateState {
    /// Swing mode implied by the louver fields, if both are known
    pub fn derived_swing_mode(&self) -> Option<SwingMode> {
        match (self.vertical_swing, self.horizontal_swing) {
            (Some(v), Some(h)) => Some(SwingMode::from_louvers(v, h)),
            _ => None,
        }
    }
}

/// What observers receive after every polling cycle that changes something
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateSnapshot {
    /// Last known state; `None` until the first report is decoded
    pub state: Option<ClimateState>,
    /// `false` while the link is considered down
    pub available: bool,
    /// Fields whose last command the unit did not apply
    pub not_applied: BTreeSet<Field>,
}

/// Polling driver phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverPhase {
    Idle,
    Polling,
    Applying,
    Faulted,
}

/// Configuration-time capability sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    supported_presets: BTreeSet<ClimatePreset>,
    supported_swing_modes: BTreeSet<SwingMode>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new([ClimatePreset::None], SwingMode::ALL.iter().copied())
    }
}

impl Capabilities {
    /// Build capability sets. `ClimatePreset::None` is always supported.
    pub fn new(
        presets: impl IntoIterator<Item = ClimatePreset>,
        swing_modes: impl IntoIterator<Item = SwingMode>,
    ) -> Self {
        let mut supported_presets: BTreeSet<ClimatePreset> = presets.into_iter().collect();
        supported_presets.insert(ClimatePreset::None);

        Self {
            supported_presets,
            supported_swing_modes: swing_modes.into_iter().collect(),
        }
    }

    pub fn supported_presets(&self) -> &BTreeSet<ClimatePreset> {
        &self.supported_presets
    }

    pub fn supported_swing_modes(&self) -> &BTreeSet<SwingMode> {
        &self.supported_swing_modes
    }

    pub fn supports_preset(&self, preset: ClimatePreset) -> bool {
        self.supported_presets.contains(&preset)
    }

    pub fn supports_swing_mode(&self, swing: SwingMode) -> bool {
        self.supported_swing_modes.contains(&swing)
    }

    /// Reject presets outside the configured set
    pub fn check_preset(&self, preset: ClimatePreset) -> Result<()> {
        if self.supports_preset(preset) {
            Ok(())
        } else {
            Err(GreeError::Unsupported(format!(
                "Preset '{}' is not enabled",
                preset
            )))
        }
    }

    /// Reject swing modes outside the configured set
    pub fn check_swing_mode(&self, swing: SwingMode) -> Result<()> {
        if self.supports_swing_mode(swing) {
            Ok(())
        } else {
            Err(GreeError::Unsupported(format!(
                "Swing mode '{}' is not enabled",
                swing
            )))
        }
    }
}
