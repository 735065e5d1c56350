//! Auxiliary controls bound to individual unit features
//!
//! Toggles (plasma, sleep, x-fan) and selects (louver positions, display)
//! that read from the published state and write through the command queue.
//! Each is built once at startup and only when its slot is named in the
//! configuration.

use gree_core::config::AccessoryBindings;
use gree_core::{
    ClimateState, DisplayMode, Field, GreeError, HorizontalSwing, Intent, Result, VerticalSwing,
};
use std::str::FromStr;
use tracing::debug;

use crate::handle::ClimateHandle;

/// On/off features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    Plasma,
    Sleep,
    XFan,
}

impl ToggleKind {
    pub const ALL: [ToggleKind; 3] = [ToggleKind::Plasma, ToggleKind::Sleep, ToggleKind::XFan];

    pub fn field(self) -> Field {
        match self {
            ToggleKind::Plasma => Field::Plasma,
            ToggleKind::Sleep => Field::Sleep,
            ToggleKind::XFan => Field::XFan,
        }
    }

    fn intent(self, on: bool) -> Intent {
        match self {
            ToggleKind::Plasma => Intent::Plasma(on),
            ToggleKind::Sleep => Intent::Sleep(on),
            ToggleKind::XFan => Intent::XFan(on),
        }
    }

    fn read(self, state: &ClimateState) -> bool {
        match self {
            ToggleKind::Plasma => state.plasma,
            ToggleKind::Sleep => state.sleep,
            ToggleKind::XFan => state.xfan,
        }
    }
}

/// Features with a fixed set of named options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    HorizontalSwing,
    VerticalSwing,
    Display,
}

impl SelectKind {
    pub const ALL: [SelectKind; 3] = [
        SelectKind::HorizontalSwing,
        SelectKind::VerticalSwing,
        SelectKind::Display,
    ];

    pub fn field(self) -> Field {
        match self {
            SelectKind::HorizontalSwing => Field::HorizontalSwing,
            SelectKind::VerticalSwing => Field::VerticalSwing,
            SelectKind::Display => Field::Display,
        }
    }

    /// Option names, in protocol order
    pub fn options(self) -> Vec<&'static str> {
        match self {
            SelectKind::HorizontalSwing => HorizontalSwing::ALL.iter().map(|o| o.as_str()).collect(),
            SelectKind::VerticalSwing => VerticalSwing::ALL.iter().map(|o| o.as_str()).collect(),
            SelectKind::Display => DisplayMode::ALL.iter().map(|o| o.as_str()).collect(),
        }
    }

    fn intent(self, option: &str) -> Result<Intent> {
        Ok(match self {
            SelectKind::HorizontalSwing => Intent::HorizontalSwing(HorizontalSwing::from_str(option)?),
            SelectKind::VerticalSwing => Intent::VerticalSwing(VerticalSwing::from_str(option)?),
            SelectKind::Display => Intent::Display(DisplayMode::from_str(option)?),
        })
    }

    fn read(self, state: &ClimateState) -> Option<&'static str> {
        match self {
            SelectKind::HorizontalSwing => state.horizontal_swing.map(|o| o.as_str()),
            SelectKind::VerticalSwing => state.vertical_swing.map(|o| o.as_str()),
            SelectKind::Display => state.display.map(|o| o.as_str()),
        }
    }
}

/// Switch-like control for one on/off feature
#[derive(Debug, Clone)]
pub struct ToggleProxy {
    kind: ToggleKind,
    name: String,
    handle: ClimateHandle,
}

impl ToggleProxy {
    pub fn new(kind: ToggleKind, name: impl Into<String>, handle: ClimateHandle) -> Self {
        Self {
            kind,
            name: name.into(),
            handle,
        }
    }

    pub fn kind(&self) -> ToggleKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value; `None` until the first report
    pub fn state(&self) -> Option<bool> {
        self.handle.state().map(|state| self.kind.read(&state))
    }

    pub fn set(&self, on: bool) -> Result<()> {
        debug!("{}: set {}", self.name, if on { "on" } else { "off" });
        self.handle.request(self.kind.intent(on))
    }

    /// Whether the unit rejected the last value written
    pub fn not_applied(&self) -> bool {
        self.handle
            .snapshot()
            .not_applied
            .contains(&self.kind.field())
    }
}

/// Select-like control for one multi-option feature
#[derive(Debug, Clone)]
pub struct SelectProxy {
    kind: SelectKind,
    name: String,
    handle: ClimateHandle,
}

impl SelectProxy {
    pub fn new(kind: SelectKind, name: impl Into<String>, handle: ClimateHandle) -> Self {
        Self {
            kind,
            name: name.into(),
            handle,
        }
    }

    pub fn kind(&self) -> SelectKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> Vec<&'static str> {
        self.kind.options()
    }

    /// Current option; `None` until the first report or for unknown codes
    pub fn current(&self) -> Option<&'static str> {
        self.handle
            .state()
            .and_then(|state| self.kind.read(&state))
    }

    /// Select an option by name
    ///
    /// # Errors
    ///
    /// Returns `GreeError::InvalidInput` if `option` is not one of
    /// [`options`](Self::options).
    pub fn select(&self, option: &str) -> Result<()> {
        let intent = self.kind.intent(option).map_err(|_| {
            GreeError::InvalidInput(format!(
                "'{}' is not an option of {}. Valid options: {}",
                option,
                self.name,
                self.options().join(", ")
            ))
        })?;
        debug!("{}: select {}", self.name, option);
        self.handle.request(intent)
    }

    pub fn not_applied(&self) -> bool {
        self.handle
            .snapshot()
            .not_applied
            .contains(&self.kind.field())
    }
}

/// Every bound auxiliary control
#[derive(Debug, Clone, Default)]
pub struct Accessories {
    pub horizontal_swing: Option<SelectProxy>,
    pub vertical_swing: Option<SelectProxy>,
    pub display: Option<SelectProxy>,
    pub plasma: Option<ToggleProxy>,
    pub sleep: Option<ToggleProxy>,
    pub xfan: Option<ToggleProxy>,
}

impl Accessories {
    /// Build proxies for every slot named in the bindings
    pub fn from_bindings(bindings: &AccessoryBindings, handle: &ClimateHandle) -> Self {
        let select = |kind, name: &Option<String>| {
            name.as_ref()
                .map(|name| SelectProxy::new(kind, name.clone(), handle.clone()))
        };
        let toggle = |kind, name: &Option<String>| {
            name.as_ref()
                .map(|name| ToggleProxy::new(kind, name.clone(), handle.clone()))
        };

        Self {
            horizontal_swing: select(SelectKind::HorizontalSwing, &bindings.horizontal_swing_select),
            vertical_swing: select(SelectKind::VerticalSwing, &bindings.vertical_swing_select),
            display: select(SelectKind::Display, &bindings.display_select),
            plasma: toggle(ToggleKind::Plasma, &bindings.plasma_switch),
            sleep: toggle(ToggleKind::Sleep, &bindings.sleep_switch),
            xfan: toggle(ToggleKind::XFan, &bindings.xfan_switch),
        }
    }

    pub fn toggle(&self, kind: ToggleKind) -> Option<&ToggleProxy> {
        match kind {
            ToggleKind::Plasma => self.plasma.as_ref(),
            ToggleKind::Sleep => self.sleep.as_ref(),
            ToggleKind::XFan => self.xfan.as_ref(),
        }
    }

    pub fn select(&self, kind: SelectKind) -> Option<&SelectProxy> {
        match kind {
            SelectKind::HorizontalSwing => self.horizontal_swing.as_ref(),
            SelectKind::VerticalSwing => self.vertical_swing.as_ref(),
            SelectKind::Display => self.display.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ToggleKind::ALL.iter().all(|kind| self.toggle(*kind).is_none())
            && SelectKind::ALL.iter().all(|kind| self.select(*kind).is_none())
    }
}
