//! Line-oriented control on stdin
//!
//! Each line is parsed with clap as if it were a command line, e.g.
//! `mode cool`, `temp 24`, `plasma on`, `vertical-swing top`, `status`.

use clap::{Parser, Subcommand, ValueEnum};
use gree_core::{ClimateMode, ClimatePreset, FanMode, GreeError, SwingMode};
use gree_hardware::{Accessories, ClimateHandle, SelectKind, ToggleKind};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConsoleError {
    #[error("{0}")]
    Parse(#[from] clap::Error),
    #[error("Rejected: {0}")]
    Rejected(#[from] GreeError),
    #[error("No accessory bound for '{0}'")]
    Unbound(&'static str),
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "greed")]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// Set the climate mode (off, auto, cool, dry, fan-only, heat)
    Mode { mode: ClimateMode },
    /// Set the target temperature in °C (16-30)
    Temp { celsius: f32 },
    /// Set the fan speed (auto, low, medium, high)
    Fan { fan: FanMode },
    /// Set the swing mode (off, vertical, horizontal, both)
    Swing { swing: SwingMode },
    /// Set the preset (none, boost)
    Preset { preset: ClimatePreset },
    /// Switch the plasma ionizer
    Plasma { state: Switch },
    /// Switch sleep mode
    Sleep { state: Switch },
    /// Switch x-fan (anti-mold)
    Xfan { state: Switch },
    /// Set the vertical louver position
    VerticalSwing { position: String },
    /// Set the horizontal louver position
    HorizontalSwing { position: String },
    /// Set what the unit's display shows
    Display { mode: String },
    /// Print the latest snapshot
    Status,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

pub(crate) struct Console {
    handle: ClimateHandle,
    accessories: Accessories,
}

impl Console {
    pub(crate) fn new(handle: ClimateHandle, accessories: Accessories) -> Self {
        Self {
            handle,
            accessories,
        }
    }

    /// Run one line; returns text to print, if any
    pub(crate) fn execute(&self, line: &str) -> Result<Option<String>, ConsoleError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(None);
        }

        let parsed = ConsoleLine::try_parse_from(tokens)?;
        debug!("Console command: {:?}", parsed.command);

        match parsed.command {
            ConsoleCommand::Mode { mode } => self.handle.set_mode(mode)?,
            ConsoleCommand::Temp { celsius } => self.handle.set_target_temperature(celsius)?,
            ConsoleCommand::Fan { fan } => self.handle.set_fan_mode(fan)?,
            ConsoleCommand::Swing { swing } => self.handle.set_swing_mode(swing)?,
            ConsoleCommand::Preset { preset } => self.handle.set_preset(preset)?,
            ConsoleCommand::Plasma { state } => self.toggle(ToggleKind::Plasma, state)?,
            ConsoleCommand::Sleep { state } => self.toggle(ToggleKind::Sleep, state)?,
            ConsoleCommand::Xfan { state } => self.toggle(ToggleKind::XFan, state)?,
            ConsoleCommand::VerticalSwing { position } => {
                self.select(SelectKind::VerticalSwing, &position)?
            }
            ConsoleCommand::HorizontalSwing { position } => {
                self.select(SelectKind::HorizontalSwing, &position)?
            }
            ConsoleCommand::Display { mode } => self.select(SelectKind::Display, &mode)?,
            ConsoleCommand::Status => return self.status().map(Some),
        }

        Ok(Some(format!("queued ({} pending)", self.handle.pending().len())))
    }

    fn toggle(&self, kind: ToggleKind, state: Switch) -> Result<(), ConsoleError> {
        let proxy = self
            .accessories
            .toggle(kind)
            .ok_or(ConsoleError::Unbound(kind.field().as_str()))?;
        Ok(proxy.set(state.is_on())?)
    }

    fn select(&self, kind: SelectKind, option: &str) -> Result<(), ConsoleError> {
        let proxy = self
            .accessories
            .select(kind)
            .ok_or(ConsoleError::Unbound(kind.field().as_str()))?;
        Ok(proxy.select(option)?)
    }

    fn status(&self) -> Result<String, ConsoleError> {
        let snapshot = self.handle.snapshot();
        let json = serde_json::to_string_pretty(&snapshot).map_err(GreeError::from)?;
        let pending = self.handle.pending();
        if pending.is_empty() {
            Ok(json)
        } else {
            Ok(format!("{}\npending: {:?}", json, pending))
        }
    }
}

/// Read commands from stdin until it closes
///
/// Lines are read on a plain thread so a blocked read never holds up runtime
/// shutdown.
pub(crate) async fn run(console: Console) {
    let (tx, mut lines) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    break;
                }
            }
        }
    });

    info!("Console ready; type 'help' for commands");
    while let Some(line) = lines.recv().await {
        match console.execute(&line) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }
    info!("Console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gree_core::config::AccessoryBindings;
    use gree_core::{Capabilities, ClimateSnapshot, Intent, VerticalSwing};
    use gree_hardware::CommandQueue;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn console(bindings: AccessoryBindings) -> (Console, watch::Sender<ClimateSnapshot>) {
        let (sender, receiver) = watch::channel(ClimateSnapshot::default());
        let handle = ClimateHandle::new(
            Arc::new(CommandQueue::default()),
            receiver,
            Capabilities::default(),
        );
        let accessories = Accessories::from_bindings(&bindings, &handle);
        (Console::new(handle, accessories), sender)
    }

    #[test]
    fn test_climate_commands_enqueue() {
        let (console, _sender) = console(AccessoryBindings::default());
        console.execute("mode cool").unwrap();
        console.execute("  temp   24 ").unwrap();

        assert_eq!(
            console.handle.pending(),
            vec![Intent::Mode(ClimateMode::Cool), Intent::TargetTemperature(24)]
        );
    }

    #[test]
    fn test_blank_line_ignored() {
        let (console, _sender) = console(AccessoryBindings::default());
        assert!(console.execute("   ").unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let (console, _sender) = console(AccessoryBindings::default());
        assert!(matches!(
            console.execute("temp 35"),
            Err(ConsoleError::Rejected(GreeError::InvalidInput(_)))
        ));
        assert!(console.handle.pending().is_empty());
    }

    #[test]
    fn test_unknown_command_is_parse_error() {
        let (console, _sender) = console(AccessoryBindings::default());
        assert!(matches!(
            console.execute("defrost now"),
            Err(ConsoleError::Parse(_))
        ));
        assert!(matches!(
            console.execute("mode arctic"),
            Err(ConsoleError::Parse(_))
        ));
    }

    #[test]
    fn test_accessories_require_binding() {
        let (console, _sender) = console(AccessoryBindings::default());
        assert!(matches!(
            console.execute("plasma on"),
            Err(ConsoleError::Unbound(_))
        ));

        let bindings = AccessoryBindings {
            vertical_swing_select: Some("Vane".to_string()),
            ..AccessoryBindings::default()
        };
        let (console, _sender) = self::console(bindings);
        console.execute("vertical-swing top").unwrap();
        assert_eq!(
            console.handle.pending(),
            vec![Intent::VerticalSwing(VerticalSwing::Top)]
        );
        assert!(matches!(
            console.execute("vertical-swing sideways"),
            Err(ConsoleError::Rejected(GreeError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_status_prints_snapshot() {
        let (console, _sender) = console(AccessoryBindings::default());
        let output = console.execute("status").unwrap().unwrap();
        assert!(output.contains("\"available\": false"));
    }
}
