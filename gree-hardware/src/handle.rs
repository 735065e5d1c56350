//! Caller-facing control handle
//!
//! Cheap to clone. Setters validate against the protocol range and the
//! configured capabilities, then enqueue; the polling driver picks the
//! change up on its next cycle.

use gree_core::{
    validate_target_temperature, Capabilities, ClimateMode, ClimatePreset, ClimateSnapshot,
    ClimateState, FanMode, Intent, Result, SwingMode,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::command_queue::CommandQueue;

#[derive(Debug, Clone)]
pub struct ClimateHandle {
    queue: Arc<CommandQueue>,
    snapshots: watch::Receiver<ClimateSnapshot>,
    capabilities: Arc<Capabilities>,
}

impl ClimateHandle {
    pub fn new(
        queue: Arc<CommandQueue>,
        snapshots: watch::Receiver<ClimateSnapshot>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            queue,
            snapshots,
            capabilities: Arc::new(capabilities),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> ClimateSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Latest known state, `None` until the first report
    pub fn state(&self) -> Option<ClimateState> {
        self.snapshots.borrow().state.clone()
    }

    /// Receiver notified whenever the snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<ClimateSnapshot> {
        self.snapshots.clone()
    }

    /// Intents not yet confirmed by the unit
    pub fn pending(&self) -> Vec<Intent> {
        self.queue.pending()
    }

    /// Enqueue a raw intent
    pub fn request(&self, intent: Intent) -> Result<()> {
        self.queue.enqueue(intent)
    }

    pub fn set_mode(&self, mode: ClimateMode) -> Result<()> {
        self.request(Intent::Mode(mode))
    }

    /// Set the target temperature, rounded to whole degrees
    pub fn set_target_temperature(&self, celsius: f32) -> Result<()> {
        let celsius = validate_target_temperature(celsius)?;
        self.request(Intent::TargetTemperature(celsius))
    }

    pub fn set_fan_mode(&self, fan: FanMode) -> Result<()> {
        self.request(Intent::FanMode(fan))
    }

    /// Set both louvers to realize a swing mode
    pub fn set_swing_mode(&self, swing: SwingMode) -> Result<()> {
        self.capabilities.check_swing_mode(swing)?;
        let (vertical, horizontal) = swing.louvers();
        self.queue.enqueue_all(&[
            Intent::VerticalSwing(vertical),
            Intent::HorizontalSwing(horizontal),
        ])
    }

    pub fn set_preset(&self, preset: ClimatePreset) -> Result<()> {
        self.capabilities.check_preset(preset)?;
        self.request(Intent::Preset(preset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gree_core::{GreeError, HorizontalSwing, VerticalSwing};

    fn handle(capabilities: Capabilities) -> ClimateHandle {
        let (_sender, receiver) = watch::channel(ClimateSnapshot::default());
        ClimateHandle::new(Arc::new(CommandQueue::default()), receiver, capabilities)
    }

    #[test]
    fn test_set_target_temperature_rounds() {
        let handle = handle(Capabilities::default());
        handle.set_target_temperature(21.6).unwrap();
        assert_eq!(handle.pending(), vec![Intent::TargetTemperature(22)]);
    }

    #[test]
    fn test_set_target_temperature_out_of_range() {
        let handle = handle(Capabilities::default());
        assert!(matches!(
            handle.set_target_temperature(12.0),
            Err(GreeError::InvalidInput(_))
        ));
        assert!(handle.set_target_temperature(f32::NAN).is_err());
        assert!(handle.pending().is_empty());
    }

    #[test]
    fn test_set_swing_mode_sets_both_louvers() {
        let handle = handle(Capabilities::default());
        handle.set_swing_mode(SwingMode::Vertical).unwrap();
        assert_eq!(
            handle.pending(),
            vec![
                Intent::VerticalSwing(VerticalSwing::Swing),
                Intent::HorizontalSwing(HorizontalSwing::Default),
            ]
        );
    }

    #[test]
    fn test_unsupported_values_rejected() {
        let handle = handle(Capabilities::new([ClimatePreset::None], [SwingMode::Off]));
        assert!(matches!(
            handle.set_swing_mode(SwingMode::Both),
            Err(GreeError::Unsupported(_))
        ));
        assert!(matches!(
            handle.set_preset(ClimatePreset::Boost),
            Err(GreeError::Unsupported(_))
        ));
        assert!(handle.pending().is_empty());
    }

    #[test]
    fn test_state_none_before_first_report() {
        let handle = handle(Capabilities::default());
        assert!(handle.state().is_none());
        assert!(!handle.snapshot().available);
    }
}
