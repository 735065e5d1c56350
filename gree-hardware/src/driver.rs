//! Polling driver
//!
//! One cycle per tick: send a command frame (carrying pending changes, or
//! just soliciting a report), wait a bounded time for the unit's report,
//! reconcile, publish. Cycles never overlap and a late reply is never
//! carried over into the next cycle.

use async_trait::async_trait;
use gree_core::config::PollingConfig;
use gree_core::{Capabilities, ClimateSnapshot, DriverPhase, GreeError};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::codec::{self, CommandFields, FrameKind, ProtocolFrame};
use crate::command_queue::{CommandQueue, SentChange};
use crate::handle::ClimateHandle;
use crate::registers::DeviceRegisters;
use crate::transport::{ByteStream, LinkStats, LinkTransport};

/// Receives a snapshot after every cycle
pub trait ClimateSink: Send {
    fn publish(&mut self, snapshot: &ClimateSnapshot);
}

impl ClimateSink for watch::Sender<ClimateSnapshot> {
    fn publish(&mut self, snapshot: &ClimateSnapshot) {
        self.send_if_modified(|current| {
            if *current == *snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }
}

/// Paces polling cycles
#[async_trait]
pub trait TickSource: Send {
    async fn tick(&mut self);
}

#[async_trait]
impl TickSource for tokio::time::Interval {
    async fn tick(&mut self) {
        tokio::time::Interval::tick(self).await;
    }
}

/// External room-temperature reading that replaces the unit's own sensor
#[async_trait]
pub trait TemperatureSource: Send {
    /// Latest reading in °C, or `None` if unavailable this cycle
    async fn read_celsius(&mut self) -> Option<f32>;
}

/// Timing and fault thresholds for the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub response_timeout: Duration,
    pub frame_timeout: Duration,
    /// Failed cycles in a row tolerated before the unit is reported unavailable
    pub max_consecutive_failures: u32,
    pub debug_uart: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_polling(&PollingConfig::default(), false)
    }
}

impl DriverConfig {
    pub fn from_polling(polling: &PollingConfig, debug_uart: bool) -> Self {
        Self {
            response_timeout: polling.response_timeout(),
            frame_timeout: polling.frame_timeout(),
            max_consecutive_failures: polling.max_consecutive_failures,
            debug_uart,
        }
    }
}

/// Result of a single cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A report was received and published
    Applied,
    /// The cycle failed but the unit is still considered available
    Failed { consecutive: u32 },
    /// Failures exceeded the threshold; the unit is reported unavailable
    Faulted { consecutive: u32 },
}

/// Driver counters, cumulative since start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub phase: DriverPhase,
    pub cycles: u64,
    pub failed_cycles: u64,
    pub consecutive_failures: u32,
    pub commands_acknowledged: u64,
    pub commands_dropped: u64,
    pub link: LinkStats,
}

/// Drives one indoor unit
pub struct PollingDriver<S = dyn ByteStream, K = watch::Sender<ClimateSnapshot>>
where
    S: ByteStream + ?Sized,
    K: ClimateSink,
{
    link: LinkTransport<S>,
    queue: Arc<CommandQueue>,
    sink: K,
    capabilities: Capabilities,
    config: DriverConfig,
    sensor: Option<Box<dyn TemperatureSource>>,
    registers: Option<DeviceRegisters>,
    snapshot: ClimateSnapshot,
    phase: DriverPhase,
    consecutive_failures: u32,
    cycles: u64,
    failed_cycles: u64,
    commands_acknowledged: u64,
    commands_dropped: u64,
}

impl<S: ByteStream + ?Sized> PollingDriver<S, watch::Sender<ClimateSnapshot>> {
    /// Driver publishing into a watch channel, plus a handle for callers
    pub fn with_watch(
        stream: Box<S>,
        queue: Arc<CommandQueue>,
        capabilities: Capabilities,
        config: DriverConfig,
    ) -> (Self, ClimateHandle) {
        let (sender, receiver) = watch::channel(ClimateSnapshot::default());
        let handle = ClimateHandle::new(queue.clone(), receiver, capabilities.clone());
        let driver = Self::new(stream, queue, sender, capabilities, config);
        (driver, handle)
    }
}

impl<S: ByteStream + ?Sized, K: ClimateSink> PollingDriver<S, K> {
    pub fn new(
        stream: Box<S>,
        queue: Arc<CommandQueue>,
        sink: K,
        capabilities: Capabilities,
        config: DriverConfig,
    ) -> Self {
        let link = LinkTransport::new(stream, config.frame_timeout, config.debug_uart);
        Self {
            link,
            queue,
            sink,
            capabilities,
            config,
            sensor: None,
            registers: None,
            snapshot: ClimateSnapshot::default(),
            phase: DriverPhase::Idle,
            consecutive_failures: 0,
            cycles: 0,
            failed_cycles: 0,
            commands_acknowledged: 0,
            commands_dropped: 0,
        }
    }

    /// Override the unit's indoor temperature with an external reading
    pub fn with_sensor(mut self, sensor: Box<dyn TemperatureSource>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn snapshot(&self) -> &ClimateSnapshot {
        &self.snapshot
    }

    /// Registers from the last decoded report
    pub fn registers(&self) -> Option<&DeviceRegisters> {
        self.registers.as_ref()
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            phase: self.phase,
            cycles: self.cycles,
            failed_cycles: self.failed_cycles,
            consecutive_failures: self.consecutive_failures,
            commands_acknowledged: self.commands_acknowledged,
            commands_dropped: self.commands_dropped,
            link: self.link.stats(),
        }
    }

    /// Forget the unit's state and every pending command
    ///
    /// The next cycle starts again with a handshake.
    pub fn reset(&mut self) {
        info!("Resetting polling driver");
        self.registers = None;
        self.queue.clear();
        self.link.reset();
        self.consecutive_failures = 0;
        self.phase = DriverPhase::Idle;
        self.snapshot = ClimateSnapshot::default();
        self.sink.publish(&self.snapshot);
    }

    /// Run one polling cycle
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.cycles += 1;
        if self.phase == DriverPhase::Faulted {
            debug!("Retrying link after fault");
        }
        self.phase = DriverPhase::Polling;
        if let Err(err) = self.link.discard_stale() {
            return self.record_failure(err);
        }

        let (fields, sent) = match &self.registers {
            Some(current) => {
                let outgoing = self.queue.build_outgoing_patch(current);
                (outgoing.fields, outgoing.sent)
            }
            None => (CommandFields::handshake(), Vec::new()),
        };

        let frame = match codec::encode(&fields) {
            Ok(frame) => frame,
            Err(err) => {
                error!("Failed to encode command frame, dropping pending commands: {}", err);
                self.queue.clear();
                return self.record_failure(err.into());
            }
        };

        if !sent.is_empty() {
            debug!("Sending {} pending change(s)", sent.len());
        }

        if let Err(err) = self.link.send(&frame).await {
            return self.record_failure(err);
        }

        match self
            .link
            .receive(FrameKind::Report, self.config.response_timeout)
            .await
        {
            Ok(report) => self.apply_report(&report, &sent).await,
            Err(err) => self.record_failure(err),
        }
    }

    async fn apply_report(&mut self, report: &ProtocolFrame, sent: &[SentChange]) -> PollOutcome {
        self.phase = DriverPhase::Applying;

        let registers = DeviceRegisters::from_frame(report);
        for (field, raw) in registers.unknown_codes() {
            warn!("Unit reported unknown {} code 0x{:02X}", field, raw);
        }

        let mut reconciliation = self.queue.reconcile(&registers, sent, &self.capabilities);
        for field in &reconciliation.acknowledged {
            debug!("Unit applied {}", field);
        }
        for field in &reconciliation.dropped {
            warn!(
                "Unit did not apply {} after {} retries; giving up",
                field,
                self.queue.max_retries()
            );
        }
        self.commands_acknowledged += reconciliation.acknowledged.len() as u64;
        self.commands_dropped += reconciliation.dropped.len() as u64;

        if let Some(sensor) = self.sensor.as_mut() {
            if let Some(celsius) = sensor.read_celsius().await {
                reconciliation.state.current_temperature = Some(celsius);
            }
        }

        if self.consecutive_failures > self.config.max_consecutive_failures {
            info!("Unit responding again after {} failed cycles", self.consecutive_failures);
        }
        self.consecutive_failures = 0;
        self.registers = Some(registers);

        self.snapshot = ClimateSnapshot {
            state: Some(reconciliation.state),
            available: true,
            not_applied: self.queue.not_applied(),
        };
        self.sink.publish(&self.snapshot);

        self.phase = DriverPhase::Idle;
        PollOutcome::Applied
    }

    fn record_failure(&mut self, err: GreeError) -> PollOutcome {
        self.failed_cycles += 1;
        self.consecutive_failures += 1;
        let consecutive = self.consecutive_failures;

        // Repeated link noise is only worth one warning per outage
        if err.is_transient() && consecutive > 1 {
            debug!("Polling cycle failed ({} in a row): {}", consecutive, err);
        } else {
            warn!("Polling cycle failed ({} in a row): {}", consecutive, err);
        }

        if consecutive <= self.config.max_consecutive_failures {
            self.phase = DriverPhase::Idle;
            return PollOutcome::Failed { consecutive };
        }

        self.phase = DriverPhase::Faulted;
        if self.snapshot.available {
            warn!(
                "Unit unavailable after {} consecutive failed cycles",
                consecutive
            );
            self.snapshot.available = false;
            self.sink.publish(&self.snapshot);
        }
        PollOutcome::Faulted { consecutive }
    }

    /// Poll on every tick until `shutdown` resolves
    ///
    /// A cycle in progress when shutdown fires runs to completion.
    pub async fn run<T, F>(&mut self, mut ticks: T, shutdown: F)
    where
        T: TickSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Polling driver started on {}",
            self.link.stream().port_path().unwrap_or("simulated link")
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticks.tick() => {
                    self.poll_once().await;
                }
            }
        }

        info!("Polling driver stopped");
    }
}
