//! In-process stand-in for an indoor unit
//!
//! Answers every command frame with a report, applies forced commands and
//! can be told to misbehave: ignore commands, drop or corrupt replies, or
//! change state as if someone used the infrared remote.

use async_trait::async_trait;
use gree_core::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

use crate::codec::{self, FrameKind};
use crate::registers::{encode_indoor_temperature, DeviceRegisters};
use crate::transport::ByteStream;

/// Byte flipped in corrupted replies; inside the register block
const CORRUPTED_BYTE: usize = 20;

#[derive(Debug)]
struct SimState {
    registers: DeviceRegisters,
    indoor_temperature: f32,
    outbox: VecDeque<u8>,
    noise: Vec<u8>,
    locked_out: bool,
    drop_responses: u32,
    corrupt_responses: u32,
    commands_received: u32,
    forced_commands: u32,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SimState>,
    readable: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated unit, used as the driver's byte stream
#[derive(Debug)]
pub struct SimulatedUnit {
    shared: Arc<Shared>,
}

/// Test and demo controls for a [`SimulatedUnit`]
#[derive(Debug, Clone)]
pub struct SimulatorControl {
    shared: Arc<Shared>,
}

impl SimulatedUnit {
    /// Unit powered off with factory defaults
    pub fn new() -> (Self, SimulatorControl) {
        Self::with_registers(DeviceRegisters::default())
    }

    pub fn with_registers(registers: DeviceRegisters) -> (Self, SimulatorControl) {
        let shared = Arc::new(Shared {
            state: Mutex::new(SimState {
                registers,
                indoor_temperature: 22.0,
                outbox: VecDeque::new(),
                noise: Vec::new(),
                locked_out: false,
                drop_responses: 0,
                corrupt_responses: 0,
                commands_received: 0,
                forced_commands: 0,
            }),
            readable: Notify::new(),
        });
        (
            Self {
                shared: shared.clone(),
            },
            SimulatorControl { shared },
        )
    }
}

impl SimulatorControl {
    /// Current register state of the unit
    pub fn registers(&self) -> DeviceRegisters {
        self.shared.lock().registers
    }

    /// Change state out of band, as the infrared remote would
    pub fn press_remote(&self, change: impl FnOnce(&mut DeviceRegisters)) {
        change(&mut self.shared.lock().registers);
    }

    /// Keep answering but ignore forced commands
    pub fn set_locked_out(&self, locked_out: bool) {
        self.shared.lock().locked_out = locked_out;
    }

    /// Swallow the next `count` replies
    pub fn drop_next_responses(&self, count: u32) {
        self.shared.lock().drop_responses = count;
    }

    /// Flip a bit in the next `count` replies
    pub fn corrupt_next_responses(&self, count: u32) {
        self.shared.lock().corrupt_responses = count;
    }

    /// Send these bytes ahead of the next reply
    pub fn inject_noise(&self, bytes: &[u8]) {
        self.shared.lock().noise.extend_from_slice(bytes);
    }

    pub fn set_indoor_temperature(&self, celsius: f32) {
        self.shared.lock().indoor_temperature = celsius;
    }

    /// Command frames received, forced or not
    pub fn commands_received(&self) -> u32 {
        self.shared.lock().commands_received
    }

    /// Forced command frames received
    pub fn forced_commands(&self) -> u32 {
        self.shared.lock().forced_commands
    }
}

impl SimState {
    fn handle_frame(&mut self, bytes: &[u8]) {
        let frame = match codec::decode(bytes) {
            Ok(frame) if frame.kind() == FrameKind::Command => frame,
            Ok(_) => return,
            Err(err) => {
                debug!("Simulated unit ignoring bad frame: {}", err);
                return;
            }
        };

        self.commands_received += 1;
        if frame.is_forced() {
            self.forced_commands += 1;
            if !self.locked_out {
                self.registers = DeviceRegisters::from_frame(&frame);
            }
        }

        if self.drop_responses > 0 {
            self.drop_responses -= 1;
            return;
        }

        let report = DeviceRegisters {
            indoor_temperature: Some(encode_indoor_temperature(self.indoor_temperature)),
            ..self.registers
        };
        let mut reply = match codec::encode_report(&report) {
            Ok(frame) => frame.into_bytes(),
            Err(err) => {
                debug!("Simulated unit cannot encode report: {}", err);
                return;
            }
        };
        if self.corrupt_responses > 0 {
            self.corrupt_responses -= 1;
            reply[CORRUPTED_BYTE] ^= 0x01;
        }

        self.outbox.extend(self.noise.drain(..));
        self.outbox.extend(reply);
    }
}

#[async_trait]
impl ByteStream for SimulatedUnit {
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            {
                let mut state = self.shared.lock();
                if !state.outbox.is_empty() {
                    let count = buf.len().min(state.outbox.len());
                    for (slot, byte) in buf.iter_mut().zip(state.outbox.drain(..count)) {
                        *slot = byte;
                    }
                    return Ok(count);
                }
            }
            self.shared.readable.notified().await;
        }
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.shared.lock().handle_frame(bytes);
        self.shared.readable.notify_one();
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.shared.lock().outbox.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CommandFields;
    use crate::registers::{Code, OperatingMode};

    async fn exchange(unit: &mut SimulatedUnit, fields: CommandFields) -> Vec<u8> {
        let frame = codec::encode(&fields).unwrap();
        unit.write_frame(frame.as_bytes()).await.unwrap();
        let mut buf = [0u8; 128];
        let n = unit.read_available(&mut buf).await.unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn test_replies_with_report() {
        let (mut unit, control) = SimulatedUnit::new();
        control.set_indoor_temperature(24.0);

        let reply = exchange(&mut unit, CommandFields::handshake()).await;
        let frame = codec::decode(&reply).unwrap();
        assert_eq!(frame.kind(), FrameKind::Report);
        assert_eq!(
            DeviceRegisters::from_frame(&frame).indoor_temperature,
            Some(64)
        );
        assert_eq!(control.commands_received(), 1);
    }

    #[tokio::test]
    async fn test_passive_command_not_applied() {
        let (mut unit, control) = SimulatedUnit::new();
        let registers = DeviceRegisters {
            power: true,
            ..DeviceRegisters::default()
        };

        exchange(&mut unit, CommandFields::passive(registers)).await;
        assert!(!control.registers().power);

        exchange(&mut unit, CommandFields::forced(registers)).await;
        assert!(control.registers().power);
        assert_eq!(control.forced_commands(), 1);
    }

    #[tokio::test]
    async fn test_locked_out_ignores_forced() {
        let (mut unit, control) = SimulatedUnit::new();
        control.set_locked_out(true);

        let registers = DeviceRegisters {
            mode: Code::Known(OperatingMode::Heat),
            ..DeviceRegisters::default()
        };
        exchange(&mut unit, CommandFields::forced(registers)).await;
        assert_eq!(control.registers().mode, Code::Known(OperatingMode::Auto));
    }

    #[tokio::test]
    async fn test_corrupted_reply_fails_checksum() {
        let (mut unit, control) = SimulatedUnit::new();
        control.corrupt_next_responses(1);

        let reply = exchange(&mut unit, CommandFields::handshake()).await;
        assert!(codec::decode(&reply).is_err());

        let reply = exchange(&mut unit, CommandFields::handshake()).await;
        assert!(codec::decode(&reply).is_ok());
    }

    #[tokio::test]
    async fn test_noise_precedes_reply() {
        let (mut unit, control) = SimulatedUnit::new();
        control.inject_noise(&[0x00, 0x7E, 0x13]);

        let reply = exchange(&mut unit, CommandFields::handshake()).await;
        assert_eq!(&reply[..3], &[0x00, 0x7E, 0x13]);
        assert!(codec::decode(&reply[3..]).is_ok());
    }
}
