//! Pending climate commands and their reconciliation against reports
//!
//! Callers enqueue intents at any time; the polling driver folds every
//! pending intent into the next command frame and, once the unit reports
//! back, checks which ones took effect. Unconfirmed intents are re-sent on
//! later cycles until a retry limit, after which the field is flagged as
//! not applied.

use gree_core::unit::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use gree_core::{Capabilities, ClimateState, Field, GreeError, Intent, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::codec::CommandFields;
use crate::registers::DeviceRegisters;
use crate::translator::{
    climate_intent_to_register_patch, intent_reflected, overlay_intents,
    registers_to_climate_state,
};

/// Default number of re-sends before giving up on a field
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy)]
struct PendingChange {
    intent: Intent,
    retries: u32,
    generation: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: BTreeMap<Field, PendingChange>,
    not_applied: BTreeSet<Field>,
    next_generation: u64,
}

/// An intent as it went out in a command frame
///
/// The generation ties a reconciliation to the exact enqueue that was sent,
/// so a newer intent for the same field is never acknowledged or retried on
/// behalf of an older frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentChange {
    pub intent: Intent,
    generation: u64,
}

/// Command frame content plus the intents it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCommand {
    pub fields: CommandFields,
    pub sent: Vec<SentChange>,
}

/// Result of comparing a report against what was sent
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// State to publish, with unconfirmed intents overlaid
    pub state: ClimateState,
    pub acknowledged: Vec<Field>,
    /// Fields given up on during this cycle
    pub dropped: Vec<Field>,
}

/// Last-writer-wins queue of desired field values
#[derive(Debug)]
pub struct CommandQueue {
    inner: Mutex<QueueState>,
    max_retries: u32,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl CommandQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            inner: Mutex::new(QueueState::default()),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // The state stays consistent between statements, so a panic elsewhere
        // does not invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a desired value, replacing any pending value for the field
    ///
    /// Re-commanding a field clears its not-applied flag.
    pub fn enqueue(&self, intent: Intent) -> Result<()> {
        self.enqueue_all(&[intent])
    }

    /// Record several desired values under one lock
    ///
    /// A cycle never sees only part of the set. Nothing is recorded if any
    /// intent is invalid.
    pub fn enqueue_all(&self, intents: &[Intent]) -> Result<()> {
        for intent in intents {
            check_range(intent)?;
        }

        let mut state = self.lock();
        for &intent in intents {
            let field = intent.field();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.pending.insert(
                field,
                PendingChange {
                    intent,
                    retries: 0,
                    generation,
                },
            );
            state.not_applied.remove(&field);
        }
        Ok(())
    }

    /// Pending intents in field order
    pub fn pending(&self) -> Vec<Intent> {
        self.lock().pending.values().map(|p| p.intent).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Times the pending intent for `field` has been re-sent
    pub fn retries(&self, field: Field) -> Option<u32> {
        self.lock().pending.get(&field).map(|p| p.retries)
    }

    pub fn not_applied(&self) -> BTreeSet<Field> {
        self.lock().not_applied.clone()
    }

    /// Forget pending intents and not-applied flags
    pub fn clear(&self) {
        let mut state = self.lock();
        state.pending.clear();
        state.not_applied.clear();
    }

    /// Command frame content for the next cycle
    ///
    /// All pending intents are folded into the last known registers. With
    /// nothing pending the frame only solicits a report.
    pub fn build_outgoing_patch(&self, current: &DeviceRegisters) -> OutgoingCommand {
        let state = self.lock();
        let intents: Vec<Intent> = state.pending.values().map(|p| p.intent).collect();
        let sent: Vec<SentChange> = state
            .pending
            .values()
            .map(|p| SentChange {
                intent: p.intent,
                generation: p.generation,
            })
            .collect();
        drop(state);

        let patch = climate_intent_to_register_patch(&intents, current);
        let registers = patch.apply(current);
        let fields = if sent.is_empty() {
            CommandFields::passive(registers)
        } else {
            CommandFields::forced(registers)
        };

        OutgoingCommand { fields, sent }
    }

    /// Settle sent intents against a fresh report
    ///
    /// Entries superseded since they were sent are left alone. Calling this
    /// again with the same report and nothing sent changes nothing.
    pub fn reconcile(
        &self,
        registers: &DeviceRegisters,
        sent: &[SentChange],
        capabilities: &Capabilities,
    ) -> Reconciliation {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut acknowledged = Vec::new();
        let mut dropped = Vec::new();

        for change in sent {
            let field = change.intent.field();
            let current = match state.pending.get_mut(&field) {
                Some(pending) if pending.generation == change.generation => pending,
                _ => continue,
            };

            if intent_reflected(&current.intent, registers) {
                state.pending.remove(&field);
                acknowledged.push(field);
                continue;
            }

            current.retries += 1;
            if current.retries > self.max_retries {
                state.pending.remove(&field);
                state.not_applied.insert(field);
                dropped.push(field);
            }
        }

        let residual: Vec<Intent> = state.pending.values().map(|p| p.intent).collect();
        drop(guard);

        let mut climate = registers_to_climate_state(registers, capabilities);
        overlay_intents(&mut climate, &residual, capabilities);

        Reconciliation {
            state: climate,
            acknowledged,
            dropped,
        }
    }
}

fn check_range(intent: &Intent) -> Result<()> {
    if let Intent::TargetTemperature(celsius) = *intent {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&celsius) {
            return Err(GreeError::InvalidInput(format!(
                "Target temperature must be {}-{} °C, got {}",
                MIN_TEMPERATURE, MAX_TEMPERATURE, celsius
            )));
        }
    }
    Ok(())
}
