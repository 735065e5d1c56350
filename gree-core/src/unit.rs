//! Indoor unit definitions
//!
//! Each supported indoor-unit control board implements `UnitConfig` with its
//! serial line settings and climate limits. The driver is generic over the
//! unit so that these values are resolved at compile time.
//!
//! Note: Actual UART I/O is in the `gree-hardware` crate. This module only
//! contains unit definitions.

/// Serial parity setting used by a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Indoor unit configuration trait
///
/// # Example
///
/// ```
/// use gree_core::unit::{GreeStandard, UnitConfig};
///
/// const BAUD: u32 = GreeStandard::BAUD_RATE;
/// assert_eq!(BAUD, 4800);
/// ```
pub trait UnitConfig: Send + Sync + 'static {
    /// Human-readable unit name
    const NAME: &'static str;

    /// Serial communication baud rate
    const BAUD_RATE: u32;

    /// Serial parity
    const PARITY: Parity;

    /// Lowest settable target temperature in °C
    const MIN_TEMPERATURE: u8;

    /// Highest settable target temperature in °C
    const MAX_TEMPERATURE: u8;

    /// Target temperature step in °C
    const TEMPERATURE_STEP: u8;

    /// Inter-byte stall after which a partial frame is discarded, in milliseconds
    const DEFAULT_FRAME_TIMEOUT_MS: u64;
}

/// Gree indoor-unit control board with the 4800 8E1 service connector
///
/// - 4800 baud, 8 data bits, even parity, 1 stop bit
/// - Target temperature 16-30 °C in 1 °C steps
pub struct GreeStandard;

impl UnitConfig for GreeStandard {
    const NAME: &'static str = "Gree indoor unit";
    const BAUD_RATE: u32 = 4800;
    const PARITY: Parity = Parity::Even;
    const MIN_TEMPERATURE: u8 = 16;
    const MAX_TEMPERATURE: u8 = 30;
    const TEMPERATURE_STEP: u8 = 1;
    const DEFAULT_FRAME_TIMEOUT_MS: u64 = 100;
}

/// Unit type used throughout the codebase
pub type DefaultUnit = GreeStandard;

/// Lowest settable target temperature of the default unit
pub const MIN_TEMPERATURE: u8 = DefaultUnit::MIN_TEMPERATURE;

/// Highest settable target temperature of the default unit
pub const MAX_TEMPERATURE: u8 = DefaultUnit::MAX_TEMPERATURE;
