//! Gree Core Library
//!
//! Shared types, errors, and configuration for the Gree split-system UART
//! driver. This crate performs no I/O; it is used by both the driver crate and
//! the daemon.

pub mod config;
pub mod error;
pub mod types;
pub mod unit;

// Re-export commonly used types
pub use config::{default_config_path, StaticConfig};
pub use error::*;
pub use types::*;
pub use unit::{DefaultUnit, GreeStandard, Parity, UnitConfig};
