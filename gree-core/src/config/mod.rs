//! Configuration types for the Gree driver
//!
//! [`StaticConfig`] is loaded once at startup from a TOML file and never
//! mutated afterwards. Capability sets and accessory bindings derived from it
//! are fixed for the lifetime of the driver.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{
    AccessoryBindings, ClimateConfig, DeviceConfig, PollingConfig, SensorConfig, StaticConfig,
    ValidationError,
};
