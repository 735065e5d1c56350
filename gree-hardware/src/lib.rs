//! gree-hardware
//!
//! UART protocol driver for Gree indoor units: frame codec, register model,
//! link layer with resynchronization, command queue and the polling driver.
//! The daemon crate wires these to a serial port and a configuration file.
//!
//! Public API:
//! - `driver::PollingDriver`: one polling cycle per tick, publishes snapshots
//! - `handle::ClimateHandle`: caller-side setters and state access
//! - `accessory::Accessories`: optional toggle and select controls
//! - `serial_driver::SerialDriver`: tokio-serial byte stream
//! - `simulator::SimulatedUnit`: in-process unit for tests and dry runs

pub mod accessory;
pub mod codec;
pub mod command_queue;
pub mod driver;
pub mod handle;
pub mod registers;
pub mod serial_driver;
pub mod simulator;
pub mod translator;
pub mod transport;

pub use accessory::{Accessories, SelectKind, SelectProxy, ToggleKind, ToggleProxy};
pub use codec::{CommandFields, FrameKind, ProtocolFrame};
pub use command_queue::CommandQueue;
pub use driver::{
    ClimateSink, DriverConfig, DriverStats, PollOutcome, PollingDriver, TemperatureSource,
    TickSource,
};
pub use handle::ClimateHandle;
pub use registers::DeviceRegisters;
pub use serial_driver::{available_ports, is_disconnect_error, SerialDriver};
pub use simulator::{SimulatedUnit, SimulatorControl};
pub use transport::{ByteStream, LinkStats};
