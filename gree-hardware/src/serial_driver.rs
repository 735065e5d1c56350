//! Serial driver for the unit's UART
//!
//! Opens the port with the unit's line settings and exposes it as a
//! [`ByteStream`]. After a disconnect the port is reopened lazily, at most
//! once per [`REOPEN_INTERVAL`].

use async_trait::async_trait;
use gree_core::{DefaultUnit, GreeError, Parity, Result, UnitConfig};
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use crate::transport::ByteStream;

/// Minimum delay between attempts to reopen a lost port
pub const REOPEN_INTERVAL: Duration = Duration::from_secs(5);

/// Serial driver for the unit's service connector
pub struct SerialDriver<U: UnitConfig = DefaultUnit> {
    port: Option<SerialStream>,
    port_path: String,
    write_timeout: Duration,
    last_open_attempt: Instant,
    _unit: PhantomData<U>,
}

impl<U: UnitConfig> SerialDriver<U> {
    /// Open the serial port
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyS1")
    /// * `write_timeout` - Bound on writing and flushing one frame
    pub fn new(port_path: &str, write_timeout: Duration) -> Result<Self> {
        let port = Self::open(port_path)?;

        Ok(Self {
            port: Some(port),
            port_path: port_path.to_string(),
            write_timeout,
            last_open_attempt: Instant::now(),
            _unit: PhantomData,
        })
    }

    fn open(port_path: &str) -> Result<SerialStream> {
        debug!(
            "Opening serial port {} for {} ({} baud, 8{}1)",
            port_path,
            U::NAME,
            U::BAUD_RATE,
            parity_letter(U::PARITY)
        );

        let port = tokio_serial::new(port_path, U::BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(to_serial_parity(U::PARITY))
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                GreeError::Serial(format!("Failed to open serial port: {}", e))
            })?;

        debug!("Serial port opened successfully");
        Ok(port)
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> Result<&mut SerialStream> {
        if self.port.is_none() {
            if self.last_open_attempt.elapsed() < REOPEN_INTERVAL {
                return Err(GreeError::DeviceDisconnected(format!(
                    "{} is closed",
                    self.port_path
                )));
            }
            self.last_open_attempt = Instant::now();
            let port = Self::open(&self.port_path)?;
            info!("Reopened serial port {}", self.port_path);
            self.port = Some(port);
        }

        self.port
            .as_mut()
            .ok_or_else(|| GreeError::DeviceDisconnected(self.port_path.clone()))
    }

    fn check_disconnect(&mut self, err: &GreeError) {
        if is_disconnect_error(err) {
            warn!("Serial port {} lost: {}", self.port_path, err);
            self.port = None;
            self.last_open_attempt = Instant::now();
        }
    }
}

#[async_trait]
impl<U: UnitConfig> ByteStream for SerialDriver<U> {
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        let result = match port.read(buf).await {
            Ok(0) => Err(GreeError::DeviceDisconnected(
                "Serial port returned EOF - adapter may have been unplugged".to_string(),
            )),
            Ok(n) => Ok(n),
            Err(e) => Err(GreeError::Serial(format!("Read error: {}", e))),
        };

        if let Err(err) = &result {
            self.check_disconnect(err);
        }
        result
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let write_timeout = self.write_timeout;
        let port = self.port_mut()?;

        let result = async {
            timeout(write_timeout, port.write_all(bytes))
                .await
                .map_err(|_| GreeError::Timeout("Write operation timed out".to_string()))?
                .map_err(|e| GreeError::Serial(format!("Write failed: {}", e)))?;

            timeout(write_timeout, port.flush())
                .await
                .map_err(|_| GreeError::Timeout("Flush operation timed out".to_string()))?
                .map_err(|e| GreeError::Serial(format!("Flush failed: {}", e)))
        }
        .await;

        if let Err(err) = &result {
            error!("Failed to write frame: {}", err);
            self.check_disconnect(err);
        }
        result
    }

    fn clear_input(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        let result = port.clear(tokio_serial::ClearBuffer::Input).map_err(|e| {
            warn!("Failed to clear input buffer: {}", e);
            GreeError::Serial(format!("Failed to clear buffer: {}", e))
        });

        if let Err(err) = &result {
            self.check_disconnect(err);
        }
        result
    }

    fn port_path(&self) -> Option<&str> {
        Some(&self.port_path)
    }
}

fn to_serial_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn parity_letter(parity: Parity) -> char {
    match parity {
        Parity::None => 'N',
        Parity::Even => 'E',
        Parity::Odd => 'O',
    }
}

/// Determine if an error indicates the adapter is gone
///
/// Returns `true` for errors that will not clear up by retrying on the same
/// file descriptor, as opposed to line noise or a slow unit.
pub fn is_disconnect_error(err: &GreeError) -> bool {
    match err {
        GreeError::DeviceDisconnected(_) => true,
        GreeError::Serial(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("broken pipe")
                || msg_lower.contains("no such device")
                || msg_lower.contains("device disconnected")
                || msg_lower.contains("device not configured")
                || msg_lower.contains("input/output error")
        }
        GreeError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotFound
        ),
        _ => false,
    }
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        GreeError::Serial(format!("Failed to enumerate ports: {}", e))
    })?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gree_core::GreeStandard;

    #[test]
    fn test_parity_mapping() {
        assert_eq!(to_serial_parity(Parity::Even), tokio_serial::Parity::Even);
        assert_eq!(to_serial_parity(Parity::None), tokio_serial::Parity::None);
        assert_eq!(parity_letter(GreeStandard::PARITY), 'E');
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = SerialDriver::<GreeStandard>::new(
            "/dev/nonexistent-gree-port",
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(GreeError::Serial(_))));
    }

    #[test]
    fn test_available_ports_runs() {
        // Depends on the machine; only check that enumeration does not panic.
        let _ = available_ports();
    }

    #[test]
    fn test_is_disconnect_error() {
        assert!(is_disconnect_error(&GreeError::DeviceDisconnected(
            "gone".to_string()
        )));
        assert!(is_disconnect_error(&GreeError::Serial(
            "Read error: Broken pipe (os error 32)".to_string()
        )));
        assert!(is_disconnect_error(&GreeError::Serial(
            "Write failed: No such device".to_string()
        )));
        assert!(!is_disconnect_error(&GreeError::Serial(
            "Read error: framing error".to_string()
        )));
        assert!(!is_disconnect_error(&GreeError::Timeout(
            "Write operation timed out".to_string()
        )));
        assert!(!is_disconnect_error(&GreeError::LinkTimeout(
            "no reply".to_string()
        )));
    }
}
