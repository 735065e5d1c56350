//! Error types for the Gree driver

use thiserror::Error;

/// Reasons a received byte sequence is not a valid protocol frame.
///
/// All variants describe transient link corruption. The frame is discarded
/// and the next polling cycle retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the frame declares
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Checksum byte does not match the frame contents
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Sync bytes or command byte not recognized
    #[error("Unknown frame header: 0x{0:02X}")]
    UnknownHeader(u8),

    /// Declared length disagrees with the frame kind, or extra bytes follow the frame
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A command frame could not be built because a field is outside its
/// protocol range. Indicates a caller bug rather than a runtime condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Field value does not fit the bits reserved for it
    #[error("Field '{field}' value 0x{value:02X} exceeds protocol maximum 0x{max:02X}")]
    OutOfRange {
        field: &'static str,
        value: u8,
        max: u8,
    },
}

/// Core error type for Gree driver operations
#[derive(Error, Debug)]
pub enum GreeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Value is valid for the protocol but not enabled in this configuration
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Frame encoding errors
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Frame decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No complete frame arrived within the read budget
    #[error("Link timeout: {0}")]
    LinkTimeout(String),

    /// Timeout errors on individual I/O operations
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Device disconnected (adapter unplugged, port closed)
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Gree driver operations
pub type Result<T> = std::result::Result<T, GreeError>;

impl From<serde_json::Error> for GreeError {
    fn from(err: serde_json::Error) -> Self {
        GreeError::Serialization(err.to_string())
    }
}

impl GreeError {
    /// Whether this error is expected link noise that the next tick recovers from
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GreeError::Decode(_) | GreeError::LinkTimeout(_) | GreeError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let gree_err: GreeError = json_err.into();

        match gree_err {
            GreeError::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "port not found");
        let gree_err: GreeError = io_err.into();

        match gree_err {
            GreeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_decode_error_conversion() {
        let err: GreeError = DecodeError::UnknownHeader(0x42).into();
        assert!(matches!(err, GreeError::Decode(DecodeError::UnknownHeader(0x42))));
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = GreeError::Config("bad interval".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad interval");

        let err = DecodeError::ChecksumMismatch {
            expected: 0x1F,
            actual: 0x20,
        };
        assert_eq!(
            format!("{}", err),
            "Checksum mismatch: expected 0x1F, got 0x20"
        );

        let err = DecodeError::Truncated {
            expected: 52,
            actual: 10,
        };
        assert_eq!(format!("{}", err), "Truncated frame: expected 52 bytes, got 10");

        let err = EncodeError::OutOfRange {
            field: "fan",
            value: 0x1F,
            max: 0x0F,
        };
        assert_eq!(
            format!("{}", err),
            "Field 'fan' value 0x1F exceeds protocol maximum 0x0F"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(GreeError::LinkTimeout("no reply".to_string()).is_transient());
        assert!(!GreeError::DeviceDisconnected("gone".to_string()).is_transient());
        assert!(!GreeError::InvalidInput("x".to_string()).is_transient());
    }
}
