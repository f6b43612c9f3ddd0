//! Custom error types for the application.
//!
//! This module defines the primary error type, `PullMachineError`, for the whole crate.
//! Using the `thiserror` crate, it gives a single, consistent way to report the
//! faults that can occur between the serial link and the recording file.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: The serial device could not be opened (or discovered). This is fatal
//!   to the acquisition worker at startup; the owning session keeps running with live data
//!   disabled.
//! - **`TransientIo`**: A read on an already open link failed or timed out. The worker logs
//!   it and retries; it never leaves the worker thread.
//! - **`Parse`**: A frame did not have the `<float>;<float>` shape. Logged and dropped, the
//!   previous reading is retained.
//! - **`Config`** / **`Configuration`**: Configuration loading or semantic validation failed.
//! - **`Io`** / **`Storage`**: Writing the recording file failed.
//! - **`Sampler`**: The periodic sampling task panicked or was aborted.
//! - **`FeatureNotEnabled`**: Functionality compiled out through Cargo features.
//!
//! Numeric domain problems in the geometry are never surfaced: inputs are clamped.

use crate::acquisition::frame::FrameError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, PullMachineError>;

/// Primary error type for acquisition, configuration and storage.
#[derive(Error, Debug)]
pub enum PullMachineError {
    #[error("Failed to open serial port '{port}': {reason}")]
    Connection { port: String, reason: String },

    #[error("Transient serial I/O error: {0}")]
    TransientIo(#[source] std::io::Error),

    #[error("Malformed frame: {0}")]
    Parse(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sampler task failed: {0}")]
    Sampler(String),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for PullMachineError {
    fn from(value: figment::Error) -> Self {
        PullMachineError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_the_port() {
        let err = PullMachineError::Connection {
            port: "COM6".into(),
            reason: "access denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("COM6"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn parse_and_transient_errors_describe_the_cause() {
        let parse: PullMachineError = FrameError::FieldCount(3).into();
        assert_eq!(parse.to_string(), "Malformed frame: expected 2 fields, found 3");

        let io = PullMachineError::TransientIo(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(io.to_string().starts_with("Transient serial I/O error"));
        assert!(std::error::Error::source(&io).is_some());
    }

    #[test]
    fn storage_error_message() {
        let err = PullMachineError::Storage("disk full".into());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }
}
