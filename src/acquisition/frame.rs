//! Sensor frame parsing.
//!
//! The sensor sends one ASCII/Latin-1 line per measurement:
//!
//! ```text
//! <raw angle>;<raw pressure>\r\n
//! ```
//!
//! Parsing is a pure function of the received bytes. Failures are reported as
//! [`FrameError`] and must be logged and discarded by the caller; they never
//! overwrite the last good [`Reading`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line terminator sent by the sensor after every frame.
pub const FRAME_TERMINATOR: &[u8; 2] = b"\r\n";

/// Field separator inside a frame.
pub const FIELD_SEPARATOR: u8 = b';';

/// The latest parsed (angle, pressure) pair, before calibration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    /// Raw arm angle in degrees.
    pub angle_deg: f64,
    /// Raw cylinder pressure in bar.
    pub pressure_bar: f64,
}

impl Reading {
    /// Create a reading from raw values.
    pub fn new(angle_deg: f64, pressure_bar: f64) -> Self {
        Self {
            angle_deg,
            pressure_bar,
        }
    }

    /// True when both values are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.angle_deg.is_finite() && self.pressure_bar.is_finite()
    }
}

/// Reasons a frame is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// Nothing but the terminator (or whitespace) was received.
    #[error("empty frame")]
    Empty,

    /// The frame did not split into exactly two fields.
    #[error("expected 2 fields, found {0}")]
    FieldCount(usize),

    /// A field could not be decoded as a number.
    #[error("field {index} is not numeric: '{text}'")]
    NotNumeric {
        /// Zero-based field position.
        index: usize,
        /// The offending text.
        text: String,
    },

    /// A field decoded to NaN or infinity.
    #[error("field {index} is not finite: {value}")]
    NotFinite {
        /// Zero-based field position.
        index: usize,
        /// The decoded value.
        value: f64,
    },
}

/// Decode bytes as Latin-1. Every byte maps to the code point of the same value,
/// so this cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parse one raw line (terminator optional) into a [`Reading`].
///
/// Surrounding whitespace, including the `\r\n` terminator, is stripped before
/// splitting on `;`. Exactly two finite numeric fields are required.
pub fn parse_frame(line: &[u8]) -> Result<Reading, FrameError> {
    let text = decode_latin1(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FrameError::Empty);
    }

    let fields: Vec<&str> = trimmed.split(char::from(FIELD_SEPARATOR)).collect();
    if fields.len() != 2 {
        return Err(FrameError::FieldCount(fields.len()));
    }

    let angle_deg = parse_field(0, fields[0])?;
    let pressure_bar = parse_field(1, fields[1])?;

    Ok(Reading {
        angle_deg,
        pressure_bar,
    })
}

fn parse_field(index: usize, raw: &str) -> Result<f64, FrameError> {
    let text = raw.trim();
    let value = text.parse::<f64>().map_err(|_| FrameError::NotNumeric {
        index,
        text: text.to_string(),
    })?;
    if !value.is_finite() {
        return Err(FrameError::NotFinite { index, value });
    }
    Ok(value)
}
