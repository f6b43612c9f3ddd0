//! Measurement types shared by the derivation engine, the history buffers and
//! the recording writer.

use serde::{Deserialize, Serialize};

/// One fully derived record, produced once per sampler tick.
///
/// # Fields
/// * `t` - Seconds since the session started
/// * `angle_deg` - Calibrated arm angle
/// * `pressure_bar` - Cylinder pressure
/// * `piston_length_m` - Instantaneous piston length
/// * `piston_velocity_mps` - Smoothed piston velocity
/// * `force_n` - Piston force
/// * `power_w` - Mechanical power, sign follows velocity
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since session start
    pub t: f64,
    /// Calibrated arm angle in degrees
    pub angle_deg: f64,
    /// Pressure in bar
    pub pressure_bar: f64,
    /// Piston length in metres
    pub piston_length_m: f64,
    /// Smoothed piston velocity in m/s
    pub piston_velocity_mps: f64,
    /// Piston force in newtons
    pub force_n: f64,
    /// Power in watts
    pub power_w: f64,
}

/// One row of a recording: what the CSV file holds.
///
/// Serializes with the column names `timestamp,angle_deg,pressure`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Seconds since session start
    #[serde(rename = "timestamp")]
    pub t: f64,
    /// Calibrated arm angle in degrees
    pub angle_deg: f64,
    /// Pressure in bar
    #[serde(rename = "pressure")]
    pub pressure_bar: f64,
}

impl From<&Sample> for RecordRow {
    fn from(sample: &Sample) -> Self {
        Self {
            t: sample.t,
            angle_deg: sample.angle_deg,
            pressure_bar: sample.pressure_bar,
        }
    }
}
