//! Linkage geometry and the force/power laws of the piston.
//!
//! The piston spans the third side of a triangle whose other two sides are the
//! fixed links `b` and `c` meeting at the arm angle θ, so by the law of cosines
//!
//! ```text
//! L(θ) = sqrt(b² + c² − 2bc·cos θ)
//! ```
//!
//! Force is pressure times effective piston area; bar → N/mm² is a division by 10.

use crate::config::CalibrationConfig;

/// Fixed link lengths and piston area of one machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linkage {
    /// First fixed link, metres.
    pub link_b_m: f64,
    /// Second fixed link, metres.
    pub link_c_m: f64,
    /// Effective piston area, mm².
    pub piston_area_mm2: f64,
}

impl Default for Linkage {
    fn default() -> Self {
        Self::from(&CalibrationConfig::default())
    }
}

impl From<&CalibrationConfig> for Linkage {
    fn from(cal: &CalibrationConfig) -> Self {
        Self {
            link_b_m: cal.link_b_m,
            link_c_m: cal.link_c_m,
            piston_area_mm2: cal.piston_area_mm2,
        }
    }
}

impl Linkage {
    /// Piston length in metres for an arm angle in degrees.
    ///
    /// Always finite and non-negative: a non-finite angle is treated as 0°, and
    /// the cosine and radicand are clamped to their valid domains.
    pub fn piston_length(&self, angle_deg: f64) -> f64 {
        let angle_deg = if angle_deg.is_finite() { angle_deg } else { 0.0 };
        let (b, c) = (self.link_b_m, self.link_c_m);
        let cos = angle_deg.to_radians().cos().clamp(-1.0, 1.0);
        (b * b + c * c - 2.0 * b * c * cos).max(0.0).sqrt()
    }

    /// Shortest possible piston length (θ = 0°), i.e. `|b − c|`.
    pub fn min_length(&self) -> f64 {
        (self.link_b_m - self.link_c_m).abs()
    }

    /// Longest possible piston length (θ = 180°), i.e. `b + c`.
    pub fn max_length(&self) -> f64 {
        self.link_b_m + self.link_c_m
    }

    /// Piston force in newtons for a pressure in bar.
    pub fn force(&self, pressure_bar: f64) -> f64 {
        (pressure_bar / 10.0) * self.piston_area_mm2
    }
}

/// Mechanical power in watts. Positive while extending, negative while retracting.
pub fn power(force_n: f64, velocity_mps: f64) -> f64 {
    force_n * velocity_mps
}
