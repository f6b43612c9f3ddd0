//! Per-tick derivation of kinematics and power.
//!
//! Each tick:
//!
//! 1. take the latest reading (or fall back to the previous angle and zero pressure),
//!    add the calibration offset to the angle,
//! 2. compute the instantaneous piston length,
//! 3. push angle, time and length into the smoothing windows,
//! 4. difference the oldest and newest window entries for the piston velocity,
//! 5. derive force and power,
//! 6. append the sample to the time-windowed history,
//! 7. append a recording row if recording is active.
//!
//! Velocity spans the whole smoothing window rather than consecutive ticks:
//! noisier sensors are tolerated at the cost of ~200 ms of lag.
//!
//! The engine never fails and never blocks.

use super::geometry::{self, Linkage};
use super::window::SlidingWindow;
use crate::acquisition::Reading;
use crate::config::PullMachineConfig;
use crate::data::{RecordingSession, TimeWindowedHistory};
use crate::measurement_types::{RecordRow, Sample};
use tracing::trace;

/// Sampler state: smoothing windows, history and the recording buffer.
#[derive(Debug, Clone)]
pub struct DerivationEngine {
    linkage: Linkage,
    angle_offset_deg: f64,
    angles: SlidingWindow<f64>,
    times: SlidingWindow<f64>,
    lengths: SlidingWindow<f64>,
    last_angle_deg: f64,
    history: TimeWindowedHistory,
    recording: RecordingSession,
    latest: Option<Sample>,
}

impl DerivationEngine {
    /// Build an engine from the sampler and calibration sections.
    pub fn new(config: &PullMachineConfig) -> Self {
        Self::with_parts(
            Linkage::from(&config.calibration),
            config.calibration.angle_offset_deg,
            config.sampler.smoothing_window,
            config.sampler.history_window_secs,
        )
    }

    /// Build an engine from explicit parts.
    pub fn with_parts(
        linkage: Linkage,
        angle_offset_deg: f64,
        smoothing_window: usize,
        history_window_secs: f64,
    ) -> Self {
        Self {
            linkage,
            angle_offset_deg,
            angles: SlidingWindow::new(smoothing_window),
            times: SlidingWindow::new(smoothing_window),
            lengths: SlidingWindow::new(smoothing_window),
            // Until the first frame, behave as if the default (0, 0) reading arrived.
            last_angle_deg: angle_offset_deg,
            history: TimeWindowedHistory::new(history_window_secs),
            recording: RecordingSession::new(),
            latest: None,
        }
    }

    /// Run one tick at `t` seconds since session start.
    ///
    /// `reading` is `None` when no live data is available; the previous angle
    /// is held and pressure is reported as zero. Non-finite readings are
    /// treated the same way.
    pub fn tick(&mut self, reading: Option<Reading>, t: f64) -> Sample {
        let (angle_deg, pressure_bar) = match reading.filter(Reading::is_finite) {
            Some(r) => (r.angle_deg + self.angle_offset_deg, r.pressure_bar),
            None => (self.last_angle_deg, 0.0),
        };

        let piston_length_m = self.linkage.piston_length(angle_deg);

        self.angles.push(angle_deg);
        self.times.push(t);
        self.lengths.push(piston_length_m);

        let piston_velocity_mps = self.smoothed_velocity();
        let force_n = self.linkage.force(pressure_bar);
        let power_w = geometry::power(force_n, piston_velocity_mps);

        let sample = Sample {
            t,
            angle_deg,
            pressure_bar,
            piston_length_m,
            piston_velocity_mps,
            force_n,
            power_w,
        };
        trace!(?sample, "Tick");

        self.last_angle_deg = angle_deg;
        self.history.push(sample);
        self.recording.append(RecordRow::from(&sample));
        self.latest = Some(sample);
        sample
    }

    fn smoothed_velocity(&self) -> f64 {
        match (self.times.span(), self.lengths.span()) {
            (Some((t_old, t_new)), Some((l_old, l_new))) => {
                let dt = t_new - t_old;
                if dt > 0.0 {
                    (l_new - l_old) / dt
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    /// Angle that will be held if the next tick has no reading.
    pub fn last_angle_deg(&self) -> f64 {
        self.last_angle_deg
    }

    /// Time-windowed history.
    pub fn history(&self) -> &TimeWindowedHistory {
        &self.history
    }

    /// Recording buffer.
    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    /// Begin recording. No-op (returns `false`) if already recording.
    pub fn start_recording(&mut self) -> bool {
        self.recording.start()
    }

    /// End recording and take the rows, `None` if nothing was recorded.
    pub fn stop_recording(&mut self) -> Option<Vec<RecordRow>> {
        self.recording.stop()
    }

    /// Linkage in use.
    pub fn linkage(&self) -> &Linkage {
        &self.linkage
    }
}
