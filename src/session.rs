//! The pull-machine session: the acquisition worker, the derivation engine and
//! the recording writer wired together behind the control and renderer contracts.
//!
//! ## Control contract
//!
//! - [`PullMachine::set_recording`] is the recording toggle; turning it off
//!   writes the recording (if any rows were captured).
//! - [`PullMachine::shutdown`] stops the acquisition worker (joining its thread, so
//!   the serial port is closed) and flushes an in-flight recording.
//!
//! ## Renderer contract
//!
//! - [`PullMachine::display`] gives the current angle, power, pressure and piston length.
//! - [`PullMachine::power_series`] / [`PullMachine::power_chart`] give the time-windowed
//!   `(t, power_w)` sequence.
//!
//! ## Link state
//!
//! Until a link is attached the sampler reads the shared slot, which holds the
//! documented default reading. If opening the serial port fails, live data is disabled
//! and every tick holds the last angle with zero pressure. The session never halts
//! because of the sensor.

use crate::acquisition::{AcquisitionWorker, FrameSource, LatestReading, Reading, WorkerStats};
use crate::config::PullMachineConfig;
use crate::data::{CsvRecordWriter, PowerChart, RecordWriter, TimeWindowedHistory};
use crate::error::AppResult;
use crate::kinematics::DerivationEngine;
use crate::measurement_types::Sample;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// State of the sensor link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No link attached yet; the shared slot still provides readings.
    Detached,
    /// Acquisition worker running.
    Live,
    /// Connection failed or the worker died; live data is off.
    Disabled(String),
}

/// Scalars shown next to the linkage drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySnapshot {
    /// Seconds since session start of the latest tick
    pub t: f64,
    /// Calibrated arm angle in degrees
    pub angle_deg: f64,
    /// Piston power in watts
    pub power_w: f64,
    /// Pressure in bar
    pub pressure_bar: f64,
    /// Piston length in metres
    pub piston_length_m: f64,
    /// Whether a recording is running
    pub recording: bool,
    /// Whether live sensor data is flowing
    pub live: bool,
}

impl fmt::Display for DisplaySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Angle α: {:7.2}°  ", self.angle_deg)?;
        write!(f, "Piston power: {:8.2} W  ", self.power_w)?;
        write!(f, "Pressure: {:7.2} bar  ", self.pressure_bar)?;
        write!(f, "Piston length: {:8.3} m", self.piston_length_m)?;
        if self.recording {
            write!(f, "  [REC]")?;
        }
        if !self.live {
            write!(f, "  [NO LINK]")?;
        }
        Ok(())
    }
}

/// A running pull-machine session.
pub struct PullMachine {
    config: PullMachineConfig,
    latest: LatestReading,
    worker: Option<AcquisitionWorker>,
    link: LinkState,
    engine: DerivationEngine,
    writer: Box<dyn RecordWriter>,
    started: Instant,
    shut_down: bool,
}

impl PullMachine {
    /// New session writing recordings as CSV per the storage configuration.
    pub fn new(config: PullMachineConfig) -> Self {
        let writer = CsvRecordWriter::from_config(&config.storage);
        Self::with_writer(config, Box::new(writer))
    }

    /// New session with a custom recording writer.
    pub fn with_writer(config: PullMachineConfig, writer: Box<dyn RecordWriter>) -> Self {
        let engine = DerivationEngine::new(&config);
        Self {
            config,
            latest: LatestReading::new(),
            worker: None,
            link: LinkState::Detached,
            engine,
            writer,
            started: Instant::now(),
            shut_down: false,
        }
    }

    /// Open the configured serial port and start acquiring.
    ///
    /// On failure live data is disabled and the connection error is returned so
    /// the caller can report it; the session itself keeps working.
    pub fn connect_serial(&mut self) -> AppResult<()> {
        self.stop_worker();
        match AcquisitionWorker::open_serial(&self.config.serial, self.latest.clone()) {
            Ok(worker) => {
                self.attach(worker);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Sensor link unavailable, live data disabled");
                self.link = LinkState::Disabled(e.to_string());
                Err(e)
            }
        }
    }

    /// Start acquiring from an arbitrary frame source (simulation, replay, tests).
    pub fn connect_source(&mut self, source: Box<dyn FrameSource>) -> AppResult<()> {
        self.stop_worker();
        let worker = AcquisitionWorker::spawn(
            source,
            self.latest.clone(),
            self.config.serial.retry_backoff(),
        )?;
        self.attach(worker);
        Ok(())
    }

    fn attach(&mut self, worker: AcquisitionWorker) {
        info!(source = worker.source_name(), "Sensor link live");
        self.worker = Some(worker);
        self.link = LinkState::Live;
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }

    /// Shared slot the acquisition worker publishes into.
    pub fn latest_reading(&self) -> &LatestReading {
        &self.latest
    }

    /// Current link state.
    pub fn link_state(&self) -> &LinkState {
        &self.link
    }

    /// Whether live data feeds the sampler.
    pub fn is_live(&self) -> bool {
        matches!(self.link, LinkState::Live)
    }

    /// Acquisition counters, when a worker is attached.
    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.worker.as_ref().map(AcquisitionWorker::stats)
    }

    /// Seconds since the session was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Run one sampler tick now.
    pub fn tick(&mut self) -> Sample {
        let t = self.elapsed_secs();
        self.tick_at(t)
    }

    /// Run one sampler tick at `t` seconds since session start.
    pub fn tick_at(&mut self, t: f64) -> Sample {
        self.check_worker();
        let reading = self.current_reading();
        self.engine.tick(reading, t)
    }

    fn current_reading(&self) -> Option<Reading> {
        match self.link {
            LinkState::Detached | LinkState::Live => Some(self.latest.read()),
            LinkState::Disabled(_) => None,
        }
    }

    fn check_worker(&mut self) {
        if !matches!(self.link, LinkState::Live) {
            return;
        }
        if self.worker.as_ref().is_some_and(|w| !w.is_running()) {
            warn!("Acquisition worker exited unexpectedly, live data disabled");
            self.stop_worker();
            self.link = LinkState::Disabled("acquisition worker exited".to_string());
        }
    }

    /// Recording toggle. Turning recording off writes the captured rows and
    /// returns the file path; nothing is written for an empty recording.
    pub fn set_recording(&mut self, on: bool) -> AppResult<Option<PathBuf>> {
        if on {
            self.start_recording();
            Ok(None)
        } else {
            self.stop_recording()
        }
    }

    /// Begin recording. Returns `false` if a recording was already running.
    pub fn start_recording(&mut self) -> bool {
        let started = self.engine.start_recording();
        if started {
            info!("Recording started");
        }
        started
    }

    /// Stop recording and hand the rows to the writer.
    pub fn stop_recording(&mut self) -> AppResult<Option<PathBuf>> {
        match self.engine.stop_recording() {
            Some(rows) => {
                info!(rows = rows.len(), "Recording stopped");
                self.writer.write_recording(&rows).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Whether a recording is running.
    pub fn is_recording(&self) -> bool {
        self.engine.recording().is_active()
    }

    /// Current values for the renderer.
    pub fn display(&self) -> DisplaySnapshot {
        let live = self.is_live();
        let recording = self.is_recording();
        match self.engine.latest() {
            Some(s) => DisplaySnapshot {
                t: s.t,
                angle_deg: s.angle_deg,
                power_w: s.power_w,
                pressure_bar: s.pressure_bar,
                piston_length_m: s.piston_length_m,
                recording,
                live,
            },
            None => {
                let angle_deg = self.engine.last_angle_deg();
                DisplaySnapshot {
                    t: 0.0,
                    angle_deg,
                    power_w: 0.0,
                    pressure_bar: 0.0,
                    piston_length_m: self.engine.linkage().piston_length(angle_deg),
                    recording,
                    live,
                }
            }
        }
    }

    /// Time-windowed history.
    pub fn history(&self) -> &TimeWindowedHistory {
        self.engine.history()
    }

    /// `(t, power_w)` pairs for the chart, oldest first.
    pub fn power_series(&self) -> Vec<(f64, f64)> {
        self.engine.history().power_series()
    }

    /// Chart-ready power series with axis extents.
    pub fn power_chart(&self) -> PowerChart {
        self.engine.history().power_chart()
    }

    /// Active configuration.
    pub fn config(&self) -> &PullMachineConfig {
        &self.config
    }

    /// Stop acquisition and flush any in-flight recording. Safe to call more than once.
    pub fn shutdown(&mut self) -> AppResult<Option<PathBuf>> {
        if self.shut_down {
            return Ok(None);
        }
        self.shut_down = true;

        self.stop_worker();
        if matches!(self.link, LinkState::Live) {
            self.link = LinkState::Detached;
        }
        let flushed = self.stop_recording();
        info!("Session shut down");
        flushed
    }
}

impl Drop for PullMachine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "Failed to flush recording during shutdown");
        }
    }
}

impl fmt::Debug for PullMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullMachine")
            .field("link", &self.link)
            .field("recording", &self.is_recording())
            .field("history_len", &self.history().len())
            .finish()
    }
}
