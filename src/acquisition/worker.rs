//! Background acquisition thread.
//!
//! The worker owns the frame source (normally the serial port) for its whole life.
//! It loops until stopped:
//!
//! 1. block until a terminated frame arrives (or the read fails / times out),
//! 2. parse it and publish good readings into [`LatestReading`],
//! 3. log and drop malformed frames, log and retry I/O errors,
//! 4. check the stop token between iterations.
//!
//! The loop never sleeps on the happy path; its cadence is the device's own
//! transmission rate. Stopping sets the token and joins the thread, so the
//! source is closed before [`AcquisitionWorker::stop`] returns.

use super::frame::parse_frame;
use super::latest::LatestReading;
use super::source::{self, FrameSource};
use crate::config::SerialConfig;
use crate::error::{AppResult, PullMachineError};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Cooperative cancellation flag shared by the supervising context and the worker.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// New, not yet cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the worker to stop at its next loop iteration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_accepted: AtomicU64,
    frames_rejected: AtomicU64,
    timeouts: AtomicU64,
    io_errors: AtomicU64,
}

/// Counters reported by a running or stopped worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames parsed and published.
    pub frames_accepted: u64,
    /// Frames dropped as malformed.
    pub frames_rejected: u64,
    /// Reads that timed out without a complete frame.
    pub timeouts: u64,
    /// Other I/O failures (retried).
    pub io_errors: u64,
}

/// Handle to the acquisition thread.
pub struct AcquisitionWorker {
    stop: StopToken,
    counters: Arc<Counters>,
    thread: Mutex<Option<JoinHandle<()>>>,
    source_name: String,
}

impl AcquisitionWorker {
    /// Start a worker reading from `source` and publishing into `latest`.
    ///
    /// `backoff` is the pause after an I/O error or an idle source, so a dead
    /// link never busy-loops.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        latest: LatestReading,
        backoff: Duration,
    ) -> AppResult<Self> {
        let stop = StopToken::new();
        let counters = Arc::new(Counters::default());
        let source_name = source.describe();

        let handle = {
            let stop = stop.clone();
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("acquisition".to_string())
                .spawn(move || run_loop(source, latest, stop, counters, backoff))?
        };

        info!(source = %source_name, "Started acquisition worker");

        Ok(Self {
            stop,
            counters,
            thread: Mutex::new(Some(handle)),
            source_name,
        })
    }

    /// Resolve and open the configured serial port, then start the worker.
    ///
    /// Failing to find or open the port is a connection error and no thread
    /// is started.
    pub fn open_serial(config: &SerialConfig, latest: LatestReading) -> AppResult<Self> {
        let port = match &config.port {
            Some(port) => port.clone(),
            None if config.auto_detect => source::discover_port(&config.port_hint)?,
            None => {
                return Err(crate::error::PullMachineError::Connection {
                    port: "<unset>".to_string(),
                    reason: "no serial port configured and auto-detection disabled".to_string(),
                })
            }
        };
        let reader = source::open_serial(&port, config.baud_rate, config.read_timeout())?;
        Self::spawn(Box::new(reader), latest, config.retry_backoff())
    }

    /// Stop the worker and wait for it to exit. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.cancel();
        if let Some(handle) = self.thread.lock().take() {
            if let Err(e) = handle.join() {
                error!("Acquisition thread panicked: {:?}", e);
            }
        }
    }

    /// Whether the thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Token that stops this worker when cancelled.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Source identifier, for logs and status output.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Snapshot of the worker counters.
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            frames_accepted: self.counters.frames_accepted.load(Ordering::Relaxed),
            frames_rejected: self.counters.frames_rejected.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            io_errors: self.counters.io_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut source: Box<dyn FrameSource>,
    latest: LatestReading,
    stop: StopToken,
    counters: Arc<Counters>,
    backoff: Duration,
) {
    while !stop.is_cancelled() {
        let started = Instant::now();
        match source.read_frame() {
            Ok(Some(line)) => match parse_frame(&line) {
                Ok(reading) => {
                    trace!(?reading, "Frame accepted");
                    latest.write(reading);
                    counters.frames_accepted.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.frames_rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        line = %String::from_utf8_lossy(&line).escape_default(),
                        error = %e,
                        "Dropping malformed frame"
                    );
                }
            },
            Ok(None) => thread::sleep(backoff),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                counters.timeouts.fetch_add(1, Ordering::Relaxed);
                let err = PullMachineError::TransientIo(e);
                debug!(error = %err, "Serial read timed out, retrying");
                // A non-blocking source times out at once; pace it like any other retry.
                if let Some(rest) = backoff.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            Err(e) => {
                counters.io_errors.fetch_add(1, Ordering::Relaxed);
                let err = PullMachineError::TransientIo(e);
                warn!(error = %err, "Serial read failed, retrying");
                thread::sleep(backoff);
            }
        }
    }

    let source_name = source.describe();
    drop(source);
    info!(
        source = %source_name,
        accepted = counters.frames_accepted.load(Ordering::Relaxed),
        rejected = counters.frames_rejected.load(Ordering::Relaxed),
        timeouts = counters.timeouts.load(Ordering::Relaxed),
        io_errors = counters.io_errors.load(Ordering::Relaxed),
        "Stopped acquisition worker"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::frame::Reading;
    use crate::acquisition::source::LineReader;
    use std::collections::VecDeque;
    use std::io;
    use tracing_test::traced_test;

    /// Replays scripted read results, then reports idle.
    struct Scripted(VecDeque<io::Result<Option<Vec<u8>>>>);

    impl FrameSource for Scripted {
        fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn publishes_latest_valid_frame() {
        let latest = LatestReading::new();
        let source = LineReader::new(io::Cursor::new(b"1.0;2.0\r\n3.0;4.0\r\n".to_vec()), "cursor");
        let worker =
            AcquisitionWorker::spawn(Box::new(source), latest.clone(), Duration::from_millis(1))
                .unwrap();

        wait_for(|| worker.stats().frames_accepted == 2);
        worker.stop();

        assert_eq!(latest.read(), Reading::new(3.0, 4.0));
        assert!(!worker.is_running());
    }

    #[test]
    fn malformed_frames_do_not_overwrite() {
        let latest = LatestReading::new();
        let source = LineReader::new(
            io::Cursor::new(b"5.0;6.0\r\ngarbage\r\n1;2;3\r\n".to_vec()),
            "cursor",
        );
        let worker =
            AcquisitionWorker::spawn(Box::new(source), latest.clone(), Duration::from_millis(1))
                .unwrap();

        wait_for(|| worker.stats().frames_rejected == 2);
        worker.stop();

        assert_eq!(latest.read(), Reading::new(5.0, 6.0));
        assert_eq!(worker.stats().frames_accepted, 1);
    }

    #[test]
    fn io_errors_are_retried() {
        let latest = LatestReading::new();
        let script = VecDeque::from(vec![
            Err(io::Error::from(io::ErrorKind::TimedOut)),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
            Ok(Some(b"8.0;1.0\r\n".to_vec())),
        ]);
        let worker = AcquisitionWorker::spawn(
            Box::new(Scripted(script)),
            latest.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        wait_for(|| worker.stats().frames_accepted == 1);
        let stats = worker.stats();
        worker.stop();

        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.io_errors, 1);
        assert_eq!(latest.read(), Reading::new(8.0, 1.0));
    }

    #[test]
    fn stop_is_idempotent_and_joins() {
        let worker = AcquisitionWorker::spawn(
            Box::new(Scripted(VecDeque::new())),
            LatestReading::new(),
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(worker.is_running());
        assert!(!worker.stop_token().is_cancelled());

        worker.stop();
        worker.stop();
        assert!(!worker.is_running());
        assert!(worker.stop_token().is_cancelled());
    }

    #[test]
    fn missing_port_without_auto_detect_is_a_connection_error() {
        let config = SerialConfig {
            port: None,
            auto_detect: false,
            ..SerialConfig::default()
        };
        let err = AcquisitionWorker::open_serial(&config, LatestReading::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::PullMachineError::Connection { .. }
        ));
    }

    /// Replays its script on the calling thread, then cancels the loop.
    struct OneShot {
        script: VecDeque<io::Result<Option<Vec<u8>>>>,
        stop: StopToken,
    }

    impl FrameSource for OneShot {
        fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
            self.script.pop_front().unwrap_or_else(|| {
                self.stop.cancel();
                Ok(None)
            })
        }

        fn describe(&self) -> String {
            "one-shot".to_string()
        }
    }

    #[test]
    #[traced_test]
    fn malformed_frames_are_logged_and_dropped() {
        let stop = StopToken::new();
        let latest = LatestReading::new();
        let counters = Arc::new(Counters::default());
        let source = OneShot {
            script: VecDeque::from(vec![
                Ok(Some(b"1.0;2.0\r\n".to_vec())),
                Ok(Some(b"oops\r\n".to_vec())),
                Err(io::Error::from(io::ErrorKind::TimedOut)),
            ]),
            stop: stop.clone(),
        };

        run_loop(
            Box::new(source),
            latest.clone(),
            stop,
            Arc::clone(&counters),
            Duration::ZERO,
        );

        assert!(logs_contain("Dropping malformed frame"));
        assert!(logs_contain("Stopped acquisition worker"));
        assert_eq!(latest.read(), Reading::new(1.0, 2.0));
        assert_eq!(counters.frames_rejected.load(Ordering::Relaxed), 1);
        assert_eq!(counters.timeouts.load(Ordering::Relaxed), 1);
    }

    /// Non-blocking link: every read fails with `WouldBlock` immediately.
    struct AlwaysTimeout;

    impl FrameSource for AlwaysTimeout {
        fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }

        fn describe(&self) -> String {
            "non-blocking".to_string()
        }
    }

    #[test]
    fn immediate_timeouts_are_paced_by_backoff() {
        let worker = AcquisitionWorker::spawn(
            Box::new(AlwaysTimeout),
            LatestReading::new(),
            Duration::from_millis(10),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        worker.stop();

        let timeouts = worker.stats().timeouts;
        assert!(timeouts > 0);
        assert!(timeouts < 50, "{timeouts} retries in 100 ms");
    }
}
