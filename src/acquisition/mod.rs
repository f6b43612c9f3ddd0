//! Sensor acquisition: frame parsing, frame sources, the background worker and the
//! shared latest-reading slot it publishes into.

pub mod frame;
pub mod latest;
pub mod source;
pub mod worker;

pub use frame::{parse_frame, FrameError, Reading};
pub use latest::LatestReading;
pub use source::{FrameSource, LineReader, PortInfo, SimulatedSensor};
pub use worker::{AcquisitionWorker, StopToken, WorkerStats};
