//! Sample history, recording sessions and recording storage.
pub mod history;
pub mod recording;
pub mod storage;

pub use history::{PowerChart, TimeWindowedHistory};
pub use recording::RecordingSession;
pub use storage::{CsvRecordWriter, MemoryRecordWriter, RecordWriter};
