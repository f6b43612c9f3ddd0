//! Recording writers.
//!
//! A finished [`RecordingSession`](super::recording::RecordingSession) is handed to a
//! [`RecordWriter`]. The CSV writer produces
//! `<prefix>_<YYYYMMDD_HHMMSS>.csv` with the header `timestamp,angle_deg,pressure`.
//! The file is written under a temporary name in the same directory and renamed into
//! place, so a reader never sees a half-written recording.
use crate::{
    config::StorageConfig,
    error::{AppResult, PullMachineError},
    measurement_types::RecordRow,
};
use std::path::{Path, PathBuf};

/// Destination for finished recordings.
pub trait RecordWriter: Send {
    /// Persist `rows` and return where they went.
    fn write_recording(&mut self, rows: &[RecordRow]) -> AppResult<PathBuf>;
}

/// Writes each recording to its own timestamped CSV file.
#[derive(Debug, Clone)]
pub struct CsvRecordWriter {
    output_dir: PathBuf,
    file_prefix: String,
}

impl CsvRecordWriter {
    /// Writer targeting `output_dir`, naming files `<file_prefix>_<timestamp>.csv`.
    pub fn new(output_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    /// Writer from the storage section of the configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.output_dir, &config.file_prefix)
    }

    /// Directory recordings land in.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a recording stopped at local time `now`.
    pub fn file_name(&self, now: chrono::DateTime<chrono::Local>) -> String {
        format!("{}_{}.csv", self.file_prefix, now.format("%Y%m%d_%H%M%S"))
    }

    /// First path for `now` that does not exist yet; a second recording stopped
    /// within the same second gets a numeric suffix.
    fn unique_path(&self, now: chrono::DateTime<chrono::Local>) -> PathBuf {
        let base = self.output_dir.join(self.file_name(now));
        if !base.exists() {
            return base;
        }
        let stem = format!("{}_{}", self.file_prefix, now.format("%Y%m%d_%H%M%S"));
        (1..)
            .map(|n| self.output_dir.join(format!("{stem}_{n}.csv")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }
}

impl RecordWriter for CsvRecordWriter {
    #[cfg(feature = "storage_csv")]
    fn write_recording(&mut self, rows: &[RecordRow]) -> AppResult<PathBuf> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir).map_err(|e| {
                PullMachineError::Storage(format!(
                    "Failed to create output directory '{}': {}",
                    self.output_dir.display(),
                    e
                ))
            })?;
        }

        let path = self.unique_path(chrono::Local::now());
        let tmp_path = path.with_extension("csv.tmp");

        let result = write_csv(&tmp_path, rows).and_then(|()| {
            std::fs::rename(&tmp_path, &path).map_err(|e| {
                PullMachineError::Storage(format!(
                    "Failed to move recording into place at '{}': {}",
                    path.display(),
                    e
                ))
            })
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
        }
        result?;

        tracing::info!(path = %path.display(), rows = rows.len(), "Recording saved");
        Ok(path)
    }

    #[cfg(not(feature = "storage_csv"))]
    fn write_recording(&mut self, _rows: &[RecordRow]) -> AppResult<PathBuf> {
        Err(PullMachineError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

#[cfg(feature = "storage_csv")]
fn write_csv(path: &Path, rows: &[RecordRow]) -> AppResult<()> {
    let file = std::fs::File::create(path).map_err(|e| {
        PullMachineError::Storage(format!("Failed to create CSV file: {}", e))
    })?;
    let mut writer = csv::Writer::from_writer(file);
    // Header comes from the RecordRow field names.
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| PullMachineError::Storage(e.to_string()))?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| PullMachineError::Storage(e.to_string()))?;
    file.sync_all()?;
    Ok(())
}

/// Keeps recordings in memory. Useful when embedding the engine without a file system.
#[derive(Debug, Default)]
pub struct MemoryRecordWriter {
    /// Every recording written, in order.
    pub recordings: Vec<Vec<RecordRow>>,
}

impl RecordWriter for MemoryRecordWriter {
    fn write_recording(&mut self, rows: &[RecordRow]) -> AppResult<PathBuf> {
        self.recordings.push(rows.to_vec());
        Ok(PathBuf::from(format!("memory://{}", self.recordings.len())))
    }
}
