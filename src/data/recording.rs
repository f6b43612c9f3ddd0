//! Recording session: rows accumulated while the user has recording switched on.

use crate::measurement_types::RecordRow;

/// Rows buffered for the active recording.
///
/// `start` clears and activates (no-op when already active). `stop` deactivates
/// and hands the rows over, leaving the session empty; stopping with nothing
/// recorded yields `None` so no empty file gets written.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    active: bool,
    rows: Vec<RecordRow>,
}

impl RecordingSession {
    /// Inactive, empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin recording. Returns `false` if a recording was already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.rows.clear();
        self.active = true;
        true
    }

    /// Stop recording and take the accumulated rows, if any.
    pub fn stop(&mut self) -> Option<Vec<RecordRow>> {
        self.active = false;
        let rows = std::mem::take(&mut self.rows);
        (!rows.is_empty()).then_some(rows)
    }

    /// Append a row if recording is active.
    pub fn append(&mut self, row: RecordRow) {
        if self.active {
            self.rows.push(row);
        }
    }

    /// Whether a recording is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Rows recorded so far.
    pub fn rows(&self) -> &[RecordRow] {
        &self.rows
    }
}
