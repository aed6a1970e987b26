// Chunk progress payload and listener

use serde::Serialize;

use super::report::FileReport;
use super::FileKind;
use crate::error::NormalizeError;

pub const PHASE_COLLECT: &str = "collect";
pub const PHASE_BUILD: &str = "build";

/// Progress emitted after each committed chunk.
/// Totals are unknown while streaming, so only running counts are carried.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgress {
    pub file: FileKind,
    pub phase: String,
    pub chunk: u64,
    pub rows_read: u64,
    pub rows_stored: u64,
    pub message: String,
}

impl ChunkProgress {
    pub fn new(file: FileKind, phase: impl Into<String>, chunk: u64, rows_read: u64) -> Self {
        Self {
            file,
            phase: phase.into(),
            chunk,
            rows_read,
            rows_stored: 0,
            message: String::new(),
        }
    }

    pub fn with_stored(mut self, rows_stored: u64) -> Self {
        self.rows_stored = rows_stored;
        self
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }
}

/// Receives pipeline progress. Every hook defaults to a no-op.
pub trait ProgressListener {
    fn on_chunk(&self, _progress: &ChunkProgress) {}

    fn on_file_complete(&self, _report: &FileReport) {}

    /// A fatal error stopped the file. `report` holds the counts up to the failure.
    fn on_file_aborted(&self, _report: &FileReport, _error: &NormalizeError) {}
}

/// Log a chunk and forward it when a listener is attached.
pub fn emit_progress_opt(listener: Option<&dyn ProgressListener>, progress: &ChunkProgress) {
    log::debug!(
        "{} [{}] chunk {}: {} rows read, {} stored",
        progress.file,
        progress.phase,
        progress.chunk,
        progress.rows_read,
        progress.rows_stored
    );
    if let Some(listener) = listener {
        listener.on_chunk(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<u64>>);

    impl ProgressListener for Recorder {
        fn on_chunk(&self, progress: &ChunkProgress) {
            self.0.borrow_mut().push(progress.chunk);
        }
    }

    #[test]
    fn test_emit_without_listener_is_noop() {
        let progress = ChunkProgress::new(FileKind::Links, PHASE_BUILD, 1, 10);
        emit_progress_opt(None, &progress);
    }

    #[test]
    fn test_emit_forwards_to_listener() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        for chunk in 1..=3 {
            let progress = ChunkProgress::new(FileKind::Ratings, PHASE_BUILD, chunk, chunk * 5).with_stored(chunk);
            emit_progress_opt(Some(&recorder), &progress);
        }
        assert_eq!(*recorder.0.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let progress = ChunkProgress::new(FileKind::Credits, PHASE_COLLECT, 2, 2000).with_message("scan");
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["file"], "credits");
        assert_eq!(json["rowsRead"], 2000);
        assert_eq!(json["message"], "scan");
    }
}
