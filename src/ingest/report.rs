// Per-file and per-run counters

use std::collections::BTreeMap;

use serde::Serialize;

use super::FileKind;
use crate::db::tables::Table;
use crate::error::RowError;

/// Rows sent to a table versus rows it actually kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub written: u64,
    pub stored: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupStat {
    pub table: Table,
    pub candidates: u64,
    pub stored: u64,
}

/// Row-level error messages. Every error is counted; only the first `cap` keep their text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorSamples {
    pub total: u64,
    pub samples: Vec<String>,
    #[serde(skip)]
    cap: usize,
}

impl ErrorSamples {
    pub fn new(cap: usize) -> Self {
        Self {
            total: 0,
            samples: Vec::new(),
            cap,
        }
    }

    pub fn record(&mut self, message: String) {
        self.total += 1;
        if self.samples.len() < self.cap {
            self.samples.push(message);
        }
    }

    /// Errors counted but not retained.
    pub fn dropped(&self) -> u64 {
        self.total - self.samples.len() as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: FileKind,
    pub path: String,
    /// Rows seen by the lookup pass
    pub rows_scanned: u64,
    /// Rows seen by the relationship pass
    pub rows_read: u64,
    pub rows_skipped: u64,
    /// Relationships dropped because a reference did not resolve
    pub unresolved: u64,
    pub lookups: Vec<LookupStat>,
    pub tables: BTreeMap<Table, TableCount>,
    pub errors: ErrorSamples,
    pub elapsed_ms: u64,
}

impl FileReport {
    pub fn new(file: FileKind, path: impl Into<String>, max_error_samples: usize) -> Self {
        Self {
            file,
            path: path.into(),
            rows_scanned: 0,
            rows_read: 0,
            rows_skipped: 0,
            unresolved: 0,
            lookups: Vec::new(),
            tables: BTreeMap::new(),
            errors: ErrorSamples::new(max_error_samples),
            elapsed_ms: 0,
        }
    }

    pub fn record_write(&mut self, table: Table, written: usize, stored: usize) {
        let entry = self.tables.entry(table).or_default();
        entry.written += written as u64;
        entry.stored += stored as u64;
    }

    pub fn skip_row(&mut self, line: u64, err: &RowError) {
        self.rows_skipped += 1;
        self.errors.record(format!("{} line {}: {}", self.file, line, err));
    }

    /// Rows stored by the relationship pass across all tables.
    pub fn stored_total(&self) -> u64 {
        self.tables.values().map(|c| c.stored).sum()
    }

    pub fn stored(&self, table: Table) -> u64 {
        self.tables.get(&table).map(|c| c.stored).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub files: Vec<FileReport>,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    pub fn rows_skipped(&self) -> u64 {
        self.files.iter().map(|f| f.rows_skipped).sum()
    }

    pub fn file(&self, kind: FileKind) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == kind)
    }
}
