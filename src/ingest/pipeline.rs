// Pipeline orchestration
// Runs collect -> resolve -> build for each selected file, in fixed order.
// A fatal error stops the run; chunks already committed stay committed.

use std::path::Path;
use std::time::Instant;

use super::builder::build_relationships;
use super::collector::collect_unique;
use super::progress::ProgressListener;
use super::report::{FileReport, PipelineReport};
use super::resolver::{resolve_file_lookups, LookupContext};
use super::FileKind;
use crate::config::IngestConfig;
use crate::db::sink::BulkSink;
use crate::error::Result;

/// Streaming knobs for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub chunk_size: usize,
    pub flat_chunk_size: usize,
    pub max_error_samples: usize,
}

impl LoadOptions {
    pub fn chunk_size_for(&self, kind: FileKind) -> usize {
        if kind.has_embedded_cells() {
            self.chunk_size
        } else {
            self.flat_chunk_size
        }
    }
}

impl From<&IngestConfig> for LoadOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            flat_chunk_size: config.flat_chunk_size,
            max_error_samples: config.max_error_samples,
        }
    }
}

/// Run one file's two-pass cycle.
///
/// On a fatal error the partial report goes to the listener's
/// `on_file_aborted` before the error is returned.
pub fn process_file<S>(
    sink: &mut S,
    kind: FileKind,
    path: &Path,
    options: &LoadOptions,
    listener: Option<&dyn ProgressListener>,
) -> Result<FileReport>
where
    S: BulkSink + ?Sized,
{
    let started = Instant::now();
    let mut report = FileReport::new(kind, path.display().to_string(), options.max_error_samples);

    log::info!("Processing {} from {}", kind, path.display());

    let outcome = load_file(sink, kind, path, options.chunk_size_for(kind), &mut report, listener);
    report.elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => Ok(report),
        Err(e) => {
            log::error!(
                "{} aborted after {} rows ({} skipped, {} row errors): {}",
                kind,
                report.rows_read,
                report.rows_skipped,
                report.errors.total,
                e
            );
            if let Some(listener) = listener {
                listener.on_file_aborted(&report, &e);
            }
            Err(e)
        }
    }
}

fn load_file<S>(
    sink: &mut S,
    kind: FileKind,
    path: &Path,
    chunk_size: usize,
    report: &mut FileReport,
    listener: Option<&dyn ProgressListener>,
) -> Result<()>
where
    S: BulkSink + ?Sized,
{
    // Links has no lookups and is read once
    let ctx = if kind == FileKind::Links {
        LookupContext::default()
    } else {
        let values = collect_unique(path, kind, chunk_size, listener)?;
        report.rows_scanned = values.rows_scanned;
        let (ctx, lookups) = resolve_file_lookups(&mut *sink, kind, &values)?;
        report.lookups = lookups;
        ctx
    };

    build_relationships(&mut *sink, kind, path, &ctx, chunk_size, report, listener)
}

/// Process every selected file. The first fatal error aborts the run.
pub fn run_pipeline<S>(
    sink: &mut S,
    config: &IngestConfig,
    listener: Option<&dyn ProgressListener>,
) -> Result<PipelineReport>
where
    S: BulkSink + ?Sized,
{
    config.validate()?;
    let started = Instant::now();
    let options = LoadOptions::from(config);
    let mut report = PipelineReport::default();

    for kind in config.selected_files() {
        let path = config.path_for(kind);
        let file_report = process_file(&mut *sink, kind, &path, &options, listener)?;

        if let Some(listener) = listener {
            listener.on_file_complete(&file_report);
        }
        report.files.push(file_report);
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "Pipeline finished: {} files in {} ms, {} rows skipped",
        report.files.len(),
        report.elapsed_ms,
        report.rows_skipped()
    );
    Ok(report)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
