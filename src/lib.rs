// Movie Normalizer Library Entry Point
//
// Loads the Movies Dataset CSV files into a normalized SQLite schema.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod ingest;

pub use config::IngestConfig;
pub use db::sink::{BulkSink, InsertMode, SqliteSink};
pub use error::{NormalizeError, Result};
pub use ingest::{process_file, run_pipeline, FileKind, FileReport, LoadOptions, PipelineReport};
