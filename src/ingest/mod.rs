// Ingest pipeline module
//
// Each source file goes through two passes: collect unique lookup values,
// resolve them against the database, then re-stream the file to build
// relationship rows.

pub mod builder;
pub mod cell;
pub mod collector;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod report;
pub mod resolver;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CREDITS_FILE, KEYWORDS_FILE, LINKS_FILE, MOVIES_METADATA_FILE, RATINGS_FULL_FILE, RATINGS_SMALL_FILE,
};

pub use pipeline::{process_file, run_pipeline, LoadOptions};
pub use report::{FileReport, PipelineReport};

/// Source files, in the order they must be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    MoviesMetadata,
    Credits,
    Keywords,
    Links,
    Ratings,
}

impl FileKind {
    /// Metadata creates the movies the later files reference.
    pub const ORDER: [FileKind; 5] = [
        FileKind::MoviesMetadata,
        FileKind::Credits,
        FileKind::Keywords,
        FileKind::Links,
        FileKind::Ratings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FileKind::MoviesMetadata => "movies_metadata",
            FileKind::Credits => "credits",
            FileKind::Keywords => "keywords",
            FileKind::Links => "links",
            FileKind::Ratings => "ratings",
        }
    }

    pub fn file_name(self, full_ratings: bool) -> &'static str {
        match self {
            FileKind::MoviesMetadata => MOVIES_METADATA_FILE,
            FileKind::Credits => CREDITS_FILE,
            FileKind::Keywords => KEYWORDS_FILE,
            FileKind::Links => LINKS_FILE,
            FileKind::Ratings if full_ratings => RATINGS_FULL_FILE,
            FileKind::Ratings => RATINGS_SMALL_FILE,
        }
    }

    /// Files with JSON-like cells are read in smaller chunks.
    pub fn has_embedded_cells(self) -> bool {
        matches!(self, FileKind::MoviesMetadata | FileKind::Credits | FileKind::Keywords)
    }

    /// Files whose relationships require the movie to already exist.
    pub fn links_to_movies(self) -> bool {
        matches!(self, FileKind::Credits | FileKind::Keywords)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
