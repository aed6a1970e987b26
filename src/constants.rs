// Movie Normalizer Constants
// Defaults for the loader. Config and CLI flags override the tunable ones.

pub const SCHEMA_VERSION: u32 = 1;

// Source files (fixed shapes)
pub const MOVIES_METADATA_FILE: &str = "movies_metadata.csv";
pub const CREDITS_FILE: &str = "credits.csv";
pub const KEYWORDS_FILE: &str = "keywords.csv";
pub const LINKS_FILE: &str = "links.csv";
pub const RATINGS_SMALL_FILE: &str = "ratings_small.csv";
pub const RATINGS_FULL_FILE: &str = "ratings.csv";

// Paths
pub const DEFAULT_DATA_DIR: &str = "data/raw/the-movies-dataset";
pub const DEFAULT_DB_PATH: &str = "movies.db";

// Streaming
pub const DEFAULT_CHUNK_SIZE: usize = 1_000; // files with embedded JSON-like cells
pub const DEFAULT_FLAT_CHUNK_SIZE: usize = 5_000; // links, ratings
pub const CSV_READ_BUFFER_BYTES: usize = 1 << 20;
pub const LOOKUP_INSERT_BATCH: usize = 5_000;
pub const MAX_CHUNK_PREALLOC: usize = 4_096; // rows reserved up front per chunk

// Reporting
pub const DEFAULT_MAX_ERROR_SAMPLES: usize = 10;

// Environment overrides
pub const ENV_DATA_DIR: &str = "MOVIENORM_DATA_DIR";
pub const ENV_DB_PATH: &str = "MOVIENORM_DB_PATH";
pub const ENV_CHUNK_SIZE: &str = "MOVIENORM_CHUNK_SIZE";
pub const ENV_FLAT_CHUNK_SIZE: &str = "MOVIENORM_FLAT_CHUNK_SIZE";

// Release dates in movies_metadata.csv
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";
