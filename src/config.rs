// Loader configuration
//
// Resolution order:
// 1) Built-in defaults (constants.rs)
// 2) Environment overrides (MOVIENORM_DATA_DIR, etc.)
// 3) CLI flags, applied by the binary

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DATA_DIR, DEFAULT_DB_PATH, DEFAULT_FLAT_CHUNK_SIZE, DEFAULT_MAX_ERROR_SAMPLES,
    ENV_CHUNK_SIZE, ENV_DATA_DIR, ENV_DB_PATH, ENV_FLAT_CHUNK_SIZE,
};
use crate::error::{NormalizeError, Result};
use crate::ingest::FileKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Rows per chunk for files with JSON-like cells
    pub chunk_size: usize,
    /// Rows per chunk for links and ratings
    pub flat_chunk_size: usize,
    pub max_error_samples: usize,
    /// Load ratings.csv instead of ratings_small.csv
    pub full_ratings: bool,
    /// Files to load. Empty means all of them.
    pub files: Vec<FileKind>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
            flat_chunk_size: DEFAULT_FLAT_CHUNK_SIZE,
            max_error_samples: DEFAULT_MAX_ERROR_SAMPLES,
            full_ratings: false,
            files: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_with(|key| env::var(key).ok());
        config
    }

    /// Apply overrides from any key lookup. Unparsable numbers are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(v);
        }
        if let Some(n) = parse_size(ENV_CHUNK_SIZE, lookup(ENV_CHUNK_SIZE)) {
            self.chunk_size = n;
        }
        if let Some(n) = parse_size(ENV_FLAT_CHUNK_SIZE, lookup(ENV_FLAT_CHUNK_SIZE)) {
            self.flat_chunk_size = n;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(NormalizeError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.flat_chunk_size == 0 {
            return Err(NormalizeError::Config("flat_chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Selected files in processing order.
    pub fn selected_files(&self) -> Vec<FileKind> {
        FileKind::ORDER
            .into_iter()
            .filter(|kind| self.files.is_empty() || self.files.contains(kind))
            .collect()
    }

    pub fn path_for(&self, kind: FileKind) -> PathBuf {
        self.data_dir.join(kind.file_name(self.full_ratings))
    }
}

fn parse_size(key: &str, value: Option<String>) -> Option<usize> {
    let value = value?;
    match value.trim().parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IngestConfig::default();
        config.apply_env_with(lookup_from(&[
            (ENV_DATA_DIR, "/srv/movies"),
            (ENV_CHUNK_SIZE, "250"),
            (ENV_FLAT_CHUNK_SIZE, "lots"),
        ]));

        assert_eq!(config.data_dir, PathBuf::from("/srv/movies"));
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.flat_chunk_size, DEFAULT_FLAT_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = IngestConfig::default();
        config.apply_env_with(lookup_from(&[(ENV_CHUNK_SIZE, "0")]));
        assert!(matches!(config.validate(), Err(NormalizeError::Config(_))));
    }

    #[test]
    fn test_selection_keeps_fixed_order() {
        let config = IngestConfig {
            files: vec![FileKind::Ratings, FileKind::MoviesMetadata],
            ..Default::default()
        };
        assert_eq!(config.selected_files(), vec![FileKind::MoviesMetadata, FileKind::Ratings]);
        assert_eq!(IngestConfig::default().selected_files().len(), 5);
    }

    #[test]
    fn test_ratings_path_follows_full_flag() {
        let mut config = IngestConfig::default();
        assert!(config.path_for(FileKind::Ratings).ends_with("ratings_small.csv"));
        config.full_ratings = true;
        assert!(config.path_for(FileKind::Ratings).ends_with("ratings.csv"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: IngestConfig = serde_json::from_str(r#"{"chunk_size": 10, "files": ["credits"]}"#).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.files, vec![FileKind::Credits]);
        assert_eq!(config.max_error_samples, DEFAULT_MAX_ERROR_SAMPLES);
    }
}
