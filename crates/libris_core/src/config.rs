//! Storage location configuration.
//!
//! File paths are external configuration: the core never hardcodes where
//! the three collections live beyond the `data/` default.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LIBRIS_DATA_DIR";

const DEFAULT_DATA_DIR: &str = "data";
const BOOKS_FILE_NAME: &str = "books.json";
const MEMBERS_FILE_NAME: &str = "members.json";
const LOANS_FILE_NAME: &str = "loans.json";

/// Locations of the three JSON collection files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub books_path: PathBuf,
    pub members_path: PathBuf,
    pub loans_path: PathBuf,
}

impl LibraryConfig {
    /// Places all three files under one directory.
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            books_path: dir.join(BOOKS_FILE_NAME),
            members_path: dir.join(MEMBERS_FILE_NAME),
            loans_path: dir.join(LOANS_FILE_NAME),
        }
    }

    /// Resolves the data directory from `LIBRIS_DATA_DIR`.
    ///
    /// Unset or blank values fall back to `data/`.
    pub fn from_env() -> Self {
        Self::from_data_dir(resolve_data_dir(std::env::var(DATA_DIR_ENV).ok()))
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::from_data_dir(DEFAULT_DATA_DIR)
    }
}

fn resolve_data_dir(raw: Option<String>) -> PathBuf {
    if let Some(raw) = raw {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    PathBuf::from(DEFAULT_DATA_DIR)
}
