//! Collection persistence contracts.
//!
//! # Responsibility
//! - Define the load/save seam services use to persist whole collections.
//! - Keep file-format details out of the service layer.
//!
//! # Invariants
//! - `save` rewrites the full collection; there is no append or partial write.
//! - A missing or empty backing file loads as an empty collection.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod json_store;

pub use json_store::JsonFileStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure for one collection file.
#[derive(Debug)]
pub enum StoreError {
    /// Directory creation, read, write or delete failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Content could not be (de)serialized.
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "storage I/O failed for `{}`: {source}", path.display())
            }
            Self::Format { path, source } => {
                write!(f, "invalid JSON content in `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Format { source, .. } => Some(source),
        }
    }
}

/// Whole-collection persistence for records of type `T`.
pub trait CollectionStore<T> {
    /// Overwrites the stored collection with `items`.
    fn save(&self, items: &[T]) -> StoreResult<()>;
    /// Reads the stored collection; empty when nothing is stored yet.
    fn load(&self) -> StoreResult<Vec<T>>;
    fn exists(&self) -> bool;
    /// Deletes the stored collection; no-op when nothing is stored.
    fn remove(&self) -> StoreResult<()>;
    /// Size of the stored representation in bytes; 0 when nothing is stored.
    fn size_bytes(&self) -> StoreResult<u64>;
}
