//! JSON file implementation of `CollectionStore`.
//!
//! # Responsibility
//! - Persist one collection as a pretty-printed JSON array in one file.
//! - Create parent directories on demand.
//!
//! # Invariants
//! - No locking: one writer per file is assumed.
//! - Load never returns a partially decoded collection.

use super::{CollectionStore, StoreError, StoreResult};
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Collection store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Format {
            path: self.path.clone(),
            source,
        }
    }

    fn write_all(&self, bytes: &[u8]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        fs::write(&self.path, bytes).map_err(|err| self.io_error(err))
    }
}

impl<T: Serialize + DeserializeOwned> CollectionStore<T> for JsonFileStore<T> {
    fn save(&self, items: &[T]) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = serde_json::to_vec_pretty(items)
            .map_err(|err| self.format_error(err))
            .and_then(|bytes| self.write_all(&bytes));

        match &result {
            Ok(()) => debug!(
                "event=store_save module=store status=ok path={} records={} duration_ms={}",
                self.path.display(),
                items.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=store_save module=store status=error path={} duration_ms={} error={}",
                self.path.display(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn load(&self) -> StoreResult<Vec<T>> {
        let started_at = Instant::now();
        if !self.path.exists() {
            info!(
                "event=store_load module=store status=ok path={} records=0 reason=missing_file",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path).map_err(|err| {
            error!(
                "event=store_load module=store status=error path={} error_code=read_failed error={}",
                self.path.display(),
                err
            );
            self.io_error(err)
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            info!(
                "event=store_load module=store status=ok path={} records=0 reason=empty_file",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|err| {
            error!(
                "event=store_load module=store status=error path={} error_code=decode_failed error={}",
                self.path.display(),
                err
            );
            self.format_error(err)
        })?;

        info!(
            "event=store_load module=store status=ok path={} records={} duration_ms={}",
            self.path.display(),
            items.len(),
            started_at.elapsed().as_millis()
        );
        Ok(items)
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn remove(&self) -> StoreResult<()> {
        if !self.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|err| self.io_error(err))
    }

    fn size_bytes(&self) -> StoreResult<u64> {
        if !self.exists() {
            return Ok(0);
        }
        fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|err| self.io_error(err))
    }
}
