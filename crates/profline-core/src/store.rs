//! Durable, lock-guarded accumulation buffer between processor and sender
//!
//! The store is a single JSON array of record objects on disk. Every
//! operation runs as one critical section under the store's mutex:
//! read the file, modify, write it back via tmp file + atomic rename.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::record::{Batch, Record};

/// Failure touching the store file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store IO at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("corrupt store at {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Ordered sequence of records persisted at `path`.
///
/// Shared by reference between workers; the mutex serialises every
/// read-modify-write so an append can never land between a drain's read
/// and its clear.
pub struct SharedStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SharedStore {
    /// (Re)initialise the store at `path` to an empty sequence.
    ///
    /// Existing content is overwritten.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let store = Self::unchecked(path);
        store.write(&[])?;
        log::debug!("store initialised at {}", path.display());
        Ok(store)
    }

    /// Attach to an existing store without resetting it
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let store = Self::unchecked(path);
        store.read()?;
        Ok(store)
    }

    fn unchecked(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Returns the store length after the append.
    pub fn append(&self, record: Record) -> Result<usize, StoreError> {
        let _guard = self.guard();
        let mut records = self.read()?;
        records.push(record);
        self.write(&records)?;
        Ok(records.len())
    }

    /// Take everything currently stored and leave the store empty.
    ///
    /// An empty store is left untouched and yields an empty batch.
    pub fn drain_and_clear(&self) -> Result<Batch, StoreError> {
        let _guard = self.guard();
        let records = self.read()?;
        if !records.is_empty() {
            self.write(&[])?;
        }
        Ok(records)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Result<Batch, StoreError> {
        let _guard = self.guard();
        self.read()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.snapshot().map(|r| r.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    // The guarded data is `()` and writes are atomic renames, so a panic
    // while holding the lock cannot leave a half-written file behind.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Result<Batch, StoreError> {
        let bytes = fs::read(&self.path).map_err(|source| self.io_err(source))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, records: &[Record]) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        let file = File::create(&tmp).map_err(|source| self.io_err(source))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer(&mut w, records).map_err(|e| self.io_err(e.into()))?;
        w.flush().map_err(|source| self.io_err(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_err(source))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
