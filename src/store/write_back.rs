// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A store backed by an embedded on-disk engine with an in-memory write-back layer.

use super::{make_temp_path, ByteStore, LockRegistry, PathLease, PersistentStore};
use crate::SseError;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the engine's file inside the store directory.
pub const REAL_DB_FILENAME: &str = "db";

/// Table: entries
/// Key: store key bytes
/// Value: store value bytes
const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

fn engine_error<E: Into<redb::Error>>(e: E) -> SseError {
    SseError::Engine(e.into().to_string())
}

/// A store directory made by a `create` in progress. Removed on drop unless kept.
struct CreatedDirectory<'a> {
    path: &'a Path,
    keep: bool,
}

impl<'a> CreatedDirectory<'a> {
    fn create(path: &'a Path) -> Result<Self, SseError> {
        fs::create_dir_all(path)?;
        Ok(Self { path, keep: false })
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for CreatedDirectory<'_> {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match fs::remove_dir_all(self.path) {
            Ok(()) => log::debug!("Removed partially created store at {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove partially created store at {:?}: {}",
                self.path,
                e
            ),
        }
    }
}

/// A durable store kept in an embedded engine, with writes buffered in memory until
/// [`sync`](PersistentStore::sync).
///
/// The store lives in a directory at its logical path, holding the engine file
/// [`REAL_DB_FILENAME`]. The engine does not support two live handles to one file, so the
/// store holds an exclusive [`PathLease`] from a [`LockRegistry`] for as long as it is open;
/// a second open of the same path blocks until the first store is closed.
pub struct WriteBackStore {
    path: PathBuf,
    /// `None` once closed.
    engine: Option<Database>,
    /// Buffered writes; `None` marks a removal.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    lease: Option<PathLease>,
    is_temp: bool,
}

impl fmt::Debug for WriteBackStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBackStore")
            .field("path", &self.path)
            .field("closed", &self.engine.is_none())
            .field("pending", &self.pending.len())
            .field("is_temp", &self.is_temp)
            .finish()
    }
}

impl WriteBackStore {
    /// Opens the store at `path`, serializing against other opens of `path` through `registry`.
    ///
    /// See [`PersistentStore::open`].
    pub fn open_with_registry(
        path: impl AsRef<Path>,
        create: bool,
        registry: &LockRegistry,
    ) -> Result<Self, SseError> {
        Self::open_at(path.as_ref().to_path_buf(), create, false, registry)
    }

    fn open_at(
        path: PathBuf,
        create: bool,
        is_temp: bool,
        registry: &LockRegistry,
    ) -> Result<Self, SseError> {
        // Existence is checked under the lease, so it cannot change until this open finishes.
        // Dropping `lease` on any early return below releases the lock.
        let lease = registry.acquire(&path)?;
        if create && path.exists() {
            return Err(SseError::AlreadyExists(path));
        }
        if !create && !path.exists() {
            return Err(SseError::NotFound(path));
        }

        let engine = {
            let created = if create {
                Some(CreatedDirectory::create(&path)?)
            } else {
                None
            };
            let engine = Self::open_engine(&path.join(REAL_DB_FILENAME))?;
            if let Some(created) = created {
                created.keep();
            }
            engine
        };

        log::info!(
            "WriteBackStore::{}({:?})",
            if create { "create" } else { "open" },
            path
        );

        Ok(Self {
            path,
            engine: Some(engine),
            pending: BTreeMap::new(),
            lease: Some(lease),
            is_temp,
        })
    }

    fn open_engine(file: &Path) -> Result<Database, SseError> {
        let engine = Database::create(file).map_err(engine_error)?;

        let txn = engine.begin_write().map_err(engine_error)?;
        {
            let _ = txn.open_table(ENTRIES).map_err(engine_error)?;
        }
        txn.commit().map_err(engine_error)?;

        Ok(engine)
    }

    /// Syncs and drops the engine handle, keeping the lease.
    fn shut_down(&mut self) -> Result<(), SseError> {
        if self.engine.is_none() {
            return Ok(());
        }
        let result = self.sync();
        self.engine = None;
        self.pending.clear();
        log::debug!("WriteBackStore::close({:?})", self.path);
        result
    }

    fn engine(&self) -> Result<&Database, SseError> {
        self.engine.as_ref().ok_or(SseError::ClosedStore)
    }

    fn engine_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        let txn = self.engine()?.begin_read().map_err(engine_error)?;
        let table = txn.open_table(ENTRIES).map_err(engine_error)?;
        let value = table.get(key).map_err(engine_error)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn engine_keys(&self) -> Result<BTreeSet<Vec<u8>>, SseError> {
        let txn = self.engine()?.begin_read().map_err(engine_error)?;
        let table = txn.open_table(ENTRIES).map_err(engine_error)?;

        let mut keys = BTreeSet::new();
        for entry in table.iter().map_err(engine_error)? {
            let (key, _) = entry.map_err(engine_error)?;
            keys.insert(key.value().to_vec());
        }
        Ok(keys)
    }

    /// Returns the number of buffered writes not yet flushed to the engine.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }
}

impl PersistentStore for WriteBackStore {
    fn open(path: impl AsRef<Path>, create: bool) -> Result<Self, SseError> {
        Self::open_with_registry(path, create, LockRegistry::global())
    }

    fn create_temp() -> Result<Self, SseError> {
        Self::open_at(make_temp_path()?, true, true, LockRegistry::global())
    }

    fn sync(&mut self) -> Result<(), SseError> {
        let engine = self.engine()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        log::debug!("WriteBackStore::sync -- {} writes", self.pending.len());

        let txn = engine.begin_write().map_err(engine_error)?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(engine_error)?;
            for (key, value) in &self.pending {
                match value {
                    Some(value) => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(engine_error)?;
                    }
                    None => {
                        table.remove(key.as_slice()).map_err(engine_error)?;
                    }
                }
            }
        }
        txn.commit().map_err(engine_error)?;

        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), SseError> {
        let result = self.shut_down();
        // The engine handle is gone, so the path may be reopened.
        self.lease = None;
        result
    }

    fn release(&mut self) -> Result<(), SseError> {
        // The lease outlives the removal, so an open blocked on this path observes the deletion.
        let result = self.shut_down().and_then(|()| match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                log::info!("WriteBackStore::release({:?})", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        });
        self.lease = None;
        result
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    fn is_temp(&self) -> bool {
        self.is_temp
    }
}

impl ByteStore for WriteBackStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        self.engine()?;
        match self.pending.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.engine_get(key),
        }
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), SseError> {
        self.engine()?;
        self.pending.insert(key, Some(value));
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        let previous = self.get(key)?;
        if previous.is_some() {
            self.pending.insert(key.to_vec(), None);
        }
        Ok(previous)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, SseError> {
        let mut keys = self.engine_keys()?;
        for (key, value) in &self.pending {
            match value {
                Some(_) => keys.insert(key.clone()),
                None => keys.remove(key),
            };
        }
        Ok(keys.into_iter().collect())
    }

    fn len(&self) -> Result<usize, SseError> {
        if self.pending.is_empty() {
            let txn = self.engine()?.begin_read().map_err(engine_error)?;
            let table = txn.open_table(ENTRIES).map_err(engine_error)?;
            return Ok(usize::try_from(table.len().map_err(engine_error)?)?);
        }
        Ok(self.keys()?.len())
    }
}
