// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Byte-string key-value stores backing the encrypted index.
//!
//! [`ByteStore`] models the mapping operations the construction needs, and is implemented by the
//! in-memory [`InMemoryStore`] as well as by the two durable backends:
//!
//! - [`SnapshotStore`] holds the whole mapping in memory and saves it as one blob on every sync.
//! - [`WriteBackStore`] keeps the mapping in an embedded on-disk engine behind an in-memory
//!   write-back layer. The engine tolerates only one live handle per path, so opens of the same
//!   path are serialized through a [`LockRegistry`].
//!
//! Durable backends additionally implement [`PersistentStore`], which carries the lifecycle:
//! `create`/`open` → reads, writes and `sync` → `close` → `release`.

use crate::SseError;
use ciborium::Value;
use duplicate::duplicate_item;
use std::collections::BTreeMap;
use std::path::Path;

mod lock_registry;
mod memory;
mod snapshot;
mod temp;
mod write_back;

pub use lock_registry::{LockRegistry, PathLease};
pub use memory::{CountLookupsStore, InMemoryStore};
pub use snapshot::SnapshotStore;
pub use temp::{make_temp_path, TEMP_PREFIX};
pub use write_back::{WriteBackStore, REAL_DB_FILENAME};

/// A mapping from byte-string keys to byte-string values.
pub trait ByteStore {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), SseError>;

    /// Removes `key`, returning its previous value.
    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError>;

    /// Returns all keys in ascending order.
    fn keys(&self) -> Result<Vec<Vec<u8>>, SseError>;

    /// Returns the number of entries.
    fn len(&self) -> Result<usize, SseError>;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> Result<bool, SseError> {
        Ok(self.len()? == 0)
    }

    /// Returns `true` if `key` is present.
    fn contains_key(&self, key: &[u8]) -> Result<bool, SseError> {
        Ok(self.get(key)?.is_some())
    }

    /// Removes every entry.
    fn clear(&mut self) -> Result<(), SseError> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Stores a dynamically-typed `value` under `key`.
    ///
    /// Fails with `ValueType`, leaving the store untouched, unless `value` is a byte string.
    fn insert_value(&mut self, key: Vec<u8>, value: Value) -> Result<(), SseError> {
        let value = expect_bytes(value)?;
        self.insert(key, value)
    }

    /// Returns all entries in ascending key order.
    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SseError> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Serializes the whole mapping.
    fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        encode_mapping(self.entries()?)
    }

    /// Inserts every entry of a blob produced by [`ByteStore::to_bytes`].
    ///
    /// The blob is fully decoded and type-checked before the first insertion.
    fn update_from_bytes(&mut self, bytes: &[u8]) -> Result<(), SseError> {
        for (key, value) in decode_mapping(bytes)? {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Returns `true` if `self` and `other` hold exactly the same entries.
    fn contents_eq<T: ByteStore>(&self, other: &T) -> Result<bool, SseError>
    where
        Self: Sized,
    {
        Ok(self.entries()? == other.entries()?)
    }
}

/// A [`ByteStore`] that is durable across process restarts.
pub trait PersistentStore: ByteStore
where
    Self: Sized,
{
    /// Opens the store at `path`.
    ///
    /// With `create`, `path` must not exist and the store starts empty;
    /// otherwise `path` must exist and the store is populated from it.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when creating over an existing path, `NotFound` when opening a missing one.
    fn open(path: impl AsRef<Path>, create: bool) -> Result<Self, SseError>;

    /// Creates a new, empty store at `path`.
    fn create(path: impl AsRef<Path>) -> Result<Self, SseError> {
        Self::open(path, true)
    }

    /// Creates a new, empty, process-owned store at a fresh temporary path.
    ///
    /// The store is closed and released when it is dropped.
    fn create_temp() -> Result<Self, SseError>;

    /// Creates a store pre-populated with `mapping` and synced to disk.
    /// Without a `path`, the store is temporary.
    fn from_mapping(
        mapping: &BTreeMap<Vec<u8>, Vec<u8>>,
        path: Option<&Path>,
    ) -> Result<Self, SseError> {
        let mut store = match path {
            Some(path) => Self::create(path)?,
            None => Self::create_temp()?,
        };
        for (key, value) in mapping {
            store.insert(key.clone(), value.clone())?;
        }
        store.sync()?;
        Ok(store)
    }

    /// Creates a store from a blob produced by [`ByteStore::to_bytes`].
    /// Without a `path`, the store is temporary.
    fn from_bytes(bytes: &[u8], path: Option<&Path>) -> Result<Self, SseError> {
        Self::from_mapping(&decode_mapping(bytes)?, path)
    }

    /// Makes every mutation so far durable.
    fn sync(&mut self) -> Result<(), SseError>;

    /// Syncs and closes the store. Closing a closed store is a no-op.
    fn close(&mut self) -> Result<(), SseError>;

    /// Closes the store and deletes its backing path. Releasing twice is a no-op.
    fn release(&mut self) -> Result<(), SseError>;

    /// The backing path.
    fn path(&self) -> &Path;

    /// Returns `true` once the store has been closed.
    fn is_closed(&self) -> bool;

    /// Returns `true` for process-owned temporary stores.
    fn is_temp(&self) -> bool;
}

// Stores close on drop; temporary stores are also released.
#[duplicate_item(
    store_type;
    [SnapshotStore];
    [WriteBackStore];
)]
impl Drop for store_type {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close store at {:?} on drop: {}", self.path(), e);
        }
        if self.is_temp() {
            if let Err(e) = self.release() {
                log::warn!(
                    "Failed to release temporary store at {:?}: {}",
                    self.path(),
                    e
                );
            }
        }
    }
}

/// Returns a short name for the type of `value`, for error messages.
fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}

/// Unwraps a byte-string value, failing with `ValueType` otherwise.
pub(crate) fn expect_bytes(value: Value) -> Result<Vec<u8>, SseError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        other => Err(SseError::ValueType(value_type_name(&other))),
    }
}

/// Encodes a CBOR value.
pub(crate) fn encode_value(value: &Value) -> Result<Vec<u8>, SseError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SseError::MalformedEncoding(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a single CBOR value.
pub(crate) fn decode_value(bytes: &[u8]) -> Result<Value, SseError> {
    ciborium::from_reader(bytes).map_err(|e| SseError::MalformedEncoding(e.to_string()))
}

/// Encodes entries as a CBOR map from byte strings to byte strings.
pub(crate) fn encode_mapping<I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>>(
    entries: I,
) -> Result<Vec<u8>, SseError> {
    let map = entries
        .into_iter()
        .map(|(key, value)| (Value::Bytes(key), Value::Bytes(value)))
        .collect();
    encode_value(&Value::Map(map))
}

/// Decodes a blob produced by [`encode_mapping`].
///
/// Fails with `MalformedEncoding` if the blob is not a map with byte-string keys,
/// and with `ValueType` if any value is not a byte string.
pub(crate) fn decode_mapping(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, SseError> {
    let Value::Map(entries) = decode_value(bytes)? else {
        return Err(SseError::MalformedEncoding(
            "the decoded data is not a mapping".into(),
        ));
    };

    let mut mapping = BTreeMap::new();
    for (key, value) in entries {
        let Value::Bytes(key) = key else {
            return Err(SseError::MalformedEncoding(format!(
                "mapping key of type {}",
                value_type_name(&key)
            )));
        };
        mapping.insert(key, expect_bytes(value)?);
    }
    Ok(mapping)
}
