// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! In-memory stores.

use super::ByteStore;
use crate::SseError;
use std::cell::Cell;
use std::collections::BTreeMap;

/// A simple store that keeps its data in a `BTreeMap`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryStore(BTreeMap<Vec<u8>, Vec<u8>>);

impl InMemoryStore {
    /// Returns a reference to the underlying mapping.
    pub fn as_map(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.0
    }
}

impl From<BTreeMap<Vec<u8>, Vec<u8>>> for InMemoryStore {
    fn from(mapping: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self(mapping)
    }
}

impl From<InMemoryStore> for BTreeMap<Vec<u8>, Vec<u8>> {
    fn from(store: InMemoryStore) -> Self {
        store.0
    }
}

impl ByteStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        Ok(self.0.get(key).cloned())
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), SseError> {
        self.0.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        Ok(self.0.remove(key))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, SseError> {
        Ok(self.0.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, SseError> {
        Ok(self.0.len())
    }

    fn clear(&mut self) -> Result<(), SseError> {
        self.0.clear();
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SseError> {
        Ok(self
            .0
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// A store wrapper that counts lookups and writes.
#[derive(Debug, Default)]
pub struct CountLookupsStore<S> {
    inner: S,
    lookups: Cell<u64>,
    writes: u64,
}

impl<S> CountLookupsStore<S> {
    /// Wraps `inner` with zeroed counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lookups: Cell::new(0),
            writes: 0,
        }
    }

    /// Returns the total number of lookups made to the store.
    pub fn get_lookup_count(&self) -> u64 {
        self.lookups.get()
    }

    /// Returns the total number of writes made to the store.
    pub fn get_write_count(&self) -> u64 {
        self.writes
    }

    /// Zeroes both counters.
    pub fn reset_counts(&mut self) {
        self.lookups.set(0);
        self.writes = 0;
    }

    /// Returns the wrapped store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteStore> ByteStore for CountLookupsStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        log::debug!("Store lookup -- {} byte key", key.len());

        self.lookups.set(self.lookups.get() + 1);
        self.inner.get(key)
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), SseError> {
        log::debug!("Store write -- {} byte key", key.len());

        self.writes += 1;
        self.inner.insert(key, value)
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        self.writes += 1;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, SseError> {
        self.inner.keys()
    }

    fn len(&self) -> Result<usize, SseError> {
        self.inner.len()
    }
}
