// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A store that holds its whole mapping in memory and saves it as a single blob.

use super::{decode_mapping, encode_mapping, make_temp_path, ByteStore, PersistentStore};
use crate::SseError;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A durable store that keeps the entire mapping in memory.
///
/// Opening an existing store loads the whole blob; every [`sync`](PersistentStore::sync)
/// truncates the backing file and rewrites it from scratch (last writer wins).
/// A single instance is not meant to be mutated from several threads at once.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    /// `None` once closed.
    data: Option<BTreeMap<Vec<u8>, Vec<u8>>>,
    file: Option<File>,
    is_temp: bool,
}

impl SnapshotStore {
    fn open_at(path: PathBuf, create: bool, is_temp: bool) -> Result<Self, SseError> {
        if create {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => SseError::AlreadyExists(path.clone()),
                    _ => SseError::Io(e),
                })?;
            log::info!("SnapshotStore::create({:?})", path);

            let mut store = Self {
                path,
                data: Some(BTreeMap::new()),
                file: Some(file),
                is_temp,
            };
            // The file always holds a decodable blob, even before the first explicit sync.
            store.sync()?;
            Ok(store)
        } else {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => SseError::NotFound(path.clone()),
                    _ => SseError::Io(e),
                })?;
            log::info!("SnapshotStore::open({:?})", path);

            let mut blob = Vec::new();
            file.read_to_end(&mut blob)?;
            let data = decode_mapping(&blob)?;

            Ok(Self {
                path,
                data: Some(data),
                file: Some(file),
                is_temp,
            })
        }
    }

    fn data(&self) -> Result<&BTreeMap<Vec<u8>, Vec<u8>>, SseError> {
        self.data.as_ref().ok_or(SseError::ClosedStore)
    }

    fn data_mut(&mut self) -> Result<&mut BTreeMap<Vec<u8>, Vec<u8>>, SseError> {
        self.data.as_mut().ok_or(SseError::ClosedStore)
    }
}

impl PersistentStore for SnapshotStore {
    fn open(path: impl AsRef<Path>, create: bool) -> Result<Self, SseError> {
        Self::open_at(path.as_ref().to_path_buf(), create, false)
    }

    fn create_temp() -> Result<Self, SseError> {
        Self::open_at(make_temp_path()?, true, true)
    }

    fn sync(&mut self) -> Result<(), SseError> {
        let (Some(data), Some(file)) = (&self.data, &mut self.file) else {
            return Err(SseError::ClosedStore);
        };
        let blob = encode_mapping(data.iter().map(|(k, v)| (k.clone(), v.clone())))?;

        log::debug!("SnapshotStore::sync -- {} entries", data.len());
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&blob)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SseError> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.sync();
        self.file = None;
        self.data = None;
        log::debug!("SnapshotStore::close({:?})", self.path);
        result
    }

    fn release(&mut self) -> Result<(), SseError> {
        self.close()?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("SnapshotStore::release({:?})", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    fn is_temp(&self) -> bool {
        self.is_temp
    }
}

impl ByteStore for SnapshotStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        Ok(self.data()?.get(key).cloned())
    }

    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), SseError> {
        self.data_mut()?.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        Ok(self.data_mut()?.remove(key))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, SseError> {
        Ok(self.data()?.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, SseError> {
        Ok(self.data()?.len())
    }

    fn contains_key(&self, key: &[u8]) -> Result<bool, SseError> {
        Ok(self.data()?.contains_key(key))
    }

    fn clear(&mut self) -> Result<(), SseError> {
        self.data_mut()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{encode_value, InMemoryStore};
    use crate::test_utils::*;
    use ciborium::Value;
    use tempfile::tempdir;

    #[test]
    fn opening_a_corrupt_blob_fails() {
        init_logger();
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt");
        fs::write(&path, b"\xff\x00not cbor").unwrap();

        assert!(matches!(
            SnapshotStore::open(&path, false),
            Err(SseError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn opening_a_blob_with_non_byte_values_fails() {
        init_logger();
        let dir = tempdir().unwrap();
        let path = dir.path().join("typed");
        let blob = encode_value(&Value::Map(vec![(
            Value::Bytes(b"k".to_vec()),
            Value::Bool(true),
        )]))
        .unwrap();
        fs::write(&path, blob).unwrap();

        assert!(matches!(
            SnapshotStore::open(&path, false),
            Err(SseError::ValueType("bool"))
        ));
    }

    #[test]
    fn sync_rewrites_the_whole_blob() {
        init_logger();
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot");

        let mut store = SnapshotStore::create(&path).unwrap();
        store.insert(b"long key".to_vec(), vec![0u8; 1024]).unwrap();
        store.sync().unwrap();
        let large = fs::metadata(&path).unwrap().len();

        store.remove(b"long key").unwrap();
        store.insert(b"k".to_vec(), b"v".to_vec()).unwrap();
        store.sync().unwrap();
        assert!(fs::metadata(&path).unwrap().len() < large);

        let mut expected = InMemoryStore::default();
        expected.insert(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(
            decode_mapping(&fs::read(&path).unwrap()).unwrap(),
            BTreeMap::from(expected)
        );
    }

    #[test]
    fn a_freshly_created_file_is_immediately_openable() {
        init_logger();
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh");

        let store = SnapshotStore::create(&path).unwrap();
        // Reads the file while `store` is still open.
        assert!(decode_mapping(&fs::read(&path).unwrap()).unwrap().is_empty());
        drop(store);
    }
}
