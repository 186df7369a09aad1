// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Common test utilities, including a lifecycle suite shared by every persistent store.

use crate::store::{ByteStore, InMemoryStore, PersistentStore};
use crate::SseError;
use ciborium::Value;
use simplelog::{Config, WriteLogger};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// For use in manual testing and inspection.
pub(crate) fn init_logger() {
    INIT.call_once(|| {
        WriteLogger::init(log::LevelFilter::Info, Config::default(), std::io::stdout()).unwrap()
    })
}

fn sample_mapping() -> BTreeMap<Vec<u8>, Vec<u8>> {
    BTreeMap::from([
        (b"alpha".to_vec(), b"1".to_vec()),
        (b"beta".to_vec(), b"2".to_vec()),
        (Vec::new(), b"empty key".to_vec()),
        (b"empty value".to_vec(), Vec::new()),
    ])
}

fn fill<S: ByteStore>(store: &mut S) {
    for (key, value) in sample_mapping() {
        store.insert(key, value).unwrap();
    }
}

/// Creating over an occupied path fails; opening a missing path fails.
pub(crate) fn test_existence_checks<S: PersistentStore + Debug>() {
    init_logger();
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    assert!(matches!(S::open(&path, false), Err(SseError::NotFound(p)) if p == path));

    let store = S::create(&path).unwrap();
    drop(store);
    assert!(matches!(S::create(&path), Err(SseError::AlreadyExists(p)) if p == path));
    assert!(S::open(&path, false).is_ok());
}

/// Every mapping operation fails on a closed store.
pub(crate) fn test_operations_after_close_fail<S: PersistentStore + Debug>() {
    init_logger();
    let dir = tempdir().unwrap();
    let mut store = S::create(dir.path().join("store")).unwrap();
    fill(&mut store);
    assert!(!store.is_closed());

    store.close().unwrap();
    assert!(store.is_closed());
    assert!(matches!(store.get(b"alpha"), Err(SseError::ClosedStore)));
    assert!(matches!(store.contains_key(b"alpha"), Err(SseError::ClosedStore)));
    assert!(matches!(
        store.insert(b"k".to_vec(), b"v".to_vec()),
        Err(SseError::ClosedStore)
    ));
    assert!(matches!(store.remove(b"alpha"), Err(SseError::ClosedStore)));
    assert!(matches!(store.keys(), Err(SseError::ClosedStore)));
    assert!(matches!(store.len(), Err(SseError::ClosedStore)));
    assert!(matches!(store.to_bytes(), Err(SseError::ClosedStore)));
    assert!(matches!(store.sync(), Err(SseError::ClosedStore)));
}

/// `close` and `release` may both be called more than once.
pub(crate) fn test_close_and_release_are_idempotent<S: PersistentStore + Debug>() {
    init_logger();
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let mut store = S::create(&path).unwrap();
    fill(&mut store);

    store.close().unwrap();
    store.close().unwrap();
    assert!(path.exists());

    store.release().unwrap();
    assert!(!path.exists());
    store.release().unwrap();
}

/// Mutations survive closing and reopening, with or without an explicit `close`.
pub(crate) fn test_persistence_across_reopen<S: PersistentStore + Debug>() {
    init_logger();
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let mut store = S::create(&path).unwrap();
    fill(&mut store);
    store.close().unwrap();

    let mut store = S::open(&path, false).unwrap();
    assert_eq!(store.len().unwrap(), sample_mapping().len());
    assert_eq!(store.get(b"alpha").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"").unwrap(), Some(b"empty key".to_vec()));
    assert_eq!(store.get(b"empty value").unwrap(), Some(Vec::new()));
    assert_eq!(store.get(b"missing").unwrap(), None);

    store.remove(b"alpha").unwrap();
    store.insert(b"beta".to_vec(), b"two".to_vec()).unwrap();
    drop(store);

    let store = S::open(&path, false).unwrap();
    assert!(!store.contains_key(b"alpha").unwrap());
    assert_eq!(store.get(b"beta").unwrap(), Some(b"two".to_vec()));
    assert_eq!(
        store.keys().unwrap(),
        vec![Vec::new(), b"beta".to_vec(), b"empty value".to_vec()]
    );
}

/// Assigning a non-byte-string value fails and leaves the key as it was.
pub(crate) fn test_non_byte_values_are_rejected<S: PersistentStore + Debug>() {
    init_logger();
    let mut store = S::create_temp().unwrap();
    store.insert(b"k".to_vec(), b"v".to_vec()).unwrap();

    for value in [
        Value::Text("v2".into()),
        Value::Integer(7.into()),
        Value::Null,
        Value::Array(vec![Value::Bytes(b"v2".to_vec())]),
    ] {
        assert!(matches!(
            store.insert_value(b"k".to_vec(), value.clone()),
            Err(SseError::ValueType(_))
        ));
        assert!(matches!(
            store.insert_value(b"fresh".to_vec(), value),
            Err(SseError::ValueType(_))
        ));
    }
    assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert!(!store.contains_key(b"fresh").unwrap());

    store
        .insert_value(b"k".to_vec(), Value::Bytes(b"v2".to_vec()))
        .unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

/// Temporary stores live under the temp directory and are released when dropped.
pub(crate) fn test_temp_store_is_released_on_drop<S: PersistentStore + Debug>() {
    init_logger();
    let mut store = S::create_temp().unwrap();
    let path = store.path().to_path_buf();
    assert!(store.is_temp());
    assert!(path.starts_with(std::env::temp_dir()));

    fill(&mut store);
    store.sync().unwrap();
    assert!(path.exists());

    drop(store);
    assert!(!path.exists());

    let dir = tempdir().unwrap();
    let named = S::create(dir.path().join("named")).unwrap();
    assert!(!named.is_temp());
}

/// `clear` empties the store and the emptiness is durable.
pub(crate) fn test_clear<S: PersistentStore + Debug>() {
    init_logger();
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let mut store = S::create(&path).unwrap();
    fill(&mut store);
    store.sync().unwrap();

    store.clear().unwrap();
    assert!(store.is_empty().unwrap());
    store.close().unwrap();

    assert!(S::open(&path, false).unwrap().is_empty().unwrap());
}

/// Snapshots taken with `to_bytes` rebuild equal stores of any backend.
pub(crate) fn test_transfer_between_stores<S: PersistentStore + Debug>() {
    init_logger();
    let mut store = S::create_temp().unwrap();
    fill(&mut store);
    let bytes = store.to_bytes().unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("copy");
    let copy = S::from_bytes(&bytes, Some(path.as_path())).unwrap();
    assert!(copy.contents_eq(&store).unwrap());
    assert!(!copy.is_temp());
    drop(copy);
    assert!(S::open(&path, false).unwrap().contents_eq(&store).unwrap());

    let temp_copy = S::from_mapping(&sample_mapping(), None).unwrap();
    assert!(temp_copy.is_temp());
    assert!(temp_copy.contents_eq(&store).unwrap());

    let mut in_memory = InMemoryStore::default();
    in_memory.update_from_bytes(&bytes).unwrap();
    assert!(store.contents_eq(&in_memory).unwrap());

    in_memory.insert(b"extra".to_vec(), Vec::new()).unwrap();
    assert!(!store.contents_eq(&in_memory).unwrap());
}

macro_rules! create_lifecycle_test {
    ($function_name: ident, $store_type: ident) => {
        paste::paste! {
            #[test]
            fn [<$function_name _ $store_type:snake>]() {
                $function_name::<$store_type>();
            }
        }
    };
}

macro_rules! create_lifecycle_tests_for_store_type {
    ($store_type: ident) => {
        create_lifecycle_test!(test_existence_checks, $store_type);
        create_lifecycle_test!(test_operations_after_close_fail, $store_type);
        create_lifecycle_test!(test_close_and_release_are_idempotent, $store_type);
        create_lifecycle_test!(test_persistence_across_reopen, $store_type);
        create_lifecycle_test!(test_non_byte_values_are_rejected, $store_type);
        create_lifecycle_test!(test_temp_store_is_released_on_drop, $store_type);
        create_lifecycle_test!(test_clear, $store_type);
        create_lifecycle_test!(test_transfer_between_stores, $store_type);
    };
}

pub(crate) use create_lifecycle_test;
pub(crate) use create_lifecycle_tests_for_store_type;
