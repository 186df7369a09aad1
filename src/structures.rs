// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Keys, tokens, encrypted databases and search results, with their binary formats.

use crate::store::{
    decode_mapping, decode_value, encode_value, ByteStore, InMemoryStore, PersistentStore,
};
use crate::utils::{check_length, sort_by_address};
use crate::{SecurityParameter, SseError};
use ciborium::Value;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Scheme tag prefixed to every serialized [`EncryptedDatabase`] of the `PiBas` construction.
pub const PI_BAS_HEADER: &[u8] = b"PiBas\x01";

/// Binary serialization shared by every SSE data type.
pub trait SseSerialize
where
    Self: Sized,
{
    /// Serializes `self`.
    fn to_bytes(&self) -> Result<Vec<u8>, SseError>;

    /// Deserializes a value produced by [`SseSerialize::to_bytes`] under security parameter `lambda`.
    fn from_bytes(bytes: &[u8], lambda: SecurityParameter) -> Result<Self, SseError>;
}

/// The client's master key: λ random bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key {
    k: Vec<u8>,
}

impl Key {
    pub(crate) fn new(k: Vec<u8>) -> Self {
        Self { k }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.k
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.k.ct_eq(&other.k).into()
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key([REDACTED; {}])", self.k.len())
    }
}

impl SseSerialize for Key {
    fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        Ok(self.k.clone())
    }

    fn from_bytes(bytes: &[u8], lambda: SecurityParameter) -> Result<Self, SseError> {
        check_length(lambda, bytes)?;
        Ok(Self::new(bytes.to_vec()))
    }
}

/// The search trapdoor for one keyword: `K1` derives addresses and `K2` decrypts identifiers.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Token {
    k1: Vec<u8>,
    k2: Vec<u8>,
}

impl Token {
    pub(crate) fn new(k1: Vec<u8>, k2: Vec<u8>) -> Self {
        Self { k1, k2 }
    }

    /// The address-derivation sub-key.
    pub fn k1(&self) -> &[u8] {
        &self.k1
    }

    /// The identifier-decryption sub-key.
    pub fn k2(&self) -> &[u8] {
        &self.k2
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        (self.k1.ct_eq(&other.k1) & self.k2.ct_eq(&other.k2)).into()
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token([REDACTED; {}], [REDACTED; {}])",
            self.k1.len(),
            self.k2.len()
        )
    }
}

impl SseSerialize for Token {
    fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        let mut bytes = Vec::with_capacity(self.k1.len() + self.k2.len());
        bytes.extend_from_slice(&self.k1);
        bytes.extend_from_slice(&self.k2);
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8], lambda: SecurityParameter) -> Result<Self, SseError> {
        check_length(2 * lambda, bytes)?;
        let (k1, k2) = bytes.split_at(lambda);
        Ok(Self::new(k1.to_vec(), k2.to_vec()))
    }
}

/// The encrypted index `D`: a mapping from PRF-derived addresses to identifier ciphertexts.
///
/// ## Address collisions
///
/// If two distinct (keyword, position) pairs derive the same address, the later entry silently
/// overwrites the earlier one, and searches for the earlier keyword come back truncated.
/// With λ-byte addresses this is negligible for any sensible λ, so it is not treated as a runtime
/// condition; [`PiBas::edb_setup`](crate::PiBas::edb_setup) only logs a warning when it happens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedDatabase<S: ByteStore = InMemoryStore> {
    store: S,
}

impl<S: ByteStore> EncryptedDatabase<S> {
    /// Wraps an existing store holding an encrypted index.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Builds a database in `store` from `(address, ciphertext)` pairs.
    ///
    /// Pairs are inserted in ascending address order, so the resulting mapping does not depend
    /// on the order in which they were produced.
    pub(crate) fn build_from_pairs(
        mut pairs: Vec<(Vec<u8>, Vec<u8>)>,
        mut store: S,
    ) -> Result<Self, SseError> {
        let collisions = sort_by_address(&mut pairs);
        if collisions > 0 {
            log::warn!(
                "EncryptedDatabase -- {} address collisions; earlier entries were overwritten",
                collisions
            );
        }
        for (address, ciphertext) in pairs {
            store.insert(address, ciphertext)?;
        }
        Ok(Self { store })
    }

    /// Returns the ciphertext stored at `address`.
    pub fn lookup(&self, address: &[u8]) -> Result<Option<Vec<u8>>, SseError> {
        self.store.get(address)
    }

    /// Returns the number of stored ciphertexts.
    pub fn len(&self) -> Result<usize, SseError> {
        self.store.len()
    }

    /// Returns `true` if the database holds no ciphertexts.
    pub fn is_empty(&self) -> Result<bool, SseError> {
        self.store.is_empty()
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The backing store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Detaches the backing store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Copies every entry into `target`, syncs it, and returns a database backed by it.
    pub fn persist_into<T: PersistentStore>(
        &self,
        mut target: T,
    ) -> Result<EncryptedDatabase<T>, SseError> {
        for (address, ciphertext) in self.store.entries()? {
            target.insert(address, ciphertext)?;
        }
        target.sync()?;
        Ok(EncryptedDatabase::new(target))
    }

    /// Serializes the database as `PI_BAS_HEADER || mapping`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        let mut bytes = PI_BAS_HEADER.to_vec();
        bytes.extend(self.store.to_bytes()?);
        Ok(bytes)
    }

    /// Deserializes a database produced by [`EncryptedDatabase::to_bytes`] into `target`.
    pub fn from_bytes_into(bytes: &[u8], mut target: S) -> Result<Self, SseError> {
        target.update_from_bytes(strip_header(bytes)?)?;
        Ok(Self::new(target))
    }
}

fn strip_header(bytes: &[u8]) -> Result<&[u8], SseError> {
    bytes
        .strip_prefix(PI_BAS_HEADER)
        .ok_or(SseError::InvalidHeader)
}

impl SseSerialize for EncryptedDatabase {
    fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        EncryptedDatabase::to_bytes(self)
    }

    fn from_bytes(bytes: &[u8], _lambda: SecurityParameter) -> Result<Self, SseError> {
        let mapping = decode_mapping(strip_header(bytes)?)?;
        Ok(Self::new(InMemoryStore::from(mapping)))
    }
}

/// The identifiers recovered by a search, in positional order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    identifiers: Vec<Vec<u8>>,
}

impl SearchResult {
    /// Wraps a list of identifiers.
    pub fn new(identifiers: Vec<Vec<u8>>) -> Self {
        Self { identifiers }
    }

    /// The recovered identifiers.
    pub fn identifiers(&self) -> &[Vec<u8>] {
        &self.identifiers
    }

    /// Consumes the result, returning the identifiers.
    pub fn into_identifiers(self) -> Vec<Vec<u8>> {
        self.identifiers
    }

    /// The number of recovered identifiers.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl SseSerialize for SearchResult {
    fn to_bytes(&self) -> Result<Vec<u8>, SseError> {
        encode_value(&Value::Array(
            self.identifiers
                .iter()
                .map(|identifier| Value::Bytes(identifier.clone()))
                .collect(),
        ))
    }

    fn from_bytes(bytes: &[u8], _lambda: SecurityParameter) -> Result<Self, SseError> {
        let Value::Array(items) = decode_value(bytes)? else {
            return Err(SseError::NotASequence);
        };
        let identifiers = items
            .into_iter()
            .map(|item| match item {
                Value::Bytes(identifier) => Ok(identifier),
                _ => Err(SseError::MalformedEncoding(
                    "search result item is not a byte string".into(),
                )),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self::new(identifiers))
    }
}
