// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An implementation of Searchable Symmetric Encryption (SSE) over encrypted inverted indexes.
//!
//! A client encrypts an inverted index (keyword to list of document identifiers) with
//! [`PiBas::edb_setup`]. The resulting [`EncryptedDatabase`] can be handed to an untrusted
//! server, which, given a keyword-specific [`Token`], returns exactly the matching identifiers
//! via [`PiBas::search`] without learning the keyword or the plaintext identifiers at rest.
//!
//! The encrypted database is backed by any [`ByteStore`]: an in-memory map, or one of the two
//! durable backends in [`store`] ([`SnapshotStore`] and [`WriteBackStore`]).
//!
//! ## Leakage
//!
//! Searching for a keyword with `n` matching identifiers performs exactly `n + 1` lookups,
//! at addresses that are identical across repeated searches for the same keyword.
//! This access pattern and search pattern leakage is inherent to the scheme.

#![warn(clippy::cargo, clippy::doc_markdown, missing_docs, rustdoc::all)]

use rand::{CryptoRng, RngCore};
use std::num::TryFromIntError;
use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod object;
pub mod pi_bas;
pub mod primitives;
pub mod store;
pub mod structures;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::config::{
    SchemeConfig, DEFAULT_SECURITY_PARAMETER, MAXIMUM_SECURITY_PARAMETER,
    MINIMUM_SECURITY_PARAMETER,
};
pub use crate::object::{SseObject, SseObjectKind};
pub use crate::pi_bas::PiBas;
pub use crate::primitives::{HmacSha256Prf, Prf, SymmetricCipher, XChaCha20Poly1305Cipher};
pub use crate::store::{
    ByteStore, CountLookupsStore, InMemoryStore, LockRegistry, PersistentStore, SnapshotStore,
    WriteBackStore,
};
pub use crate::structures::{
    EncryptedDatabase, Key, SearchResult, SseSerialize, Token, PI_BAS_HEADER,
};

/// The numeric type used for the security parameter λ, measured in bytes.
pub type SecurityParameter = usize;

/// The numeric type used for positions within a keyword's identifier list.
pub type Position = u64;

/// A plaintext inverted index mapping keywords to ordered lists of document identifiers.
pub type PlaintextDatabase = std::collections::BTreeMap<Vec<u8>, Vec<Vec<u8>>>;

#[derive(Error, Debug)]
/// Errors produced by the SSE construction and the persistent stores.
pub enum SseError {
    /// A key, token or ciphertext had the wrong length for the configured security parameter.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// The length required by the configuration.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },

    /// A serialized encrypted database did not start with the expected scheme tag.
    #[error("Parse header error")]
    InvalidHeader,

    /// A serialized blob could not be decoded.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A serialized search result did not decode to a sequence.
    #[error("The decoded data is not a sequence")]
    NotASequence,

    /// A store was created at a path that is already occupied.
    #[error("The path {0:?} already exists")]
    AlreadyExists(PathBuf),

    /// A store was opened at a path that does not exist.
    #[error("The store corresponding to the path {0:?} does not exist")]
    NotFound(PathBuf),

    /// An operation was attempted on a closed store.
    #[error("Invalid operation on closed store")]
    ClosedStore,

    /// A value that is not a byte string was assigned to a store.
    #[error("The content should be a byte string, got {0}")]
    ValueType(&'static str),

    /// The underlying file system failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedded storage engine of the write-back backend failed.
    #[error("Storage engine error: {0}")]
    Engine(String),

    /// The scheme or a primitive was configured with invalid parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfigurationError(String),

    /// A cryptographic primitive failed.
    #[error("Cryptographic primitive error: {0}")]
    CryptoError(String),

    /// A ciphertext failed authentication.
    #[error("Decryption failed")]
    DecryptionError,

    /// Arithmetic or numerical casting error.
    #[error("Arithmetic or numerical casting error")]
    IntegerConversionError(#[from] TryFromIntError),
}

/// A static searchable symmetric encryption scheme over an inverted index.
pub trait InvertedIndexSse {
    /// The client's master secret.
    type Key;
    /// The per-keyword trapdoor handed to the server.
    type Token;
    /// The identifiers recovered by a search.
    type SearchResult;

    /// Samples a fresh master key.
    fn key_gen<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Self::Key;

    /// Encrypts `database` under `key`.
    fn edb_setup<R: RngCore + CryptoRng>(
        &self,
        key: &Self::Key,
        database: &PlaintextDatabase,
        rng: &mut R,
    ) -> Result<EncryptedDatabase, SseError>;

    /// Derives the search token for `keyword`. Deterministic in `(key, keyword)`.
    fn token_gen(&self, key: &Self::Key, keyword: &[u8]) -> Result<Self::Token, SseError>;

    /// Recovers the identifiers matching `token` from `edb`, in positional order.
    fn search<S: ByteStore>(
        &self,
        edb: &EncryptedDatabase<S>,
        token: &Self::Token,
    ) -> Result<Self::SearchResult, SseError>;
}
