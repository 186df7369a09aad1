// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Generic dump and load over every serializable SSE object.

use crate::store::{decode_mapping, encode_mapping};
use crate::structures::{EncryptedDatabase, Key, SearchResult, SseSerialize, Token};
use crate::{SecurityParameter, SseError};
use std::collections::BTreeMap;

/// The kinds of object that can be dumped and loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SseObjectKind {
    /// A master key.
    Key,
    /// A search token.
    Token,
    /// An in-memory encrypted database.
    EncryptedDatabase,
    /// A search result.
    SearchResult,
    /// A plain byte-string mapping, such as a store snapshot.
    Mapping,
}

/// Any serializable SSE object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseObject {
    /// A master key.
    Key(Key),
    /// A search token.
    Token(Token),
    /// An in-memory encrypted database.
    EncryptedDatabase(EncryptedDatabase),
    /// A search result.
    SearchResult(SearchResult),
    /// A plain byte-string mapping.
    Mapping(BTreeMap<Vec<u8>, Vec<u8>>),
}

impl SseObject {
    /// The kind of this object.
    pub fn kind(&self) -> SseObjectKind {
        match self {
            SseObject::Key(_) => SseObjectKind::Key,
            SseObject::Token(_) => SseObjectKind::Token,
            SseObject::EncryptedDatabase(_) => SseObjectKind::EncryptedDatabase,
            SseObject::SearchResult(_) => SseObjectKind::SearchResult,
            SseObject::Mapping(_) => SseObjectKind::Mapping,
        }
    }

    /// Serializes the object in the format of its kind.
    pub fn dump(&self) -> Result<Vec<u8>, SseError> {
        match self {
            SseObject::Key(key) => key.to_bytes(),
            SseObject::Token(token) => token.to_bytes(),
            SseObject::EncryptedDatabase(edb) => edb.to_bytes(),
            SseObject::SearchResult(result) => result.to_bytes(),
            SseObject::Mapping(mapping) => {
                encode_mapping(mapping.iter().map(|(k, v)| (k.clone(), v.clone())))
            }
        }
    }

    /// Deserializes an object of the given `kind` under security parameter `lambda`.
    pub fn load(
        bytes: &[u8],
        kind: SseObjectKind,
        lambda: SecurityParameter,
    ) -> Result<Self, SseError> {
        Ok(match kind {
            SseObjectKind::Key => SseObject::Key(Key::from_bytes(bytes, lambda)?),
            SseObjectKind::Token => SseObject::Token(Token::from_bytes(bytes, lambda)?),
            SseObjectKind::EncryptedDatabase => {
                SseObject::EncryptedDatabase(EncryptedDatabase::from_bytes(bytes, lambda)?)
            }
            SseObjectKind::SearchResult => {
                SseObject::SearchResult(SearchResult::from_bytes(bytes, lambda)?)
            }
            SseObjectKind::Mapping => SseObject::Mapping(decode_mapping(bytes)?),
        })
    }
}

impl From<Key> for SseObject {
    fn from(key: Key) -> Self {
        SseObject::Key(key)
    }
}

impl From<Token> for SseObject {
    fn from(token: Token) -> Self {
        SseObject::Token(token)
    }
}

impl From<EncryptedDatabase> for SseObject {
    fn from(edb: EncryptedDatabase) -> Self {
        SseObject::EncryptedDatabase(edb)
    }
}

impl From<SearchResult> for SseObject {
    fn from(result: SearchResult) -> Self {
        SseObject::SearchResult(result)
    }
}

impl From<BTreeMap<Vec<u8>, Vec<u8>>> for SseObject {
    fn from(mapping: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        SseObject::Mapping(mapping)
    }
}
