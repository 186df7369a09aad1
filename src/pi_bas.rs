// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The basic static SSE construction `PiBas`.
//!
//! Each keyword `w` yields two sub-keys, `K1 = PRF(K, 0x01 || w)` and `K2 = PRF(K, 0x02 || w)`.
//! The `c`-th identifier of `w` is stored at address `PRF(K1, c)` encrypted under `K2`.
//! Searching walks `c = 0, 1, 2, ...` until the first address that is not present.

use crate::config::SchemeConfig;
use crate::primitives::{HmacSha256Prf, Prf, SymmetricCipher, XChaCha20Poly1305Cipher};
use crate::store::{ByteStore, InMemoryStore};
use crate::structures::{EncryptedDatabase, Key, SearchResult, Token};
use crate::utils::{check_length, encode_position};
use crate::{InvertedIndexSse, PlaintextDatabase, Position, SecurityParameter, SseError};
use rand::{CryptoRng, RngCore};

/// Domain separation prefix of the address-derivation sub-key `K1`.
const ADDRESS_KEY_PREFIX: u8 = 0x01;
/// Domain separation prefix of the identifier-encryption sub-key `K2`.
const ENCRYPTION_KEY_PREFIX: u8 = 0x02;

/// The `PiBas` construction, parameterized by its PRF and cipher.
#[derive(Clone, Debug)]
pub struct PiBas<P: Prf = HmacSha256Prf, C: SymmetricCipher = XChaCha20Poly1305Cipher> {
    config: SchemeConfig<P, C>,
}

impl Default for PiBas {
    fn default() -> Self {
        Self::new(SchemeConfig::default())
    }
}

impl<P: Prf, C: SymmetricCipher> PiBas<P, C> {
    /// Returns a scheme instance using `config`.
    pub fn new(config: SchemeConfig<P, C>) -> Self {
        log::info!("PiBas::new(lambda = {})", config.lambda());
        Self { config }
    }

    /// The configuration of this instance.
    pub fn config(&self) -> &SchemeConfig<P, C> {
        &self.config
    }

    fn lambda(&self) -> SecurityParameter {
        self.config.lambda()
    }

    fn derive_subkey(&self, key: &Key, prefix: u8, keyword: &[u8]) -> Result<Vec<u8>, SseError> {
        let mut input = Vec::with_capacity(1 + keyword.len());
        input.push(prefix);
        input.extend_from_slice(keyword);
        self.config.prf().evaluate(key.as_bytes(), &input)
    }

    fn derive_token(&self, key: &Key, keyword: &[u8]) -> Result<Token, SseError> {
        check_length(self.lambda(), key.as_bytes())?;
        Ok(Token::new(
            self.derive_subkey(key, ADDRESS_KEY_PREFIX, keyword)?,
            self.derive_subkey(key, ENCRYPTION_KEY_PREFIX, keyword)?,
        ))
    }

    fn address(&self, k1: &[u8], position: Position) -> Result<Vec<u8>, SseError> {
        self.config.prf().evaluate(k1, &encode_position(position))
    }

    /// Encrypts `database` under `key` directly into `store`.
    ///
    /// Entries already in `store` are kept unless an address overwrites them.
    pub fn edb_setup_into<S: ByteStore, R: RngCore + CryptoRng>(
        &self,
        key: &Key,
        database: &PlaintextDatabase,
        store: S,
        rng: &mut R,
    ) -> Result<EncryptedDatabase<S>, SseError> {
        let total = database.values().map(Vec::len).sum();
        let mut pairs = Vec::with_capacity(total);

        for (keyword, identifiers) in database {
            let token = self.derive_token(key, keyword)?;
            for (c, identifier) in identifiers.iter().enumerate() {
                let address = self.address(token.k1(), Position::try_from(c)?)?;
                let ciphertext = self.config.cipher().encrypt(token.k2(), identifier, rng)?;
                pairs.push((address, ciphertext));
            }
        }

        log::debug!(
            "PiBas::edb_setup -- {} keywords, {} identifiers",
            database.len(),
            pairs.len()
        );
        EncryptedDatabase::build_from_pairs(pairs, store)
    }
}

impl<P: Prf, C: SymmetricCipher> InvertedIndexSse for PiBas<P, C> {
    type Key = Key;
    type Token = Token;
    type SearchResult = SearchResult;

    fn key_gen<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Key {
        let mut k = vec![0u8; self.lambda()];
        rng.fill_bytes(&mut k);
        Key::new(k)
    }

    fn edb_setup<R: RngCore + CryptoRng>(
        &self,
        key: &Key,
        database: &PlaintextDatabase,
        rng: &mut R,
    ) -> Result<EncryptedDatabase, SseError> {
        self.edb_setup_into(key, database, InMemoryStore::default(), rng)
    }

    fn token_gen(&self, key: &Key, keyword: &[u8]) -> Result<Token, SseError> {
        self.derive_token(key, keyword)
    }

    fn search<S: ByteStore>(
        &self,
        edb: &EncryptedDatabase<S>,
        token: &Token,
    ) -> Result<SearchResult, SseError> {
        check_length(self.lambda(), token.k1())?;
        check_length(self.lambda(), token.k2())?;

        let mut identifiers = Vec::new();
        let mut position: Position = 0;
        while let Some(ciphertext) = edb.lookup(&self.address(token.k1(), position)?)? {
            identifiers.push(self.config.cipher().decrypt(token.k2(), &ciphertext)?);
            position += 1;
        }

        log::debug!("PiBas::search -- {} lookups", position + 1);
        Ok(SearchResult::new(identifiers))
    }
}
