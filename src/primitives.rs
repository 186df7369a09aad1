// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Cryptographic capabilities consumed by the SSE construction.
//!
//! The construction only ever calls a [`Prf`] and a [`SymmetricCipher`]; both are supplied
//! through [`SchemeConfig`](crate::SchemeConfig), so alternative primitives can be swapped in
//! without touching the construction.

use crate::{SseError, DEFAULT_SECURITY_PARAMETER};
use chacha20poly1305::{aead::Aead, KeyInit, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const HMAC_SHA256_OUTPUT_LENGTH: usize = 32;

/// Length of the `XChaCha20` nonce prepended to every ciphertext.
pub const XNONCE_LENGTH: usize = 24;

/// Length of the Poly1305 authentication tag.
pub const TAG_LENGTH: usize = 16;

const AEAD_KEY_LENGTH: usize = 32;
const AEAD_KEY_INFO: &[u8] = b"sse/xchacha20poly1305/key";

/// A keyed pseudorandom function with a fixed output length.
pub trait Prf {
    /// The length in bytes of every output of [`Prf::evaluate`].
    fn output_length(&self) -> usize;

    /// Evaluates the PRF keyed by `key` on `input`.
    fn evaluate(&self, key: &[u8], input: &[u8]) -> Result<Vec<u8>, SseError>;
}

/// A randomized symmetric encryption scheme.
pub trait SymmetricCipher {
    /// Encrypts `plaintext` under `key`.
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        key: &[u8],
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, SseError>;

    /// Decrypts `ciphertext` under `key`, failing if it was not produced by [`SymmetricCipher::encrypt`] under `key`.
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SseError>;
}

/// HMAC-SHA-256 in counter mode, truncated to `output_length` bytes.
///
/// Output block `i` (starting at 1) is `HMAC(key, be32(i) || input)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HmacSha256Prf {
    output_length: usize,
}

impl HmacSha256Prf {
    /// Returns a PRF producing `output_length`-byte outputs.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` if `output_length` is 0.
    pub fn new(output_length: usize) -> Result<Self, SseError> {
        if output_length == 0 {
            return Err(SseError::InvalidConfigurationError(
                "PRF output length must be positive".into(),
            ));
        }
        Ok(Self { output_length })
    }
}

impl Default for HmacSha256Prf {
    fn default() -> Self {
        Self {
            output_length: DEFAULT_SECURITY_PARAMETER,
        }
    }
}

impl Prf for HmacSha256Prf {
    fn output_length(&self) -> usize {
        self.output_length
    }

    fn evaluate(&self, key: &[u8], input: &[u8]) -> Result<Vec<u8>, SseError> {
        let mut output = Vec::with_capacity(self.output_length + HMAC_SHA256_OUTPUT_LENGTH);
        let mut counter: u32 = 1;
        while output.len() < self.output_length {
            let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
                .map_err(|e| SseError::CryptoError(e.to_string()))?;
            mac.update(&counter.to_be_bytes());
            mac.update(input);
            output.extend_from_slice(&mac.finalize().into_bytes());
            counter += 1;
        }
        output.truncate(self.output_length);
        Ok(output)
    }
}

/// XChaCha20-Poly1305 with a fresh random nonce per encryption.
///
/// Keys of any length are expanded to a 256-bit AEAD key with HKDF-SHA-256.
/// Ciphertexts are laid out as `nonce || AEAD(plaintext)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XChaCha20Poly1305Cipher;

impl XChaCha20Poly1305Cipher {
    fn aead(key: &[u8]) -> Result<XChaCha20Poly1305, SseError> {
        let mut aead_key = Zeroizing::new([0u8; AEAD_KEY_LENGTH]);
        Hkdf::<Sha256>::new(None, key)
            .expand(AEAD_KEY_INFO, &mut aead_key[..])
            .map_err(|e| SseError::CryptoError(e.to_string()))?;
        <XChaCha20Poly1305 as KeyInit>::new_from_slice(&aead_key[..])
            .map_err(|e| SseError::CryptoError(e.to_string()))
    }
}

impl SymmetricCipher for XChaCha20Poly1305Cipher {
    fn encrypt<R: RngCore + CryptoRng>(
        &self,
        key: &[u8],
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, SseError> {
        let mut nonce = [0u8; XNONCE_LENGTH];
        rng.fill_bytes(&mut nonce);

        let sealed = Self::aead(key)?
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|e| SseError::CryptoError(e.to_string()))?;

        let mut ciphertext = Vec::with_capacity(XNONCE_LENGTH + sealed.len());
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&sealed);
        Ok(ciphertext)
    }

    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SseError> {
        if ciphertext.len() < XNONCE_LENGTH + TAG_LENGTH {
            return Err(SseError::DecryptionError);
        }
        let (nonce, sealed) = ciphertext.split_at(XNONCE_LENGTH);
        Self::aead(key)?
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| SseError::DecryptionError)
    }
}
