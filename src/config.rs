// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Scheme configuration: the security parameter and the primitives used by the construction.

use crate::primitives::{HmacSha256Prf, Prf, SymmetricCipher, XChaCha20Poly1305Cipher};
use crate::{SecurityParameter, SseError};
use static_assertions::const_assert;

/// The default security parameter λ, in bytes.
pub const DEFAULT_SECURITY_PARAMETER: SecurityParameter = 32;

/// The smallest accepted security parameter, in bytes.
/// Below this, address collisions and key guessing stop being negligible.
pub const MINIMUM_SECURITY_PARAMETER: SecurityParameter = 16;

/// The largest accepted security parameter, in bytes.
pub const MAXIMUM_SECURITY_PARAMETER: SecurityParameter = 64;

const_assert!(MINIMUM_SECURITY_PARAMETER <= DEFAULT_SECURITY_PARAMETER);
const_assert!(DEFAULT_SECURITY_PARAMETER <= MAXIMUM_SECURITY_PARAMETER);

/// Bundles the security parameter λ with the PRF and the symmetric cipher used by the construction.
///
/// The PRF output length is always λ, so keys, sub-keys and addresses all share one length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeConfig<P: Prf = HmacSha256Prf, C: SymmetricCipher = XChaCha20Poly1305Cipher> {
    lambda: SecurityParameter,
    prf: P,
    cipher: C,
}

impl SchemeConfig {
    /// Returns the default configuration with security parameter `lambda`.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` if `lambda` is outside
    /// `MINIMUM_SECURITY_PARAMETER..=MAXIMUM_SECURITY_PARAMETER`.
    pub fn new(lambda: SecurityParameter) -> Result<Self, SseError> {
        Self::new_with_parameters(lambda, HmacSha256Prf::new(lambda)?, XChaCha20Poly1305Cipher)
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_SECURITY_PARAMETER,
            prf: HmacSha256Prf::default(),
            cipher: XChaCha20Poly1305Cipher,
        }
    }
}

impl<P: Prf, C: SymmetricCipher> SchemeConfig<P, C> {
    /// Returns a configuration with security parameter `lambda` using the given primitives.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` in the following cases.
    ///
    /// - `lambda` is outside `MINIMUM_SECURITY_PARAMETER..=MAXIMUM_SECURITY_PARAMETER`.
    /// - `prf` does not produce `lambda`-byte outputs.
    pub fn new_with_parameters(
        lambda: SecurityParameter,
        prf: P,
        cipher: C,
    ) -> Result<Self, SseError> {
        if !(MINIMUM_SECURITY_PARAMETER..=MAXIMUM_SECURITY_PARAMETER).contains(&lambda) {
            return Err(SseError::InvalidConfigurationError(format!(
                "security parameter {lambda} is outside {MINIMUM_SECURITY_PARAMETER}..={MAXIMUM_SECURITY_PARAMETER}"
            )));
        }

        if prf.output_length() != lambda {
            return Err(SseError::InvalidConfigurationError(format!(
                "PRF output length {} does not match security parameter {lambda}",
                prf.output_length()
            )));
        }

        Ok(Self {
            lambda,
            prf,
            cipher,
        })
    }

    /// The security parameter λ in bytes.
    pub fn lambda(&self) -> SecurityParameter {
        self.lambda
    }

    /// The PRF used to derive sub-keys and addresses.
    pub fn prf(&self) -> &P {
        &self.prf
    }

    /// The cipher protecting identifiers.
    pub fn cipher(&self) -> &C {
        &self.cipher
    }
}
