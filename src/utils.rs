// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Utilities.

use crate::{Position, SseError};

/// The byte length of an encoded position counter.
pub(crate) const POSITION_ENCODING_LENGTH: usize = 8;

/// Encodes a position counter as a fixed-width big-endian byte string.
pub(crate) fn encode_position(position: Position) -> [u8; POSITION_ENCODING_LENGTH] {
    position.to_be_bytes()
}

/// Fails with `InvalidLength` unless `bytes` is exactly `expected` bytes long.
pub(crate) fn check_length(expected: usize, bytes: &[u8]) -> Result<(), SseError> {
    if bytes.len() != expected {
        return Err(SseError::InvalidLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Sorts `pairs` in ascending order of address, and returns the number of
/// addresses that occur more than once.
///
/// The sort is stable, so among pairs sharing an address the last one
/// produced is the last one inserted (and therefore the one that survives).
pub(crate) fn sort_by_address(pairs: &mut [(Vec<u8>, Vec<u8>)]) -> usize {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.windows(2).filter(|w| w[0].0 == w[1].0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::size_of;

    #[test]
    fn check_size_of_position() {
        const_assert_eq!(size_of::<Position>(), POSITION_ENCODING_LENGTH);
    }

    #[test]
    fn position_encoding_is_fixed_width_and_unambiguous() {
        assert_eq!(encode_position(0), [0u8; 8]);
        assert_eq!(encode_position(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(encode_position(256), [0, 0, 0, 0, 0, 0, 1, 0]);
        assert_ne!(encode_position(1), encode_position(256));
    }

    #[test]
    fn sort_by_address_orders_pairs_and_counts_collisions() {
        let mut pairs = vec![
            (b"c".to_vec(), b"3".to_vec()),
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
        ];
        assert_eq!(sort_by_address(&mut pairs), 0);
        let addresses: Vec<_> = pairs.iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(addresses, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

        let mut colliding = vec![
            (b"x".to_vec(), b"first".to_vec()),
            (b"x".to_vec(), b"second".to_vec()),
        ];
        assert_eq!(sort_by_address(&mut colliding), 1);
        assert_eq!(colliding[1].1, b"second".to_vec());
    }
}
