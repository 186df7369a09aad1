// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Fresh paths for temporary stores.

use crate::SseError;
use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;

/// File name prefix of every temporary store.
pub const TEMP_PREFIX: &str = "sse_temp_";

const NAME_LENGTH: usize = 8;
const MAXIMUM_ATTEMPTS: usize = 10_000;

/// Returns a path under the system temporary directory that does not currently exist.
///
/// Nothing is created at the returned path.
pub fn make_temp_path() -> Result<PathBuf, SseError> {
    let directory = std::env::temp_dir();
    let mut rng = rand::thread_rng();
    for _ in 0..MAXIMUM_ATTEMPTS {
        let name: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(NAME_LENGTH)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        let path = directory.join(format!("{TEMP_PREFIX}{name}"));
        if !path.exists() {
            return Ok(path);
        }
    }
    Err(SseError::AlreadyExists(directory.join(TEMP_PREFIX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_paths_are_fresh_and_distinct() {
        let a = make_temp_path().unwrap();
        let b = make_temp_path().unwrap();
        assert_ne!(a, b);
        assert!(!a.exists());
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(TEMP_PREFIX));
        assert_eq!(name.len(), TEMP_PREFIX.len() + NAME_LENGTH);
    }
}
