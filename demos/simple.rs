// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A very simple demonstration of searchable symmetric encryption.

extern crate sse;

use rand::rngs::OsRng;
use sse::{InvertedIndexSse, PiBas, PlaintextDatabase, SseError};

fn main() -> Result<(), SseError> {
    let mut rng = OsRng;
    let scheme = PiBas::default();
    let key = scheme.key_gen(&mut rng);

    let database = PlaintextDatabase::from([(
        b"foo".to_vec(),
        vec![b"id0".to_vec(), b"id1".to_vec(), b"id2".to_vec()],
    )]);
    let edb = scheme.edb_setup(&key, &database, &mut rng)?;

    let token = scheme.token_gen(&key, b"foo")?;
    for identifier in scheme.search(&edb, &token)?.identifiers() {
        println!("{}", String::from_utf8_lossy(identifier));
    }
    Ok(())
}
