// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A simple interactive demonstration of SSE: index documents, persist the encrypted index, search it.

use rand::rngs::OsRng;
use rustyline::history::FileHistory;
use rustyline::Editor;
use sse::{InvertedIndexSse, PersistentStore, PiBas, PlaintextDatabase, SnapshotStore};

fn read_line(
    prompt: &str,
    rl: &mut Editor<(), FileHistory>,
) -> Result<String, Box<dyn std::error::Error>> {
    println!("{}", prompt);
    Ok(rl.readline("> ")?.trim().to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = OsRng;
    let scheme = PiBas::default();
    let key = scheme.key_gen(&mut rng);

    let mut rl = Editor::<(), _>::new()?;

    let mut database = PlaintextDatabase::new();
    println!("Enter documents as `<identifier>: <words>`. An empty line finishes indexing.");
    loop {
        let line = read_line("Document?", &mut rl)?;
        if line.is_empty() {
            break;
        }
        let Some((identifier, words)) = line.split_once(':') else {
            println!("Expected `<identifier>: <words>`. Try again.");
            continue;
        };
        for word in words.split_whitespace() {
            let identifiers = database.entry(word.as_bytes().to_vec()).or_default();
            let identifier = identifier.trim().as_bytes().to_vec();
            if !identifiers.contains(&identifier) {
                identifiers.push(identifier);
            }
        }
    }

    let edb = scheme.edb_setup(&key, &database, &mut rng)?;
    let edb = edb.persist_into(SnapshotStore::create_temp()?)?;
    println!(
        "Indexed {} keywords into {} entries at {:?}.",
        database.len(),
        edb.len()?,
        edb.store().path()
    );

    loop {
        let keyword = read_line("Search for which keyword?", &mut rl)?;
        let token = scheme.token_gen(&key, keyword.as_bytes())?;
        let result = scheme.search(&edb, &token)?;
        if result.is_empty() {
            println!("No matches.");
        }
        for identifier in result.identifiers() {
            println!("{}", String::from_utf8_lossy(identifier));
        }
    }
}
