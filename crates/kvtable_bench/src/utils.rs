//! Benchmark utilities.

use kvtable_core::{Config, Database, Row, Table, MAX_INTEGER_KEY};
use kvtable_engine::{Key, MemoryEngine};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Generate a random lowercase string of the specified length.
pub fn random_text(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate random keys, half integers and half strings.
pub fn random_keys(count: usize) -> Vec<Key> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                Key::Integer(rng.gen_range(0..=MAX_INTEGER_KEY))
            } else {
                Key::Text(random_text(12))
            }
        })
        .collect()
}

/// Generate rows keyed `id` = 1..=`count` in random order, each with a
/// payload of `payload_size` characters.
pub fn generate_rows(count: u32, payload_size: usize) -> Vec<Row> {
    let mut rows: Vec<Row> = (1..=count)
        .map(|i| {
            Row::new()
                .with("id", i)
                .with("payload", random_text(payload_size))
        })
        .collect();
    rows.shuffle(&mut rand::thread_rng());
    rows
}

/// Opens a table on a fresh memory engine and fills it with `count` rows.
pub async fn populated_table(config: Config, count: u32, payload_size: usize) -> Table {
    let db = Database::open(Arc::new(MemoryEngine::new()), "bench", config)
        .await
        .expect("Failed to open database");
    let table = db
        .open_table("rows", "id")
        .await
        .expect("Failed to open table");
    for chunk in generate_rows(count, payload_size).chunks(1_000) {
        table.put(chunk).await.expect("Failed to write rows");
    }
    table
}
