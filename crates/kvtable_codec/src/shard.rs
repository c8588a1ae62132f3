//! Table-to-container assignment for pooled layouts.

use crate::error::{CodecError, CodecResult};

/// Maps table names onto a fixed pool of physical containers.
///
/// The assignment is `crc32(name) % store_count`: stable across processes
/// and releases, not cryptographic. Collisions are expected; tables sharing
/// a container are kept apart by [`crate::KeyCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    store_count: u32,
}

impl ShardSelector {
    /// Creates a selector over `store_count` containers.
    ///
    /// # Errors
    ///
    /// Fails if `store_count` is zero.
    pub fn new(store_count: u32) -> CodecResult<Self> {
        if store_count == 0 {
            return Err(CodecError::EmptyPool);
        }
        Ok(Self { store_count })
    }

    /// Number of containers in the pool.
    pub fn store_count(&self) -> u32 {
        self.store_count
    }

    /// Index of the container hosting `table`.
    pub fn select(&self, table: &str) -> u32 {
        crc32fast::hash(table.as_bytes()) % self.store_count
    }

    /// Name of the container hosting `table` in database `db`.
    pub fn store_for(&self, db: &str, table: &str) -> String {
        store_name(db, self.select(table))
    }

    /// Names of every container of the pool.
    pub fn store_names(&self, db: &str) -> Vec<String> {
        (0..self.store_count).map(|i| store_name(db, i)).collect()
    }
}

/// Name of pool container `index` of database `db`.
pub fn store_name(db: &str, index: u32) -> String {
    format!("{db}_{index}")
}
