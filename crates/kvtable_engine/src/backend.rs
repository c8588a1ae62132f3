//! Storage engine capability traits.

use crate::error::EngineResult;
use crate::key::{Direction, Key, KeyRange};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// Durability hint passed when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Let the engine decide.
    Default,
    /// Commit may resolve before data reaches durable storage.
    #[default]
    Relaxed,
    /// Commit resolves only once data is durable.
    Strict,
}

/// A key together with its stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The engine key.
    pub key: Key,
    /// The stored bytes.
    pub value: Vec<u8>,
}

/// Conditions the engine signals on an open connection.
///
/// Each occurrence is delivered exactly once on the connection's event
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine closed the connection.
    Closed,
    /// A transaction on the connection was aborted by the engine.
    Aborted,
    /// The engine reported an error on the connection.
    Error(String),
    /// Another connection requested a schema change or deletion.
    VersionChange {
        /// Version this connection was opened at.
        old: u32,
        /// Requested version, `None` when the database is being deleted.
        new: Option<u32>,
    },
}

/// Structural-change callback run inside an upgrade transaction.
pub type UpgradeHandler =
    Box<dyn FnOnce(&mut dyn UpgradeTransaction) -> EngineResult<()> + Send + 'static>;

/// Result of a successful open.
pub struct Opened {
    /// The live connection.
    pub connection: Arc<dyn Connection>,
    /// Events the engine signals for this connection.
    pub events: UnboundedReceiver<EngineEvent>,
}

impl std::fmt::Debug for Opened {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opened")
            .field("name", &self.connection.name())
            .field("version", &self.connection.version())
            .finish_non_exhaustive()
    }
}

/// An ordered, transactional key-value engine holding named databases.
///
/// # Invariants
///
/// - `open` runs the upgrade handler exactly once, before resolving, when
///   the database is new or `version` exceeds the stored version
/// - a version lower than the stored one is rejected
/// - connections open at an older version receive
///   [`EngineEvent::VersionChange`] when another open upgrades the schema
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Opens `name`, optionally at a specific schema `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the engine is unavailable
    /// - `version` is lower than the stored version
    /// - the upgrade handler fails (the schema change is rolled back)
    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<Opened>;

    /// Deletes `name` and every container it holds.
    ///
    /// Deleting a database that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Blocked`] while any connection to the
    /// database remains open.
    async fn delete_database(&self, name: &str) -> EngineResult<()>;
}

/// An open handle to one database.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Schema version this connection was opened at.
    fn version(&self) -> u32;

    /// Names of the physical containers, sorted.
    fn store_names(&self) -> Vec<String>;

    /// Begins a transaction scoped to one container.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the container does
    /// not exist.
    async fn transaction(
        &self,
        store: &str,
        mode: TransactionMode,
        durability: Durability,
    ) -> EngineResult<Box<dyn Transaction>>;

    /// Closes the connection. Explicit closes emit no event.
    fn close(&self);

    /// Returns true once the connection can no longer be used.
    fn is_closed(&self) -> bool;
}

/// A transaction over a single container.
///
/// Writes become visible to other transactions only after [`Transaction::commit`].
/// Dropping an uncommitted transaction aborts it.
#[async_trait]
pub trait Transaction: Send {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Constraint`] if the engine rejects the row.
    async fn put(&mut self, key: Key, value: Vec<u8>) -> EngineResult<()>;

    /// Deletes every row inside `range`.
    async fn delete(&mut self, range: &KeyRange) -> EngineResult<()>;

    /// Deletes every row in the container.
    async fn clear(&mut self) -> EngineResult<()>;

    /// Counts the rows inside `range` (all rows for `None`).
    async fn count(&mut self, range: Option<&KeyRange>) -> EngineResult<u64>;

    /// Reads rows inside `range` in ascending order, at most `limit` of them.
    async fn get_all(
        &mut self,
        range: Option<&KeyRange>,
        limit: Option<u32>,
    ) -> EngineResult<Vec<Record>>;

    /// Opens a cursor over `range`.
    ///
    /// Returns `None` when the range holds no rows.
    async fn open_cursor(
        &mut self,
        range: Option<&KeyRange>,
        direction: Direction,
    ) -> EngineResult<Option<Box<dyn Cursor>>>;

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection closed before the commit, in
    /// which case none of the transaction's writes are kept.
    async fn commit(self: Box<Self>) -> EngineResult<()>;
}

/// A movable position inside a key range.
#[async_trait]
pub trait Cursor: Send {
    /// Key at the current position.
    fn key(&self) -> &Key;

    /// Value at the current position.
    fn value(&self) -> &[u8];

    /// Moves `count` rows in the cursor's direction.
    ///
    /// Returns `false` once the cursor runs off its range; the cursor is
    /// then exhausted.
    async fn advance(&mut self, count: u32) -> EngineResult<bool>;
}

/// The privileged transaction in which containers are created or removed.
pub trait UpgradeTransaction {
    /// Version before the upgrade; `0` for a new database.
    fn old_version(&self) -> u32;

    /// Version after the upgrade.
    fn new_version(&self) -> u32;

    /// Names of the containers as currently staged, sorted.
    fn store_names(&self) -> Vec<String>;

    /// Returns true if the container exists in the staged schema.
    fn has_store(&self, name: &str) -> bool {
        self.store_names().iter().any(|s| s == name)
    }

    /// Creates a container.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::StoreExists`] if it already exists.
    fn create_store(&mut self, name: &str) -> EngineResult<()>;

    /// Removes a container and its rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::StoreNotFound`] if it does not exist.
    fn delete_store(&mut self, name: &str) -> EngineResult<()>;
}
