//! In-memory storage engine.

use crate::backend::{
    Connection, Cursor, Durability, EngineEvent, Opened, Record, StorageEngine, Transaction,
    TransactionMode, UpgradeHandler, UpgradeTransaction,
};
use crate::error::{EngineError, EngineResult};
use crate::file::Snapshot;
use crate::key::{Direction, Key, KeyRange};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Rows of one container, ordered by key.
pub(crate) type Rows = BTreeMap<Key, Vec<u8>>;

/// Tuning knobs for [`MemoryEngine`].
#[derive(Debug, Clone, Default)]
pub struct MemoryEngineConfig {
    /// Values larger than this many bytes are rejected with a constraint error.
    pub max_value_size: Option<usize>,
}

impl MemoryEngineConfig {
    /// Creates a configuration with no limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects values larger than `size` bytes.
    #[must_use]
    pub const fn max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = Some(size);
        self
    }
}

/// Open and upgrade counters for one database name.
///
/// Counters survive deletion of the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Successful opens.
    pub opens: u64,
    /// Upgrade transactions that committed.
    pub upgrades: u64,
}

/// Persistence hook used by [`crate::FileEngine`].
pub(crate) trait SnapshotStore: Send + Sync {
    fn load(&self, name: &str) -> EngineResult<Option<Snapshot>>;
    fn save(&self, name: &str, snapshot: &Snapshot, durability: Durability) -> EngineResult<()>;
    fn remove(&self, name: &str) -> EngineResult<()>;
}

/// An in-memory ordered transactional engine.
///
/// All state lives in the process and is lost when the last clone of the
/// engine is dropped. Clones share state, so a test can keep one clone for
/// fault injection while the code under test owns another.
///
/// # Transactions
///
/// - Read-only transactions read a snapshot taken when they begin
/// - Read-write transactions on the same container are serialized and
///   publish their writes atomically on commit
///
/// # Fault injection
///
/// [`MemoryEngine::interrupt`], [`MemoryEngine::abort`],
/// [`MemoryEngine::raise_error`], [`MemoryEngine::fail_opens`] and
/// [`MemoryEngine::set_available`] simulate engine-initiated closures,
/// errors and outages.
///
/// # Example
///
/// ```rust
/// use kvtable_engine::{
///     Durability, Key, MemoryEngine, StorageEngine, TransactionMode, UpgradeTransaction,
/// };
///
/// # tokio_test_block(async {
/// let engine = MemoryEngine::new();
/// let opened = engine
///     .open(
///         "app",
///         None,
///         Some(Box::new(|tx: &mut dyn UpgradeTransaction| tx.create_store("items"))),
///     )
///     .await
///     .unwrap();
/// let mut tx = opened
///     .connection
///     .transaction("items", TransactionMode::ReadWrite, Durability::Relaxed)
///     .await
///     .unwrap();
/// tx.put(Key::Integer(1), b"one".to_vec()).await.unwrap();
/// tx.commit().await.unwrap();
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryEngine {
    shared: Arc<EngineShared>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty engine with custom limits.
    #[must_use]
    pub fn with_config(config: MemoryEngineConfig) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config,
                ..EngineShared::default()
            }),
        }
    }

    pub(crate) fn with_snapshots(config: MemoryEngineConfig, store: Box<dyn SnapshotStore>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config,
                snapshots: Some(store),
                ..EngineShared::default()
            }),
        }
    }

    /// Closes every live connection to `name` and signals [`EngineEvent::Closed`].
    ///
    /// Returns the number of connections interrupted.
    pub fn interrupt(&self, name: &str) -> usize {
        let connections = self.shared.take_connections(name);
        for conn in &connections {
            conn.shut();
            conn.signal(EngineEvent::Closed);
        }
        debug!(db = name, count = connections.len(), "interrupted connections");
        connections.len()
    }

    /// Signals [`EngineEvent::Aborted`] on every live connection to `name`.
    pub fn abort(&self, name: &str) -> usize {
        self.shared.broadcast(name, EngineEvent::Aborted)
    }

    /// Signals [`EngineEvent::Error`] on every live connection to `name`.
    pub fn raise_error(&self, name: &str, message: &str) -> usize {
        self.shared
            .broadcast(name, EngineEvent::Error(message.to_owned()))
    }

    /// Makes the next `count` opens fail.
    pub fn fail_opens(&self, count: u32) {
        self.shared.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Takes the engine offline (`false`) or back online (`true`).
    ///
    /// While offline every open and delete fails with
    /// [`EngineError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.shared.offline.store(!available, Ordering::SeqCst);
    }

    /// Number of upgrade transactions committed for `name`.
    pub fn upgrade_count(&self, name: &str) -> u64 {
        self.stats(name).upgrades
    }

    /// Number of successful opens of `name`.
    pub fn open_count(&self, name: &str) -> u64 {
        self.stats(name).opens
    }

    /// Open and upgrade counters for `name`.
    pub fn stats(&self, name: &str) -> DatabaseStats {
        self.shared
            .stats
            .lock()
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Number of live connections to `name`.
    pub fn connection_count(&self, name: &str) -> usize {
        self.shared
            .databases
            .lock()
            .get(name)
            .map_or(0, |db| db.connections.len())
    }

    /// Stored schema version of `name`, if the database is loaded.
    pub fn version(&self, name: &str) -> Option<u32> {
        self.shared.databases.lock().get(name).map(|db| db.version)
    }

    /// Container names of `name`, if the database is loaded.
    pub fn store_names(&self, name: &str) -> Option<Vec<String>> {
        self.shared
            .databases
            .lock()
            .get(name)
            .map(|db| db.stores.keys().cloned().collect())
    }

    /// Names of the databases currently loaded.
    pub fn loaded_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.databases.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("databases", &self.loaded_databases())
            .field("persistent", &self.shared.snapshots.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<Opened> {
        let (connection, events) = self.shared.open(name, version, upgrade)?;
        Ok(Opened {
            connection: Arc::new(MemoryConnection {
                conn: connection,
                engine: Arc::clone(&self.shared),
            }),
            events,
        })
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        self.shared.delete(name)
    }
}

/// State shared by every clone of an engine and its connections.
#[derive(Default)]
struct EngineShared {
    config: MemoryEngineConfig,
    databases: Mutex<HashMap<String, DatabaseState>>,
    stats: Mutex<HashMap<String, DatabaseStats>>,
    offline: AtomicBool,
    failing_opens: AtomicU32,
    next_connection: AtomicU64,
    snapshots: Option<Box<dyn SnapshotStore>>,
    // Serializes snapshot writes. Taken before `databases`.
    persist_lock: Mutex<()>,
}

#[derive(Default)]
struct DatabaseState {
    version: u32,
    stores: BTreeMap<String, Arc<StoreCell>>,
    connections: Vec<Arc<ConnectionShared>>,
}

impl DatabaseState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            version: snapshot.version,
            stores: snapshot
                .stores
                .into_iter()
                .map(|(name, rows)| (name, Arc::new(StoreCell::new(rows.into_iter().collect()))))
                .collect(),
            connections: Vec::new(),
        }
    }
}

struct StoreCell {
    rows: RwLock<Arc<Rows>>,
    writer: Arc<AsyncMutex<()>>,
}

impl StoreCell {
    fn new(rows: Rows) -> Self {
        Self {
            rows: RwLock::new(Arc::new(rows)),
            writer: Arc::new(AsyncMutex::new(())),
        }
    }
}

struct ConnectionShared {
    id: u64,
    name: String,
    version: u32,
    store_names: Vec<String>,
    closed: AtomicBool,
    events: UnboundedSender<EngineEvent>,
}

impl ConnectionShared {
    fn signal(&self, event: EngineEvent) {
        // The receiver is gone once the owner stopped listening.
        let _ = self.events.send(event);
    }

    fn shut(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.is_closed() {
            Err(EngineError::closed(&self.name))
        } else {
            Ok(())
        }
    }
}

impl EngineShared {
    fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<(Arc<ConnectionShared>, mpsc::UnboundedReceiver<EngineEvent>)> {
        self.ensure_online(name)?;
        if self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!(db = name, "injected open failure");
            return Err(EngineError::unavailable(name, "injected open failure"));
        }
        if version == Some(0) {
            return Err(EngineError::constraint("version must be positive"));
        }

        let _persisting = self.persist_guard();
        let mut databases = self.databases.lock();
        if !databases.contains_key(name) {
            if let Some(snapshot) = self.load(name)? {
                databases.insert(name.to_owned(), DatabaseState::from_snapshot(snapshot));
            }
        }

        let current = databases.get(name).map(|db| db.version);
        let target = match (version, current) {
            (Some(requested), Some(current)) if requested < current => {
                return Err(EngineError::Version { requested, current });
            }
            (Some(requested), _) => requested,
            (None, Some(current)) => current,
            (None, None) => 1,
        };

        if current.map_or(true, |current| target > current) {
            let old = current.unwrap_or(0);
            let mut staged = StagedSchema {
                old,
                new: target,
                stores: databases
                    .get(name)
                    .map(|db| db.stores.clone())
                    .unwrap_or_default(),
            };
            if let Some(handler) = upgrade {
                let tx: &mut dyn UpgradeTransaction = &mut staged;
                handler(tx)?;
            }
            if let Some(snapshot) = self.capture(target, &staged.stores, None) {
                self.save(name, &snapshot, Durability::Strict)?;
            }

            let state = databases.entry(name.to_owned()).or_default();
            for conn in state.connections.drain(..) {
                conn.shut();
                conn.signal(EngineEvent::VersionChange {
                    old: conn.version,
                    new: Some(target),
                });
            }
            state.version = target;
            state.stores = staged.stores;
            self.stats.lock().entry(name.to_owned()).or_default().upgrades += 1;
            info!(db = name, old, new = target, "schema upgraded");
        }

        let state = databases.entry(name.to_owned()).or_default();
        let (sender, receiver) = mpsc::unbounded_channel();
        let conn = Arc::new(ConnectionShared {
            id: self.next_connection.fetch_add(1, Ordering::SeqCst),
            name: name.to_owned(),
            version: state.version,
            store_names: state.stores.keys().cloned().collect(),
            closed: AtomicBool::new(false),
            events: sender,
        });
        state.connections.push(Arc::clone(&conn));
        self.stats.lock().entry(name.to_owned()).or_default().opens += 1;
        debug!(db = name, version = state.version, connection = conn.id, "opened");
        Ok((conn, receiver))
    }

    fn delete(&self, name: &str) -> EngineResult<()> {
        self.ensure_online(name)?;
        let _persisting = self.persist_guard();
        let mut databases = self.databases.lock();
        if let Some(state) = databases.get(name) {
            if !state.connections.is_empty() {
                for conn in &state.connections {
                    conn.signal(EngineEvent::VersionChange {
                        old: conn.version,
                        new: None,
                    });
                }
                warn!(
                    db = name,
                    connections = state.connections.len(),
                    "delete blocked by open connections"
                );
                return Err(EngineError::blocked(name));
            }
        }
        databases.remove(name);
        if let Some(snapshots) = &self.snapshots {
            snapshots.remove(name)?;
        }
        info!(db = name, "database deleted");
        Ok(())
    }

    fn ensure_online(&self, name: &str) -> EngineResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(EngineError::unavailable(name, "engine offline"))
        } else {
            Ok(())
        }
    }

    fn take_connections(&self, name: &str) -> Vec<Arc<ConnectionShared>> {
        self.databases
            .lock()
            .get_mut(name)
            .map(|db| std::mem::take(&mut db.connections))
            .unwrap_or_default()
    }

    fn broadcast(&self, name: &str, event: EngineEvent) -> usize {
        let databases = self.databases.lock();
        let Some(db) = databases.get(name) else {
            return 0;
        };
        for conn in &db.connections {
            conn.signal(event.clone());
        }
        db.connections.len()
    }

    fn detach(&self, conn: &ConnectionShared) {
        conn.shut();
        if let Some(db) = self.databases.lock().get_mut(&conn.name) {
            db.connections.retain(|c| c.id != conn.id);
        }
    }

    fn store_cell(&self, conn: &ConnectionShared, store: &str) -> EngineResult<Arc<StoreCell>> {
        conn.ensure_live()?;
        if !conn.store_names.iter().any(|s| s == store) {
            return Err(EngineError::StoreNotFound(store.to_owned()));
        }
        self.databases
            .lock()
            .get(&conn.name)
            .and_then(|db| db.stores.get(store))
            .cloned()
            .ok_or_else(|| EngineError::StoreNotFound(store.to_owned()))
    }

    fn publish(
        &self,
        conn: &ConnectionShared,
        store: &str,
        cell: &StoreCell,
        rows: Arc<Rows>,
        durability: Durability,
    ) -> EngineResult<()> {
        // Captured under `databases`, written outside it. The persist lock
        // is held until the rows are visible so snapshots land in commit order.
        let _persisting = self.persist_guard();
        let snapshot = {
            let databases = self.databases.lock();
            conn.ensure_live()?;
            databases
                .get(&conn.name)
                .and_then(|db| self.capture(db.version, &db.stores, Some((store, &rows))))
        };
        if let Some(snapshot) = snapshot {
            self.save(&conn.name, &snapshot, durability)?;
        }
        *cell.rows.write() = rows;
        Ok(())
    }

    fn persist_guard(&self) -> Option<parking_lot::MutexGuard<'_, ()>> {
        self.snapshots.as_ref().map(|_| self.persist_lock.lock())
    }

    fn load(&self, name: &str) -> EngineResult<Option<Snapshot>> {
        match &self.snapshots {
            Some(snapshots) => snapshots.load(name),
            None => Ok(None),
        }
    }

    fn save(&self, name: &str, snapshot: &Snapshot, durability: Durability) -> EngineResult<()> {
        match &self.snapshots {
            Some(snapshots) => snapshots.save(name, snapshot, durability),
            None => Ok(()),
        }
    }

    /// Image of a database with `replaced` standing in for one container.
    /// None when the engine does not persist.
    fn capture(
        &self,
        version: u32,
        stores: &BTreeMap<String, Arc<StoreCell>>,
        replaced: Option<(&str, &Rows)>,
    ) -> Option<Snapshot> {
        self.snapshots.as_ref()?;
        let stores = stores
            .iter()
            .map(|(store, cell)| {
                let rows: Vec<(Key, Vec<u8>)> = match replaced {
                    Some((replaced_store, rows)) if replaced_store == store => rows
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    _ => cell
                        .rows
                        .read()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                };
                (store.clone(), rows)
            })
            .collect();
        Some(Snapshot { version, stores })
    }
}

struct StagedSchema {
    old: u32,
    new: u32,
    stores: BTreeMap<String, Arc<StoreCell>>,
}

impl UpgradeTransaction for StagedSchema {
    fn old_version(&self) -> u32 {
        self.old
    }

    fn new_version(&self) -> u32 {
        self.new
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn create_store(&mut self, name: &str) -> EngineResult<()> {
        if self.stores.contains_key(name) {
            return Err(EngineError::StoreExists(name.to_owned()));
        }
        self.stores
            .insert(name.to_owned(), Arc::new(StoreCell::new(Rows::new())));
        Ok(())
    }

    fn delete_store(&mut self, name: &str) -> EngineResult<()> {
        self.stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::StoreNotFound(name.to_owned()))
    }
}

struct MemoryConnection {
    conn: Arc<ConnectionShared>,
    engine: Arc<EngineShared>,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.conn.name
    }

    fn version(&self) -> u32 {
        self.conn.version
    }

    fn store_names(&self) -> Vec<String> {
        self.conn.store_names.clone()
    }

    async fn transaction(
        &self,
        store: &str,
        mode: TransactionMode,
        durability: Durability,
    ) -> EngineResult<Box<dyn Transaction>> {
        let cell = self.engine.store_cell(&self.conn, store)?;
        let writer = match mode {
            TransactionMode::ReadWrite => Some(Arc::clone(&cell.writer).lock_owned().await),
            TransactionMode::ReadOnly => None,
        };
        self.conn.ensure_live()?;
        let rows = Arc::clone(&cell.rows.read());
        Ok(Box::new(MemoryTransaction {
            conn: Arc::clone(&self.conn),
            engine: Arc::clone(&self.engine),
            store: store.to_owned(),
            cell,
            mode,
            durability,
            rows,
            dirty: false,
            _writer: writer,
        }))
    }

    fn close(&self) {
        self.engine.detach(&self.conn);
        debug!(db = %self.conn.name, connection = self.conn.id, "closed");
    }

    fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}

struct MemoryTransaction {
    conn: Arc<ConnectionShared>,
    engine: Arc<EngineShared>,
    store: String,
    cell: Arc<StoreCell>,
    mode: TransactionMode,
    durability: Durability,
    rows: Arc<Rows>,
    dirty: bool,
    _writer: Option<OwnedMutexGuard<()>>,
}

impl MemoryTransaction {
    fn ensure_writable(&self) -> EngineResult<()> {
        self.conn.ensure_live()?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(EngineError::ReadOnly);
        }
        Ok(())
    }

    fn rows_mut(&mut self) -> &mut Rows {
        self.dirty = true;
        Arc::make_mut(&mut self.rows)
    }
}

/// Iterates the rows inside `range`; inverted ranges yield nothing.
fn scan<'a>(
    rows: &'a Rows,
    range: Option<&KeyRange>,
) -> impl DoubleEndedIterator<Item = (&'a Key, &'a Vec<u8>)> + 'a {
    let slice = match range {
        None => Some(rows.range::<Key, _>(..)),
        Some(range) if range.is_empty() => None,
        Some(range) => Some(rows.range::<Key, _>(range.as_bounds())),
    };
    slice.into_iter().flatten()
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn put(&mut self, key: Key, value: Vec<u8>) -> EngineResult<()> {
        self.ensure_writable()?;
        if let Some(max) = self.engine.config.max_value_size {
            if value.len() > max {
                return Err(EngineError::constraint(format!(
                    "value for key {key} is {} bytes, limit is {max}",
                    value.len()
                )));
            }
        }
        self.rows_mut().insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, range: &KeyRange) -> EngineResult<()> {
        self.ensure_writable()?;
        let doomed: Vec<Key> = scan(&self.rows, Some(range)).map(|(k, _)| k.clone()).collect();
        if !doomed.is_empty() {
            let rows = self.rows_mut();
            for key in &doomed {
                rows.remove(key);
            }
        }
        Ok(())
    }

    async fn clear(&mut self) -> EngineResult<()> {
        self.ensure_writable()?;
        if !self.rows.is_empty() {
            self.rows_mut().clear();
        }
        Ok(())
    }

    async fn count(&mut self, range: Option<&KeyRange>) -> EngineResult<u64> {
        self.conn.ensure_live()?;
        Ok(scan(&self.rows, range).count() as u64)
    }

    async fn get_all(
        &mut self,
        range: Option<&KeyRange>,
        limit: Option<u32>,
    ) -> EngineResult<Vec<Record>> {
        self.conn.ensure_live()?;
        let limit = limit.map_or(usize::MAX, |n| n as usize);
        Ok(scan(&self.rows, range)
            .take(limit)
            .map(|(key, value)| Record {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn open_cursor(
        &mut self,
        range: Option<&KeyRange>,
        direction: Direction,
    ) -> EngineResult<Option<Box<dyn Cursor>>> {
        self.conn.ensure_live()?;
        let mut rows = scan(&self.rows, range);
        let first = match direction {
            Direction::Forward => rows.next(),
            Direction::Reverse => rows.next_back(),
        };
        Ok(first.map(|(key, value)| {
            Box::new(MemoryCursor {
                conn: Arc::clone(&self.conn),
                rows: Arc::clone(&self.rows),
                range: range.cloned().unwrap_or_else(KeyRange::all),
                direction,
                key: key.clone(),
                value: value.clone(),
                exhausted: false,
            }) as Box<dyn Cursor>
        }))
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        let this = *self;
        this.conn.ensure_live()?;
        if this.dirty {
            this.engine
                .publish(&this.conn, &this.store, &this.cell, this.rows, this.durability)?;
        }
        Ok(())
    }
}

struct MemoryCursor {
    conn: Arc<ConnectionShared>,
    rows: Arc<Rows>,
    range: KeyRange,
    direction: Direction,
    key: Key,
    value: Vec<u8>,
    exhausted: bool,
}

#[async_trait]
impl Cursor for MemoryCursor {
    fn key(&self) -> &Key {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    async fn advance(&mut self, count: u32) -> EngineResult<bool> {
        self.conn.ensure_live()?;
        if count == 0 {
            return Err(EngineError::constraint("advance count must be positive"));
        }
        if self.exhausted {
            return Ok(false);
        }
        let step = (count - 1) as usize;
        let next = match self.direction {
            Direction::Forward => {
                let rest = KeyRange {
                    lower: Bound::Excluded(self.key.clone()),
                    upper: self.range.upper.clone(),
                };
                scan(&self.rows, Some(&rest)).nth(step)
            }
            Direction::Reverse => {
                let rest = KeyRange {
                    lower: self.range.lower.clone(),
                    upper: Bound::Excluded(self.key.clone()),
                };
                scan(&self.rows, Some(&rest)).rev().nth(step)
            }
        }
        .map(|(k, v)| (k.clone(), v.clone()));

        match next {
            Some((key, value)) => {
                self.key = key;
                self.value = value;
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }
}
