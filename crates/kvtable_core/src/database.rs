//! Database facade.

use crate::config::{Config, Layout};
use crate::connection::{ConnectionManager, ConnectionState, SchemaChange};
use crate::error::{CoreError, CoreResult};
use crate::table::{KeySpace, Table};
use kvtable_codec::{validate_table_name, KeyCodec, ShardSelector};
use kvtable_engine::{Connection, EngineError, StorageEngine, TransactionMode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Handle to one named database.
///
/// `Database` is the entry point of kvtable. It owns the connection to the
/// storage engine, keeps it alive across engine failures, and hands out
/// [`Table`]s. Cloning is cheap; every clone shares the same connection.
///
/// # Opening a Database
///
/// The engine is passed in explicitly, so any [`StorageEngine`] works:
///
/// ```rust
/// use kvtable_core::{Config, Database};
/// use kvtable_engine::MemoryEngine;
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let engine = Arc::new(MemoryEngine::new());
/// let db = Database::open(engine, "app", Config::new().pooled(8)).await?;
/// assert_eq!(db.version(), Some(1));
/// db.close();
/// # Ok::<(), kvtable_core::CoreError>(())
/// # }).unwrap();
/// ```
///
/// # Layouts
///
/// With [`Layout::Pooled`] the database owns a fixed set of containers,
/// created once when the database is new. With [`Layout::Dedicated`] every
/// table gets its own container and opening or destroying a table runs a
/// schema upgrade.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    manager: Arc<ConnectionManager>,
    selector: Option<ShardSelector>,
    /// Tables opened through this handle (pooled layout).
    tables: Mutex<BTreeSet<String>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("layout", &self.config().layout)
            .field("state", &self.state())
            .finish()
    }
}

impl Database {
    /// Opens `name` on `engine`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Connectivity`] if the engine cannot open the database
    /// - [`CoreError::Blocked`] if another connection blocks the upgrade
    /// - [`CoreError::Codec`] if the pool size is zero
    pub async fn open(
        engine: Arc<dyn StorageEngine>,
        name: &str,
        config: Config,
    ) -> CoreResult<Self> {
        let selector = match config.layout {
            Layout::Dedicated => None,
            Layout::Pooled { store_count } => Some(ShardSelector::new(store_count)?),
        };
        let required = selector
            .as_ref()
            .map(|s| s.store_names(name).into_iter().collect())
            .unwrap_or_default();

        let manager = ConnectionManager::open(engine, name, config, required).await?;
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                manager,
                selector,
                tables: Mutex::new(BTreeSet::new()),
            }),
        })
    }

    /// Removes every trace of `name` from `engine`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Blocked`] if a connection to the database is still open.
    /// Open connections are told to let go, so a later attempt can succeed.
    pub async fn destroy(engine: &dyn StorageEngine, name: &str) -> CoreResult<()> {
        match engine.delete_database(name).await {
            Ok(()) => {
                info!(db = %name, "database destroyed");
                Ok(())
            }
            Err(EngineError::Blocked { .. }) => {
                error!(db = %name, "destroy blocked by open connection");
                Err(CoreError::Blocked {
                    name: name.to_owned(),
                    operation: "destroy",
                })
            }
            Err(e) => {
                error!(db = %name, error = %e, "destroy failed");
                Err(e.into())
            }
        }
    }

    /// The database name.
    pub fn name(&self) -> &str {
        self.inner.manager.name()
    }

    /// The configuration the database was opened with.
    pub fn config(&self) -> &Config {
        self.inner.manager.config()
    }

    /// Schema version of the live connection, if there is one.
    pub fn version(&self) -> Option<u32> {
        self.inner.manager.version()
    }

    /// Lifecycle state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    /// Returns true while a live connection is published.
    pub fn is_open(&self) -> bool {
        matches!(self.state(), ConnectionState::Open { .. })
    }

    /// Closes the database. Reopening stops for good; operations on this
    /// handle and its tables fail with [`CoreError::DatabaseClosed`].
    pub fn close(&self) {
        self.inner.manager.close();
    }

    /// Opens the table `name` keyed by `key_column`.
    ///
    /// With the dedicated layout the table's container is created first if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidTableName`] if `name` is empty or contains the
    ///   key separator
    /// - [`CoreError::Blocked`] if the container cannot be created
    pub async fn open_table<R>(&self, name: &str, key_column: &str) -> CoreResult<Table<R>>
    where
        R: Serialize + DeserializeOwned,
    {
        validate_table_name(name).map_err(|e| CoreError::for_table(name, e))?;

        let (store, keys) = match &self.inner.selector {
            Some(selector) => {
                let codec = KeyCodec::new(name).map_err(|e| CoreError::for_table(name, e))?;
                self.inner.tables.lock().insert(name.to_owned());
                (
                    selector.store_for(self.name(), name),
                    KeySpace::Shared(codec),
                )
            }
            None => {
                self.inner
                    .manager
                    .change_schema(SchemaChange::Create(name.to_owned()))
                    .await?;
                (name.to_owned(), KeySpace::Native)
            }
        };

        info!(db = %self.name(), table = %name, store = %store, "table opened");
        Ok(Table::new(
            self.clone(),
            name.to_owned(),
            key_column.to_owned(),
            store,
            keys,
        ))
    }

    /// Removes the table `name` and all its rows.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TableNotFound`] if the dedicated container is missing
    /// - [`CoreError::Blocked`] if the container cannot be deleted
    /// - [`CoreError::Query`] if clearing a pooled table fails
    pub async fn destroy_table(&self, name: &str) -> CoreResult<()> {
        validate_table_name(name).map_err(|e| CoreError::for_table(name, e))?;

        match &self.inner.selector {
            Some(selector) => {
                let codec = KeyCodec::new(name).map_err(|e| CoreError::for_table(name, e))?;
                let store = selector.store_for(self.name(), name);
                let range = codec.table_range();
                let operation = format!("destroy_table over {range} (readwrite)");

                let connection = self.connection().await?;
                let mut tx = connection
                    .transaction(&store, TransactionMode::ReadWrite, self.config().durability)
                    .await
                    .map_err(|e| CoreError::query(name, &operation, e))?;
                tx.delete(&range)
                    .await
                    .map_err(|e| CoreError::query(name, &operation, e))?;
                tx.commit()
                    .await
                    .map_err(|e| CoreError::query(name, &operation, e))?;
                self.inner.tables.lock().remove(name);
            }
            None => {
                let changed = self
                    .inner
                    .manager
                    .change_schema(SchemaChange::Delete(name.to_owned()))
                    .await?;
                if !changed {
                    return Err(CoreError::TableNotFound {
                        name: name.to_owned(),
                    });
                }
            }
        }

        info!(db = %self.name(), table = %name, "table destroyed");
        Ok(())
    }

    /// Names of the tables known to this handle, sorted.
    ///
    /// With the dedicated layout these are the database's containers, so
    /// tables created by other handles are listed too. With the pooled
    /// layout only tables opened through this handle are known.
    pub async fn table_names(&self) -> CoreResult<Vec<String>> {
        if self.inner.selector.is_some() {
            return Ok(self.inner.tables.lock().iter().cloned().collect());
        }
        let mut names = self.inner.manager.store_names().await?;
        names.sort();
        Ok(names)
    }

    /// The live connection, waiting out a reconnect in progress.
    pub(crate) async fn connection(&self) -> CoreResult<Arc<dyn Connection>> {
        self.inner.manager.ensure_open().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtable_codec::Row;
    use kvtable_engine::MemoryEngine;

    async fn open(engine: &MemoryEngine, config: Config) -> Database {
        Database::open(Arc::new(engine.clone()), "db", config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn pooled_database_creates_its_pool_once() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::new().pooled(4)).await;
        assert_eq!(engine.store_names("db").unwrap().len(), 4);
        db.close();

        let db = open(&engine, Config::new().pooled(4)).await;
        assert_eq!(db.version(), Some(1));
        assert_eq!(engine.upgrade_count("db"), 1);
    }

    #[tokio::test]
    async fn zero_pool_is_rejected() {
        let engine = MemoryEngine::new();
        let result = Database::open(Arc::new(engine), "db", Config::new().pooled(0)).await;
        assert!(matches!(result, Err(CoreError::Codec(_))));
    }

    #[tokio::test]
    async fn dedicated_tables_are_containers() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::new().dedicated()).await;
        assert_eq!(db.version(), Some(1));

        let users: Table = db.open_table("users", "id").await.unwrap();
        let _again: Table = db.open_table("users", "id").await.unwrap();
        db.open_table::<Row>("orders", "id").await.unwrap();
        assert_eq!(db.version(), Some(3));
        assert_eq!(db.table_names().await.unwrap(), vec!["orders", "users"]);

        users.put(&[Row::new().with("id", 1)]).await.unwrap();
        db.destroy_table("users").await.unwrap();
        assert_eq!(db.table_names().await.unwrap(), vec!["orders"]);
        assert!(matches!(
            db.destroy_table("users").await,
            Err(CoreError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn pooled_destroy_clears_only_that_table() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::new().pooled(1)).await;
        let a: Table = db.open_table("a", "id").await.unwrap();
        let b: Table = db.open_table("b", "id").await.unwrap();
        a.put(&[Row::new().with("id", 1)]).await.unwrap();
        b.put(&[Row::new().with("id", 1)]).await.unwrap();

        db.destroy_table("a").await.unwrap();
        assert_eq!(a.count().await.unwrap(), 0);
        assert_eq!(b.count().await.unwrap(), 1);
        assert_eq!(db.table_names().await.unwrap(), vec!["b"]);
        assert_eq!(engine.upgrade_count("db"), 1);
    }

    #[tokio::test]
    async fn bad_table_names_are_rejected() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::default()).await;
        for name in ["", "a^b"] {
            assert!(matches!(
                db.open_table::<Row>(name, "id").await,
                Err(CoreError::InvalidTableName { .. })
            ));
        }
    }

    #[tokio::test]
    async fn destroy_while_open_is_blocked() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::default()).await;
        assert!(matches!(
            Database::destroy(&engine, "db").await,
            Err(CoreError::Blocked { operation: "destroy", .. })
        ));
        db.close();
        Database::destroy(&engine, "db").await.unwrap();
        assert!(engine.store_names("db").is_none());
    }

    #[tokio::test]
    async fn closed_database_rejects_operations() {
        let engine = MemoryEngine::new();
        let db = open(&engine, Config::default()).await;
        let t: Table = db.open_table("t", "id").await.unwrap();
        db.close();
        assert!(!db.is_open());
        assert!(matches!(t.count().await, Err(CoreError::DatabaseClosed { .. })));
    }
}
