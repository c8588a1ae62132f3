//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases and
//! common table scenarios.

use kvtable_core::{Config, Database, Row, Table};
use kvtable_engine::{FileEngine, MemoryEngine};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Name every fixture database is opened under.
pub const TEST_DB_NAME: &str = "test";

/// A test database with its engine at hand.
///
/// `engine` is the in-memory engine behind the database (for a file
/// database, the engine holding its loaded state), so tests can inject
/// faults and read counters.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The engine, for fault injection.
    pub engine: MemoryEngine,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a database on a fresh in-memory engine.
    pub async fn memory() -> Self {
        Self::memory_with(Config::default()).await
    }

    /// Creates a database on a fresh in-memory engine with `config`.
    pub async fn memory_with(config: Config) -> Self {
        let engine = MemoryEngine::new();
        let db = Database::open(Arc::new(engine.clone()), TEST_DB_NAME, config)
            .await
            .expect("Failed to open in-memory database");
        Self {
            db,
            engine,
            temp_dir: None,
        }
    }

    /// Creates a database on a file engine in a temporary directory.
    pub async fn file() -> Self {
        Self::file_with(Config::default()).await
    }

    /// Creates a file-backed database with `config`.
    pub async fn file_with(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = FileEngine::open(temp_dir.path()).expect("Failed to open file engine");
        let memory = engine.memory().clone();
        let db = Database::open(Arc::new(engine), TEST_DB_NAME, config)
            .await
            .expect("Failed to open file database");
        Self {
            db,
            engine: memory,
            temp_dir: Some(temp_dir),
        }
    }

    /// The snapshot directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|d| d.path())
    }

    /// Opens `name` keyed by `id`.
    pub async fn table(&self, name: &str) -> Table {
        self.db
            .open_table(name, "id")
            .await
            .expect("Failed to open table")
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Rows keyed `id` = 1..=`count`, each with a `value` field.
pub fn numbered_rows(count: u32) -> Vec<Row> {
    (1..=count)
        .map(|i| Row::new().with("id", i).with("value", format!("value_{i}")))
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Opens `name` on `db` and fills it with [`numbered_rows`].
    pub async fn populated_table(db: &Database, name: &str, count: u32) -> Table {
        let table = db
            .open_table(name, "id")
            .await
            .expect("Failed to open table");
        if count > 0 {
            table
                .put(&numbered_rows(count))
                .await
                .expect("Failed to populate table");
        }
        table
    }

    /// A memory database holding one populated table per entry of `tables`.
    pub async fn populated_database(tables: &[(&str, u32)]) -> TestDatabase {
        let test_db = TestDatabase::memory().await;
        for (name, count) in tables {
            populated_table(&test_db.db, name, *count).await;
        }
        test_db
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::*;
    use super::*;

    #[tokio::test]
    async fn memory_fixture() {
        let test_db = TestDatabase::memory().await;
        assert!(test_db.path().is_none());
        assert!(test_db.is_open());
        assert_eq!(test_db.engine.connection_count(TEST_DB_NAME), 1);
    }

    #[tokio::test]
    async fn file_fixture_writes_snapshot() {
        let test_db = TestDatabase::file_with(Config::new().pooled(2)).await;
        let dir = test_db.path().unwrap().to_path_buf();
        assert!(dir.join("test.kvt").exists());
        let table = test_db.table("t").await;
        table.put(&numbered_rows(3)).await.unwrap();
        assert_eq!(table.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn populated_scenarios() {
        let test_db = populated_database(&[("a", 10), ("b", 0)]).await;
        let a = test_db.table("a").await;
        let b = test_db.table("b").await;
        assert_eq!(a.count().await.unwrap(), 10);
        assert_eq!(b.count().await.unwrap(), 0);

        let last = a.get_last_row().await.unwrap().unwrap();
        assert_eq!(last.get("value").and_then(|v| v.as_str()), Some("value_10"));
    }
}
