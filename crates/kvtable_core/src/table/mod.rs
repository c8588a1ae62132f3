//! Typed tables and the range/pagination engine.

mod keyspace;

pub(crate) use keyspace::KeySpace;

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use keyspace::window;
use kvtable_codec::{CodecError, Row, RowCodec};
use kvtable_engine::{
    Direction, EngineError, Key, KeyRange, Record, Transaction, TransactionMode,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, trace, warn};

/// A named table of rows keyed by one column.
///
/// `Table<R>` stores any serde type `R` that serializes to a map containing
/// the key column; the default is the dynamic [`Row`]. The key column holds
/// a non-negative integer up to [`kvtable_codec::MAX_INTEGER_KEY`] or a
/// string.
///
/// A table holds no connection of its own. Every operation asks the
/// [`Database`] for the live connection and runs in a fresh transaction
/// over the table's container, so tables keep working across reconnects.
/// An operation that was already running when the connection dropped fails
/// with [`CoreError::Query`]; retrying it is up to the caller.
///
/// # Ranges
///
/// - `since(k)` covers keys `>= k`
/// - `until(k)` covers keys `<= k`
/// - `between(a, b)` covers keys in `[a, b]`
///
/// Rows always come back in ascending key order. A `limit` of 0 yields no
/// rows.
///
/// # Example
///
/// ```rust
/// use kvtable_core::{Config, Database, Row};
/// use kvtable_engine::MemoryEngine;
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let db = Database::open(Arc::new(MemoryEngine::new()), "app", Config::default()).await?;
/// let events = db.open_table::<Row>("events", "id").await?;
///
/// let rows: Vec<Row> = (1..=10).map(|i| Row::new().with("id", i)).collect();
/// events.put(&rows).await?;
///
/// let newest = events.get_until_last(3).await?;
/// assert_eq!(newest.len(), 3);
/// # Ok::<(), kvtable_core::CoreError>(())
/// # }).unwrap();
/// ```
pub struct Table<R = Row> {
    db: Database,
    name: String,
    store: String,
    keys: KeySpace,
    rows: RowCodec,
    _row: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            name: self.name.clone(),
            store: self.store.clone(),
            keys: self.keys.clone(),
            rows: self.rows.clone(),
            _row: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("key_column", &self.rows.key_column())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<R> Table<R> {
    pub(crate) fn new(
        db: Database,
        name: String,
        key_column: String,
        store: String,
        keys: KeySpace,
    ) -> Self {
        Self {
            db,
            name,
            store,
            keys,
            rows: RowCodec::new(key_column),
            _row: PhantomData,
        }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key column.
    pub fn key_column(&self) -> &str {
        self.rows.key_column()
    }

    /// The physical container holding the table.
    pub fn store(&self) -> &str {
        &self.store
    }

    /// The database the table belongs to.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl<R: Serialize + DeserializeOwned> Table<R> {
    /// Writes `rows`, replacing rows with the same key.
    ///
    /// Every row is validated before anything is written. The rows are
    /// then written in one transaction; rows the engine rejects are counted
    /// and the rest are committed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidRow`] / [`CoreError::InvalidKey`] if any row
    ///   lacks a usable key; nothing is written
    /// - [`CoreError::WriteBatch`] if the engine rejected some rows; all
    ///   other rows were written
    /// - [`CoreError::Query`] if the transaction failed; nothing is written
    pub async fn put(&self, rows: &[R]) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let entries = rows
            .iter()
            .map(|row| {
                let (key, bytes) = self.rows.encode(row)?;
                Ok((self.keys.encode(&key)?, bytes))
            })
            .collect::<Result<Vec<_>, CodecError>>()
            .map_err(|e| self.invalid(e))?;

        let total = entries.len();
        let operation = format!("put of {total} rows (readwrite)");
        let mut tx = self.begin(TransactionMode::ReadWrite, &operation).await?;
        let mut failed = 0;
        for (key, value) in entries {
            match tx.put(key, value).await {
                Ok(()) => {}
                Err(EngineError::Constraint(reason)) => {
                    failed += 1;
                    debug!(table = %self.name, %reason, "row rejected");
                }
                Err(e) => return Err(self.query(&operation, e)),
            }
        }
        tx.commit().await.map_err(|e| self.query(&operation, e))?;

        if failed > 0 {
            warn!(table = %self.name, failed, total, "batch partially written");
            return Err(CoreError::WriteBatch {
                table: self.name.clone(),
                failed,
                total,
            });
        }
        trace!(table = %self.name, total, "batch written");
        Ok(())
    }

    /// Deletes every row, keeping the container.
    pub async fn clear(&self) -> CoreResult<()> {
        let range = self.keys.whole();
        let operation = describe("clear", &range, None, TransactionMode::ReadWrite);
        let mut tx = self.begin(TransactionMode::ReadWrite, &operation).await?;
        let result = match self.keys {
            KeySpace::Native => tx.clear().await,
            KeySpace::Shared(_) => tx.delete(&range).await,
        };
        result.map_err(|e| self.query(&operation, e))?;
        tx.commit().await.map_err(|e| self.query(&operation, e))
    }

    /// Deletes rows with keys `>= key`.
    pub async fn delete_since(&self, key: impl Into<Key>) -> CoreResult<()> {
        let range = self.keys.since(&key.into()).map_err(|e| self.invalid(e))?;
        self.delete_range("delete_since", range).await
    }

    /// Deletes rows with keys `<= key`.
    pub async fn delete_until(&self, key: impl Into<Key>) -> CoreResult<()> {
        let range = self.keys.until(&key.into()).map_err(|e| self.invalid(e))?;
        self.delete_range("delete_until", range).await
    }

    /// Deletes rows with keys in `[from, to]`.
    pub async fn delete_between(&self, from: impl Into<Key>, to: impl Into<Key>) -> CoreResult<()> {
        let range = self
            .keys
            .between(&from.into(), &to.into())
            .map_err(|e| self.invalid(e))?;
        self.delete_range("delete_between", range).await
    }

    /// Up to `limit` rows with keys `>= key`, the smallest first.
    pub async fn get_since(&self, key: impl Into<Key>, limit: u32) -> CoreResult<Vec<R>> {
        let range = self.keys.since(&key.into()).map_err(|e| self.invalid(e))?;
        self.read_range("get_since", &range, Some(limit)).await
    }

    /// Up to `limit` rows with keys in `[from, to]`, the smallest first.
    pub async fn get_between(
        &self,
        from: impl Into<Key>,
        to: impl Into<Key>,
        limit: u32,
    ) -> CoreResult<Vec<R>> {
        let range = self
            .keys
            .between(&from.into(), &to.into())
            .map_err(|e| self.invalid(e))?;
        self.read_range("get_between", &range, Some(limit)).await
    }

    /// The first `limit` rows of the table.
    pub async fn get_since_first(&self, limit: u32) -> CoreResult<Vec<R>> {
        self.read_range("get_since_first", &self.keys.whole(), Some(limit))
            .await
    }

    /// The last `limit` rows with keys `<= key`, in ascending order.
    pub async fn get_until(&self, key: impl Into<Key>, limit: u32) -> CoreResult<Vec<R>> {
        let range = self.keys.until(&key.into()).map_err(|e| self.invalid(e))?;
        self.read_last("get_until", &range, limit).await
    }

    /// The last `limit` rows of the table, in ascending order.
    pub async fn get_until_last(&self, limit: u32) -> CoreResult<Vec<R>> {
        self.read_last("get_until_last", &self.keys.whole(), limit)
            .await
    }

    /// The row with the smallest key.
    pub async fn get_first_row(&self) -> CoreResult<Option<R>> {
        self.edge_row("get_first_row", Direction::Forward).await
    }

    /// The row with the greatest key.
    pub async fn get_last_row(&self) -> CoreResult<Option<R>> {
        self.edge_row("get_last_row", Direction::Reverse).await
    }

    /// Number of rows.
    pub async fn count(&self) -> CoreResult<u64> {
        let range = self.keys.whole();
        let operation = describe("count", &range, None, TransactionMode::ReadOnly);
        let mut tx = self.begin(TransactionMode::ReadOnly, &operation).await?;
        tx.count(Some(&range))
            .await
            .map_err(|e| self.query(&operation, e))
    }

    /// Every row, in ascending key order.
    pub async fn get_all(&self) -> CoreResult<Vec<R>> {
        self.read_range("get_all", &self.keys.whole(), None).await
    }

    /// The row stored under `key`.
    pub async fn get(&self, key: impl Into<Key>) -> CoreResult<Option<R>> {
        let range = self.keys.only(&key.into()).map_err(|e| self.invalid(e))?;
        let mut rows = self.read_range("get", &range, Some(1)).await?;
        Ok(rows.pop())
    }

    async fn delete_range(&self, op: &str, range: KeyRange) -> CoreResult<()> {
        let operation = describe(op, &range, None, TransactionMode::ReadWrite);
        let mut tx = self.begin(TransactionMode::ReadWrite, &operation).await?;
        tx.delete(&range)
            .await
            .map_err(|e| self.query(&operation, e))?;
        tx.commit().await.map_err(|e| self.query(&operation, e))
    }

    async fn read_range(
        &self,
        op: &str,
        range: &KeyRange,
        limit: Option<u32>,
    ) -> CoreResult<Vec<R>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let operation = describe(op, range, limit, TransactionMode::ReadOnly);
        trace!(table = %self.name, %operation, "bulk read");
        let mut tx = self.begin(TransactionMode::ReadOnly, &operation).await?;
        let records = tx
            .get_all(Some(range), limit)
            .await
            .map_err(|e| self.query(&operation, e))?;
        self.decode_all(records)
    }

    /// Reads the last `limit` rows of `range` in two engine calls.
    ///
    /// A reverse cursor placed on the top of the range is advanced
    /// `limit - 1` rows to find the lowest key of the window; one bulk read
    /// then fetches `[edge, top]`. If the cursor runs off the start, the
    /// window is the whole range.
    async fn read_last(&self, op: &str, range: &KeyRange, limit: u32) -> CoreResult<Vec<R>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let operation = describe(op, range, Some(limit), TransactionMode::ReadOnly);
        let mut tx = self.begin(TransactionMode::ReadOnly, &operation).await?;
        let cursor = tx
            .open_cursor(Some(range), Direction::Reverse)
            .await
            .map_err(|e| self.query(&operation, e))?;
        let Some(mut cursor) = cursor else {
            return Ok(Vec::new());
        };
        if limit == 1 {
            return Ok(vec![self.decode(cursor.value())?]);
        }

        let edge = if cursor
            .advance(limit - 1)
            .await
            .map_err(|e| self.query(&operation, e))?
        {
            Some(cursor.key().clone())
        } else {
            None
        };
        drop(cursor);

        let window = window(range, edge);
        debug!(table = %self.name, %window, limit, "window resolved");
        let records = tx
            .get_all(Some(&window), None)
            .await
            .map_err(|e| self.query(&operation, e))?;
        self.decode_all(records)
    }

    async fn edge_row(&self, op: &str, direction: Direction) -> CoreResult<Option<R>> {
        let range = self.keys.whole();
        let operation = describe(op, &range, Some(1), TransactionMode::ReadOnly);
        let mut tx = self.begin(TransactionMode::ReadOnly, &operation).await?;
        let cursor = tx
            .open_cursor(Some(&range), direction)
            .await
            .map_err(|e| self.query(&operation, e))?;
        cursor.map(|c| self.decode(c.value())).transpose()
    }

    async fn begin(
        &self,
        mode: TransactionMode,
        operation: &str,
    ) -> CoreResult<Box<dyn Transaction>> {
        let connection = self.db.connection().await?;
        connection
            .transaction(&self.store, mode, self.db.config().durability)
            .await
            .map_err(|e| self.query(operation, e))
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<R> {
        Ok(self.rows.decode(bytes)?)
    }

    fn decode_all(&self, records: Vec<Record>) -> CoreResult<Vec<R>> {
        records.iter().map(|r| self.decode(&r.value)).collect()
    }

    fn query(&self, operation: &str, source: EngineError) -> CoreError {
        CoreError::query(&self.name, operation, source)
    }

    fn invalid(&self, err: CodecError) -> CoreError {
        CoreError::for_table(&self.name, err)
    }
}

fn describe(op: &str, range: &KeyRange, limit: Option<u32>, mode: TransactionMode) -> String {
    let mode = match mode {
        TransactionMode::ReadOnly => "readonly",
        TransactionMode::ReadWrite => "readwrite",
    };
    match limit {
        Some(limit) => format!("{op} over {range} limit {limit} ({mode})"),
        None => format!("{op} over {range} ({mode})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use kvtable_codec::Value;
    use kvtable_engine::{MemoryEngine, MemoryEngineConfig};
    use std::sync::Arc;

    async fn table(config: Config) -> Table {
        let db = Database::open(Arc::new(MemoryEngine::new()), "db", config)
            .await
            .unwrap();
        db.open_table("t", "id").await.unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
            .collect()
    }

    fn numbered(keys: impl IntoIterator<Item = i64>) -> Vec<Row> {
        keys.into_iter().map(|i| Row::new().with("id", i)).collect()
    }

    #[test]
    fn descriptions_name_range_limit_and_mode() {
        let range = KeyRange::lower_bound(Key::Integer(4), false);
        assert_eq!(
            describe("get_since", &range, Some(10), TransactionMode::ReadOnly),
            "get_since over [4, +inf) limit 10 (readonly)"
        );
    }

    #[tokio::test]
    async fn until_last_windows() {
        for config in [Config::new().dedicated(), Config::new().pooled(4)] {
            let t = table(config).await;
            t.put(&numbered(1..=10)).await.unwrap();
            assert_eq!(ids(&t.get_until_last(3).await.unwrap()), vec![8, 9, 10]);
            assert_eq!(ids(&t.get_until_last(100).await.unwrap()).len(), 10);
            assert!(t.get_until_last(0).await.unwrap().is_empty());
            assert_eq!(ids(&t.get_until_last(1).await.unwrap()), vec![10]);
            assert_eq!(ids(&t.get_until(5_u64, 2).await.unwrap()), vec![4, 5]);
            assert_eq!(ids(&t.get_until(5_u64, 9).await.unwrap()), vec![1, 2, 3, 4, 5]);
        }
    }

    #[tokio::test]
    async fn until_on_missing_key_uses_greatest_below() {
        let t = table(Config::default()).await;
        t.put(&numbered([2, 4, 6])).await.unwrap();
        assert_eq!(ids(&t.get_until(5_u64, 1).await.unwrap()), vec![4]);
        assert!(t.get_until(1_u64, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forward_reads() {
        let t = table(Config::default()).await;
        t.put(&numbered(1..=10)).await.unwrap();
        assert_eq!(ids(&t.get_since(4_u64, 3).await.unwrap()), vec![4, 5, 6]);
        assert_eq!(ids(&t.get_between(3_u64, 5_u64, 10).await.unwrap()), vec![3, 4, 5]);
        assert!(t.get_between(5_u64, 3_u64, 10).await.unwrap().is_empty());
        assert_eq!(ids(&t.get_since_first(2).await.unwrap()), vec![1, 2]);
        assert!(t.get_since(1_u64, 0).await.unwrap().is_empty());
        assert_eq!(t.get_all().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn point_reads_and_edges() {
        let t = table(Config::default()).await;
        assert!(t.get_first_row().await.unwrap().is_none());
        t.put(&[Row::new().with("id", "b"), Row::new().with("id", 7)])
            .await
            .unwrap();
        let first = t.get_first_row().await.unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&Value::from(7)));
        let last = t.get_last_row().await.unwrap().unwrap();
        assert_eq!(last.get("id"), Some(&Value::from("b")));
        assert!(t.get("b").await.unwrap().is_some());
        assert!(t.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deletes() {
        let t = table(Config::default()).await;
        t.put(&numbered(1..=10)).await.unwrap();
        t.delete_between(3_u64, 4_u64).await.unwrap();
        assert_eq!(t.count().await.unwrap(), 8);
        t.delete_until(2_u64).await.unwrap();
        assert_eq!(ids(&t.get_since_first(1).await.unwrap()), vec![5]);
        t.delete_since(9_u64).await.unwrap();
        assert_eq!(ids(&t.get_all().await.unwrap()), vec![5, 6, 7, 8]);
        t.clear().await.unwrap();
        assert_eq!(t.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_rows_write_nothing() {
        let t = table(Config::default()).await;
        let rows = vec![Row::new().with("id", 1), Row::new().with("name", "no key")];
        assert!(matches!(
            t.put(&rows).await,
            Err(CoreError::InvalidRow { .. })
        ));
        let rows = vec![Row::new().with("id", 1), Row::new().with("id", -5)];
        assert!(matches!(
            t.put(&rows).await,
            Err(CoreError::InvalidKey { .. })
        ));
        assert_eq!(t.count().await.unwrap(), 0);
        assert!(matches!(
            t.get_since(2_000_000_000_u64, 1).await,
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_rows_are_counted() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig::new().max_value_size(40));
        let db = Database::open(Arc::new(engine), "db", Config::default())
            .await
            .unwrap();
        let t: Table = db.open_table("t", "id").await.unwrap();
        let rows = vec![
            Row::new().with("id", 1),
            Row::new().with("id", 2).with("blob", "x".repeat(100)),
            Row::new().with("id", 3),
        ];
        match t.put(&rows).await {
            Err(CoreError::WriteBatch { failed, total, .. }) => {
                assert_eq!((failed, total), (1, 3));
            }
            other => panic!("expected WriteBatch, got {other:?}"),
        }
        assert_eq!(ids(&t.get_all().await.unwrap()), vec![1, 3]);
    }

    #[tokio::test]
    async fn typed_rows() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Reading {
            ts: u64,
            value: i64,
        }

        let db = Database::open(Arc::new(MemoryEngine::new()), "db", Config::default())
            .await
            .unwrap();
        let readings: Table<Reading> = db.open_table("readings", "ts").await.unwrap();
        readings
            .put(&[Reading { ts: 20, value: 2 }, Reading { ts: 10, value: 1 }])
            .await
            .unwrap();
        assert_eq!(
            readings.get_first_row().await.unwrap(),
            Some(Reading { ts: 10, value: 1 })
        );
    }
}
