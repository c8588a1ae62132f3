//! Tables on the file engine survive a restart.

use kvtable_core::{Config, Database, Durability, Row, Table};
use kvtable_engine::FileEngine;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn rows_survive_restart() {
    let dir = tempdir().unwrap();
    let config = Config::new().pooled(4).durability(Durability::Strict);

    {
        let engine = Arc::new(FileEngine::open(dir.path()).unwrap());
        let db = Database::open(engine, "journal", config.clone()).await.unwrap();
        let entries: Table = db.open_table("entries", "id").await.unwrap();
        let rows: Vec<Row> = (1..=25)
            .map(|i| Row::new().with("id", i).with("text", format!("entry {i}")))
            .collect();
        entries.put(&rows).await.unwrap();
        entries.delete_until(5_u64).await.unwrap();
        db.close();
    }

    let engine = Arc::new(FileEngine::open(dir.path()).unwrap());
    assert_eq!(engine.database_names().unwrap(), vec!["journal"]);

    let db = Database::open(engine.clone(), "journal", config).await.unwrap();
    let entries: Table = db.open_table("entries", "id").await.unwrap();
    assert_eq!(entries.count().await.unwrap(), 20);
    let last = entries.get_last_row().await.unwrap().unwrap();
    assert_eq!(last.get("text").and_then(|v| v.as_str()), Some("entry 25"));
    assert_eq!(engine.memory().upgrade_count("journal"), 0);

    db.close();
    Database::destroy(engine.as_ref(), "journal").await.unwrap();
    assert!(engine.database_names().unwrap().is_empty());
}

#[tokio::test]
async fn dedicated_tables_survive_restart() {
    let dir = tempdir().unwrap();
    let config = Config::new().dedicated();

    {
        let engine = Arc::new(FileEngine::open(dir.path()).unwrap());
        let db = Database::open(engine, "shop", config.clone()).await.unwrap();
        let orders: Table = db.open_table("orders", "sku").await.unwrap();
        orders
            .put(&[Row::new().with("sku", "a-1"), Row::new().with("sku", "b-2")])
            .await
            .unwrap();
        db.close();
    }

    let engine = Arc::new(FileEngine::open(dir.path()).unwrap());
    let db = Database::open(engine, "shop", config).await.unwrap();
    assert_eq!(db.version(), Some(2));
    assert_eq!(db.table_names().await.unwrap(), vec!["orders"]);
    let orders: Table = db.open_table("orders", "sku").await.unwrap();
    assert_eq!(db.version(), Some(2));
    assert!(orders.get("b-2").await.unwrap().is_some());
}
