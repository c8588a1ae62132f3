//! Connection loss and schema changes seen through the table API.

use kvtable_core::{Config, ConnectionState, CoreError, Database, Row, Table};
use kvtable_engine::{MemoryEngine, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

const DELAY: Duration = Duration::from_millis(250);

async fn setup(config: Config) -> (MemoryEngine, Database, Table) {
    let engine = MemoryEngine::new();
    let db = Database::open(Arc::new(engine.clone()), "app", config.reopen_delay(DELAY))
        .await
        .unwrap();
    let table = db.open_table("events", "id").await.unwrap();
    table
        .put(&[Row::new().with("id", 1), Row::new().with("id", 2)])
        .await
        .unwrap();
    (engine, db, table)
}

#[tokio::test(start_paused = true)]
async fn operations_resume_after_engine_closes_connection() {
    for config in [Config::default(), Config::new().dedicated()] {
        let (engine, db, table) = setup(config).await;
        let upgrades = engine.upgrade_count("app");

        assert_eq!(engine.interrupt("app"), 1);
        assert_eq!(table.count().await.unwrap(), 2);
        table.put(&[Row::new().with("id", 3)]).await.unwrap();

        assert!(db.is_open());
        assert_eq!(engine.upgrade_count("app"), upgrades);
        assert_eq!(engine.connection_count("app"), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn operations_wait_while_engine_is_down() {
    let (engine, _db, table) = setup(Config::default()).await;
    engine.set_available(false);
    engine.interrupt("app");

    let pending = tokio::spawn({
        let table = table.clone();
        async move { table.get_until_last(10).await }
    });
    tokio::time::sleep(DELAY * 5).await;
    assert!(!pending.is_finished());

    engine.set_available(true);
    let rows = pending.await.unwrap().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(engine.open_count("app"), 2);
}

#[tokio::test(start_paused = true)]
async fn aborts_and_errors_trigger_reopen() {
    let (engine, db, table) = setup(Config::default()).await;

    engine.abort("app");
    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(table.count().await.unwrap(), 2);

    engine.raise_error("app", "disk hiccup");
    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(table.count().await.unwrap(), 2);

    assert_eq!(engine.open_count("app"), 3);
    assert!(matches!(db.state(), ConnectionState::Open { .. }));
}

#[tokio::test(start_paused = true)]
async fn open_wait_surfaces_connectivity() {
    let (engine, _db, table) =
        setup(Config::new().open_wait(Duration::from_millis(600))).await;
    engine.set_available(false);
    engine.interrupt("app");

    assert!(matches!(
        table.count().await,
        Err(CoreError::Connectivity { .. })
    ));
    engine.set_available(true);
    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(table.count().await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn other_handle_upgrading_the_schema_is_followed() {
    let engine = MemoryEngine::new();
    let config = Config::new().dedicated().reopen_delay(DELAY);
    let first = Database::open(Arc::new(engine.clone()), "app", config.clone())
        .await
        .unwrap();
    let events: Table = first.open_table("events", "id").await.unwrap();

    let second = Database::open(Arc::new(engine.clone()), "app", config)
        .await
        .unwrap();
    let _audit: Table = second.open_table("audit", "id").await.unwrap();
    assert_eq!(second.version(), Some(3));

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(events.count().await.unwrap(), 0);
    assert_eq!(first.version(), Some(3));
    assert_eq!(first.table_names().await.unwrap(), vec!["audit", "events"]);
}

#[tokio::test(start_paused = true)]
async fn table_destroyed_by_other_handle_stays_gone() {
    let engine = MemoryEngine::new();
    let config = Config::new().dedicated().reopen_delay(DELAY);
    let first = Database::open(Arc::new(engine.clone()), "app", config.clone())
        .await
        .unwrap();
    let audit: Table = first.open_table("audit", "id").await.unwrap();
    audit.put(&[Row::new().with("id", 1)]).await.unwrap();

    let second = Database::open(Arc::new(engine.clone()), "app", config)
        .await
        .unwrap();
    second.destroy_table("audit").await.unwrap();
    assert_eq!(second.version(), Some(3));
    let upgrades = engine.upgrade_count("app");

    tokio::time::sleep(DELAY * 8).await;
    assert_eq!(first.version(), Some(3));
    assert!(first.table_names().await.unwrap().is_empty());
    assert!(second.table_names().await.unwrap().is_empty());
    assert_eq!(engine.store_names("app").unwrap().len(), 0);
    assert_eq!(engine.upgrade_count("app"), upgrades);
    assert!(audit.count().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn destroy_detaches_open_handles() {
    let (engine, db, table) = setup(Config::default()).await;

    let blocked = Database::destroy(&engine, "app").await;
    assert!(matches!(blocked, Err(CoreError::Blocked { .. })));
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(db.state(), ConnectionState::Detached);
    assert!(matches!(table.count().await, Err(CoreError::Detached { .. })));

    Database::destroy(&engine, "app").await.unwrap();
    assert!(engine.store_names("app").is_none());
    assert!(engine.loaded_databases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn closed_database_never_reopens() {
    let (engine, db, table) = setup(Config::default()).await;
    engine.interrupt("app");
    db.close();
    tokio::time::sleep(DELAY * 4).await;

    assert_eq!(db.state(), ConnectionState::Closed);
    assert_eq!(engine.connection_count("app"), 0);
    assert!(matches!(
        table.count().await,
        Err(CoreError::DatabaseClosed { .. })
    ));

    let engine: &dyn StorageEngine = &engine;
    Database::destroy(engine, "app").await.unwrap();
}
