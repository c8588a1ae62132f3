//! Table behaviour across both layouts.

use kvtable_core::{Config, CoreError, Database, Row, Table, Value};
use kvtable_engine::{MemoryEngine, MemoryEngineConfig};
use std::sync::Arc;

fn layouts() -> [Config; 3] {
    [
        Config::new().dedicated(),
        Config::new().pooled(1),
        Config::default(),
    ]
}

async fn open_table(config: Config) -> Table {
    let db = Database::open(Arc::new(MemoryEngine::new()), "tables", config)
        .await
        .unwrap();
    db.open_table("items", "id").await.unwrap()
}

fn rows(keys: impl IntoIterator<Item = i64>) -> Vec<Row> {
    keys.into_iter()
        .map(|k| Row::new().with("id", k).with("label", format!("item {k}")))
        .collect()
}

fn keys(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

#[tokio::test]
async fn count_and_between_after_put() {
    for config in layouts() {
        let table = open_table(config).await;
        let batch = rows([7, 3, 11, 3, 5]);
        table.put(&batch).await.unwrap();

        assert_eq!(table.count().await.unwrap(), 4);
        let found = table.get_between(3_u64, 11_u64, 4).await.unwrap();
        assert_eq!(keys(&found), vec![3, 5, 7, 11]);
    }
}

#[tokio::test]
async fn later_put_replaces_row() {
    let table = open_table(Config::default()).await;
    table.put(&[Row::new().with("id", 1).with("v", "old")]).await.unwrap();
    table.put(&[Row::new().with("id", 1).with("v", "new")]).await.unwrap();

    let row = table.get(1_u64).await.unwrap().unwrap();
    assert_eq!(row.get("v").and_then(|v| v.as_str()), Some("new"));
    assert_eq!(table.count().await.unwrap(), 1);
}

#[tokio::test]
async fn clear_empties_table() {
    for config in layouts() {
        let table = open_table(config).await;
        table.put(&rows(1..=20)).await.unwrap();
        table.clear().await.unwrap();

        assert_eq!(table.count().await.unwrap(), 0);
        assert!(table.get_first_row().await.unwrap().is_none());
        assert!(table.get_last_row().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn until_last_pages_from_the_end() {
    for config in layouts() {
        let table = open_table(config).await;
        table.put(&rows(1..=10)).await.unwrap();

        assert_eq!(keys(&table.get_until_last(3).await.unwrap()), vec![8, 9, 10]);
        assert_eq!(
            keys(&table.get_until_last(100).await.unwrap()),
            (1..=10).collect::<Vec<_>>()
        );
        assert!(table.get_until_last(0).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn paging_backwards_with_get_until() {
    let table = open_table(Config::default()).await;
    table.put(&rows(1..=10)).await.unwrap();

    let mut pages = Vec::new();
    let mut cursor = 10_u64;
    loop {
        let page = table.get_until(cursor, 4).await.unwrap();
        let Some(first) = keys(&page).first().copied() else {
            break;
        };
        pages.push(keys(&page));
        if first == 1 {
            break;
        }
        cursor = u64::try_from(first - 1).unwrap();
    }
    assert_eq!(
        pages,
        vec![vec![7, 8, 9, 10], vec![3, 4, 5, 6], vec![1, 2]]
    );
}

#[tokio::test]
async fn delete_since_keeps_lower_keys() {
    for config in layouts() {
        let table = open_table(config).await;
        table.put(&rows(1..=10)).await.unwrap();
        assert_eq!(table.count().await.unwrap(), 10);

        table.delete_since(6_u64).await.unwrap();
        assert_eq!(table.count().await.unwrap(), 5);
        assert_eq!(keys(&table.get_all().await.unwrap()), vec![1, 2, 3, 4, 5]);
    }
}

#[tokio::test]
async fn string_keys_sort_after_integers() {
    for config in layouts() {
        let table = open_table(config).await;
        table
            .put(&[
                Row::new().with("id", "beta"),
                Row::new().with("id", 900),
                Row::new().with("id", "alpha"),
                Row::new().with("id", 12),
            ])
            .await
            .unwrap();

        let ids: Vec<Value> = table
            .get_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("id").cloned().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                Value::from(12),
                Value::from(900),
                Value::from("alpha"),
                Value::from("beta")
            ]
        );
        assert_eq!(
            keys(&table.get_until("a", 10).await.unwrap()),
            vec![12, 900]
        );
    }
}

#[tokio::test]
async fn tables_sharing_a_container_stay_apart() {
    let db = Database::open(
        Arc::new(MemoryEngine::new()),
        "shared",
        Config::new().pooled(1),
    )
    .await
    .unwrap();
    let a: Table = db.open_table("a", "id").await.unwrap();
    let ab: Table = db.open_table("ab", "id").await.unwrap();
    let b: Table = db.open_table("b", "id").await.unwrap();
    assert_eq!(a.store(), b.store());

    a.put(&rows(1..=3)).await.unwrap();
    ab.put(&rows(10..=12)).await.unwrap();
    b.put(&rows(100..=105)).await.unwrap();

    assert_eq!(a.count().await.unwrap(), 3);
    assert_eq!(keys(&a.get_until_last(10).await.unwrap()), vec![1, 2, 3]);
    assert_eq!(keys(&ab.get_since_first(10).await.unwrap()), vec![10, 11, 12]);
    assert_eq!(
        keys(&[b.get_first_row().await.unwrap().unwrap()]),
        vec![100]
    );

    a.clear().await.unwrap();
    assert_eq!(ab.count().await.unwrap(), 3);
    assert_eq!(b.count().await.unwrap(), 6);
}

#[tokio::test]
async fn engine_rejections_surface_after_commit() {
    let engine = MemoryEngine::with_config(MemoryEngineConfig::new().max_value_size(64));
    let db = Database::open(Arc::new(engine), "limits", Config::default())
        .await
        .unwrap();
    let table: Table = db.open_table("blobs", "id").await.unwrap();

    let mut batch = rows(1..=4);
    batch[1].insert("payload", "x".repeat(200));
    batch[3].insert("payload", "y".repeat(200));

    let err = table.put(&batch).await.unwrap_err();
    assert!(err.is_partial_write());
    assert!(matches!(err, CoreError::WriteBatch { failed: 2, total: 4, .. }));
    assert_eq!(keys(&table.get_all().await.unwrap()), vec![1, 3]);
}

#[tokio::test]
async fn typed_tables_round_trip_structs() {
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Message {
        seq: u64,
        body: String,
        read: bool,
    }

    let db = Database::open(Arc::new(MemoryEngine::new()), "chat", Config::default())
        .await
        .unwrap();
    let messages: Table<Message> = db.open_table("messages", "seq").await.unwrap();
    let sent: Vec<Message> = (1..=5)
        .map(|seq| Message {
            seq,
            body: format!("hello {seq}"),
            read: seq % 2 == 0,
        })
        .collect();
    messages.put(&sent).await.unwrap();

    assert_eq!(messages.get_until_last(2).await.unwrap(), sent[3..].to_vec());
    assert_eq!(messages.get_since(2_u64, 1).await.unwrap(), vec![sent[1].clone()]);
}

#[tokio::test]
async fn typed_floats_read_back_as_rows() {
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Price {
        id: u64,
        amount: f64,
    }

    for config in layouts() {
        let db = Database::open(Arc::new(MemoryEngine::new()), "shop", config)
            .await
            .unwrap();
        let prices: Table<Price> = db.open_table("prices", "id").await.unwrap();
        prices.put(&[Price { id: 1, amount: 9.99 }]).await.unwrap();

        let rows: Table = db.open_table("prices", "id").await.unwrap();
        let all = rows.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("amount"), Some(&Value::Float(9.99)));

        rows.put(&[Row::new().with("id", 2).with("amount", 0.25)])
            .await
            .unwrap();
        assert_eq!(
            prices.get_last_row().await.unwrap(),
            Some(Price { id: 2, amount: 0.25 })
        );
    }
}
