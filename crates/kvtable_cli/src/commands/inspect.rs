//! Inspect command implementation.

use super::{CliError, Format, Target};
use kvtable_engine::{Durability, StorageEngine, Transaction, TransactionMode, SNAPSHOT_EXTENSION};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database name.
    pub database: String,
    /// Snapshot file.
    pub path: String,
    /// Snapshot size in bytes.
    pub size: u64,
    /// Schema version.
    pub version: u32,
    /// Total rows across all containers.
    pub row_count: u64,
    /// Per-container statistics.
    pub stores: Vec<StoreStats>,
}

/// Statistics for a single container.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Container name.
    pub name: String,
    /// Number of rows.
    pub row_count: u64,
    /// Tables found in a shared container (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableStats>>,
}

/// Rows of one table inside a shared container.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of rows.
    pub row_count: u64,
}

/// Collects statistics for the target database.
pub async fn collect(target: &Target, show_tables: bool) -> Result<InspectResult, CliError> {
    let engine = target.engine()?;
    let path = engine
        .dir()
        .join(format!("{}.{SNAPSHOT_EXTENSION}", target.database));
    let size = std::fs::metadata(&path)?.len();

    let opened = engine.open(&target.database, None, None).await?;
    let connection = opened.connection;
    let mut stores = Vec::new();
    for name in connection.store_names() {
        let mut tx = connection
            .transaction(&name, TransactionMode::ReadOnly, Durability::Default)
            .await?;
        let row_count = tx.count(None).await?;
        let tables = if show_tables {
            Some(shared_tables(tx.as_mut()).await?)
        } else {
            None
        };
        stores.push(StoreStats {
            name,
            row_count,
            tables,
        });
    }
    let version = connection.version();
    connection.close();

    Ok(InspectResult {
        database: target.database.clone(),
        path: path.display().to_string(),
        size,
        version,
        row_count: stores.iter().map(|s| s.row_count).sum(),
        stores,
    })
}

/// Groups the composite keys of a shared container by table.
async fn shared_tables(tx: &mut dyn Transaction) -> Result<Vec<TableStats>, CliError> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in tx.get_all(None, None).await? {
        if let Ok((table, _)) = kvtable_codec::decode(&record.key) {
            *counts.entry(table).or_default() += 1;
        }
    }
    Ok(counts
        .into_iter()
        .map(|(name, row_count)| TableStats { name, row_count })
        .collect())
}

/// Runs the inspect command.
pub async fn run(
    target: &Target,
    show_tables: bool,
    format: Format,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let result = collect(target, show_tables).await?;
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Database: {}", result.database)?;
    writeln!(out, "Path:     {}", result.path)?;
    writeln!(out, "Size:     {}", format_size(result.size))?;
    writeln!(out, "Version:  {}", result.version)?;
    writeln!(out, "Rows:     {}", result.row_count)?;
    writeln!(out)?;
    writeln!(out, "Stores:")?;
    for store in &result.stores {
        writeln!(out, "  {:<24} {:>10} rows", store.name, store.row_count)?;
        for table in store.tables.iter().flatten() {
            writeln!(out, "    {:<22} {:>10} rows", table.name, table.row_count)?;
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
