//! Row commands: count, head, tail and get.

use super::{CliError, Format, Target};
use kvtable_core::{Database, Key, Layout, Row, Table};
use std::io::Write;

/// Which rows to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The first `n` rows.
    Head(u32),
    /// The last `n` rows.
    Tail(u32),
    /// The row under one key.
    Key(Key),
}

/// Parses a key argument: digits become an integer key, anything else a
/// string key.
pub fn parse_key(raw: &str) -> Key {
    match raw.parse::<u64>() {
        Ok(n) => Key::Integer(n),
        Err(_) => Key::from(raw),
    }
}

async fn open_table(target: &Target, table: &str, key_column: &str) -> Result<(Database, Table), CliError> {
    let engine = target.engine()?;
    let db = Database::open(engine, &target.database, target.config()).await?;
    if target.layout == Layout::Dedicated && !db.table_names().await?.iter().any(|t| t == table) {
        db.close();
        return Err(CliError::TableNotFound {
            database: target.database.clone(),
            name: table.to_owned(),
        });
    }
    let table = db.open_table(table, key_column).await?;
    Ok((db, table))
}

/// Number of rows in `table`.
pub async fn count(target: &Target, table: &str) -> Result<u64, CliError> {
    let (db, table) = open_table(target, table, "id").await?;
    let count = table.count().await;
    db.close();
    Ok(count?)
}

/// Reads the selected rows of `table`.
pub async fn read(
    target: &Target,
    table: &str,
    key_column: &str,
    selection: &Selection,
) -> Result<Vec<Row>, CliError> {
    let (db, table) = open_table(target, table, key_column).await?;
    let rows = match selection {
        Selection::Head(n) => table.get_since_first(*n).await,
        Selection::Tail(n) => table.get_until_last(*n).await,
        Selection::Key(key) => table.get(key.clone()).await.map(|r| r.into_iter().collect()),
    };
    db.close();
    Ok(rows?)
}

/// Writes `rows` in `format`: one JSON object per line, or a JSON array.
pub fn print_rows(rows: &[Row], format: Format, out: &mut impl Write) -> Result<(), CliError> {
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(rows)?)?,
        Format::Text => {
            for row in rows {
                writeln!(out, "{}", serde_json::to_string(row)?)?;
            }
        }
    }
    Ok(())
}
