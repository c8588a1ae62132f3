//! Destroy command implementation.

use super::{CliError, Target};
use kvtable_core::Database;
use tracing::info;

/// Runs the destroy command.
pub async fn run(target: &Target) -> Result<(), CliError> {
    let engine = target.engine()?;
    Database::destroy(engine.as_ref(), &target.database).await?;
    info!(db = %target.database, dir = %target.dir.display(), "snapshot removed");
    Ok(())
}
