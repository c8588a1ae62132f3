//! CLI command implementations.

pub mod destroy;
pub mod inspect;
pub mod list;
pub mod rows;

use clap::ValueEnum;
use kvtable_core::{Config, CoreError, Layout};
use kvtable_engine::{EngineError, FileEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The directory holds no database of that name.
    #[error("no database '{name}' in {}", dir.display())]
    DatabaseNotFound {
        /// Snapshot directory.
        dir: PathBuf,
        /// Database name.
        name: String,
    },

    /// The dedicated container for a table is missing.
    #[error("no table '{name}' in database '{database}'")]
    TableNotFound {
        /// Database name.
        database: String,
        /// Table name.
        name: String,
    },

    /// Table layer failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Output encoding failure.
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Output write failure.
    #[error("output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// JSON.
    Json,
}

/// A database inside a snapshot directory.
#[derive(Debug, Clone)]
pub struct Target {
    /// Snapshot directory.
    pub dir: PathBuf,
    /// Database name.
    pub database: String,
    /// Table layout the database was written with.
    pub layout: Layout,
}

impl Target {
    /// Opens the directory and checks that the database exists.
    pub fn engine(&self) -> Result<Arc<FileEngine>, CliError> {
        let engine = open_engine(&self.dir)?;
        ensure_exists(&engine, &self.database)?;
        Ok(engine)
    }

    /// Configuration matching the database's layout.
    pub fn config(&self) -> Config {
        Config::new().layout(self.layout)
    }
}

/// Opens the snapshot directory.
pub fn open_engine(dir: &Path) -> Result<Arc<FileEngine>, CliError> {
    Ok(Arc::new(FileEngine::open(dir)?))
}

/// Fails unless `name` is persisted in the engine's directory.
pub fn ensure_exists(engine: &FileEngine, name: &str) -> Result<(), CliError> {
    if engine.database_names()?.iter().any(|n| n == name) {
        Ok(())
    } else {
        Err(CliError::DatabaseNotFound {
            dir: engine.dir().to_path_buf(),
            name: name.to_owned(),
        })
    }
}
