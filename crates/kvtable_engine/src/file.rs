//! File-backed storage engine.

use crate::backend::{Durability, Opened, StorageEngine, UpgradeHandler};
use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use crate::memory::{MemoryEngine, MemoryEngineConfig, SnapshotStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension used for database snapshots.
pub const SNAPSHOT_EXTENSION: &str = "kvt";

/// Persisted image of one database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub version: u32,
    pub stores: BTreeMap<String, Vec<(Key, Vec<u8>)>>,
}

/// An engine that keeps databases in memory and persists them to a directory.
///
/// Each database is stored as `<dir>/<name>.kvt`, a CBOR image of its
/// version and containers. The image is rewritten atomically (temporary
/// file, then rename) after every schema upgrade and every read-write commit
/// that changed data.
///
/// # Durability
///
/// - [`Durability::Strict`] and [`Durability::Default`] sync the file before
///   the commit resolves
/// - [`Durability::Relaxed`] leaves flushing to the OS
///
/// Snapshots are written with blocking I/O on the committing task, one at
/// a time, so commits to a database are serialized by the file write. This
/// suits tests, tooling and small datasets, not write-heavy services.
///
/// # Example
///
/// ```no_run
/// use kvtable_engine::{FileEngine, StorageEngine};
/// use std::path::Path;
///
/// # async fn run() -> kvtable_engine::EngineResult<()> {
/// let engine = FileEngine::open(Path::new("data"))?;
/// let opened = engine.open("app", None, None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileEngine {
    dir: PathBuf,
    inner: MemoryEngine,
}

impl FileEngine {
    /// Opens a snapshot directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> EngineResult<Self> {
        Self::with_config(dir, MemoryEngineConfig::default())
    }

    /// Opens a snapshot directory with custom limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_config(dir: &Path, config: MemoryEngineConfig) -> EngineResult<Self> {
        fs::create_dir_all(dir)?;
        let store = SnapshotDir {
            dir: dir.to_path_buf(),
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            inner: MemoryEngine::with_snapshots(config, Box::new(store)),
        })
    }

    /// Returns the snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the databases persisted in the directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn database_names(&self) -> EngineResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// The in-memory engine holding loaded databases, for fault injection
    /// and inspection.
    pub fn memory(&self) -> &MemoryEngine {
        &self.inner
    }
}

#[async_trait]
impl StorageEngine for FileEngine {
    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<Opened> {
        self.inner.open(name, version, upgrade).await
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        self.inner.delete_database(name).await
    }
}

struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    fn path(&self, name: &str) -> EngineResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(EngineError::constraint(format!(
                "database name '{name}' cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{name}.{SNAPSHOT_EXTENSION}")))
    }
}

impl SnapshotStore for SnapshotDir {
    fn load(&self, name: &str) -> EngineResult<Option<Snapshot>> {
        let path = self.path(name)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = ciborium::from_reader(BufReader::new(file))
            .map_err(|e| EngineError::Corrupted(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), version = snapshot.version, "loaded snapshot");
        Ok(Some(snapshot))
    }

    fn save(&self, name: &str, snapshot: &Snapshot, durability: Durability) -> EngineResult<()> {
        let path = self.path(name)?;
        let temp = path.with_extension(format!("{SNAPSHOT_EXTENSION}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            ciborium::into_writer(snapshot, &mut writer)
                .map_err(|e| std::io::Error::new(ErrorKind::Other, e.to_string()))?;
            writer.flush()?;
            if durability != Durability::Relaxed {
                writer.get_ref().sync_all()?;
            }
        }
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> EngineResult<()> {
        match fs::remove_file(self.path(name)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
