//! The self-healing connection manager.

use super::state::{ConnectionState, Effect, Signal};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use kvtable_engine::{
    Connection, EngineError, EngineEvent, EngineResult, Opened, StorageEngine, UpgradeHandler,
    UpgradeTransaction,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A structural change applied in a version-bumping upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SchemaChange {
    Create(String),
    Delete(String),
}

#[derive(Clone)]
struct Live {
    generation: u64,
    connection: Arc<dyn Connection>,
}

/// Owns the single live connection to one database.
///
/// The engine may close the connection, abort it, raise errors on it or
/// announce a schema change from elsewhere. The manager reacts through the
/// [`ConnectionState`] machine: it drops the stale handle, waits
/// `reopen_delay` and reopens, forever, until [`ConnectionManager::close`].
/// Only one open attempt runs at a time.
pub(crate) struct ConnectionManager {
    name: String,
    engine: Arc<dyn StorageEngine>,
    config: Config,
    state: Mutex<ConnectionState>,
    live: watch::Sender<Option<Live>>,
    required: BTreeSet<String>,
    open_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    reopening: AtomicBool,
    this: Weak<ConnectionManager>,
}

impl ConnectionManager {
    /// Opens `name` and returns its manager.
    ///
    /// `required` lists the fixed containers that must exist; they are
    /// created in the upgrade transaction of a new database and replayed on
    /// reopen. Containers added later through [`Self::change_schema`] are
    /// not: after a reopen the handle adopts whatever the engine holds.
    pub(crate) async fn open(
        engine: Arc<dyn StorageEngine>,
        name: &str,
        config: Config,
        required: BTreeSet<String>,
    ) -> CoreResult<Arc<Self>> {
        let manager = Arc::new_cyclic(|this| Self {
            name: name.to_owned(),
            engine,
            config,
            state: Mutex::new(ConnectionState::Connecting),
            live: watch::Sender::new(None),
            required,
            open_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            reopening: AtomicBool::new(false),
            this: this.clone(),
        });

        {
            let _guard = manager.open_lock.lock().await;
            manager.connect_locked().await.map_err(|e| {
                tracing::error!(db = %manager.name, error = %e, "open failed");
                match e {
                    EngineError::Blocked { name } => CoreError::Blocked {
                        name,
                        operation: "open",
                    },
                    other => CoreError::Connectivity {
                        name: manager.name.clone(),
                        message: other.to_string(),
                    },
                }
            })?;
        }
        info!(db = %manager.name, version = ?manager.version(), "database opened");
        Ok(manager)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Schema version of the live handle.
    pub(crate) fn version(&self) -> Option<u32> {
        self.current().map(|live| live.connection.version())
    }

    /// Returns the live handle, waiting out a reopen in progress.
    pub(crate) async fn ensure_open(&self) -> CoreResult<Arc<dyn Connection>> {
        match self.config.open_wait {
            None => self.wait_open().await,
            Some(limit) => tokio::time::timeout(limit, self.wait_open())
                .await
                .map_err(|_| CoreError::Connectivity {
                    name: self.name.clone(),
                    message: format!("no connection within {limit:?}"),
                })?,
        }
    }

    async fn wait_open(&self) -> CoreResult<Arc<dyn Connection>> {
        let mut rx = self.live.subscribe();
        loop {
            self.ensure_usable()?;
            let current = rx.borrow_and_update().clone();
            if let Some(live) = current {
                if !live.connection.is_closed() {
                    return Ok(live.connection);
                }
            }
            if rx.changed().await.is_err() {
                return Err(CoreError::DatabaseClosed {
                    name: self.name.clone(),
                });
            }
        }
    }

    fn ensure_usable(&self) -> CoreResult<()> {
        let state = self.state();
        if !state.is_terminal() {
            return Ok(());
        }
        let name = self.name.clone();
        Err(match state {
            ConnectionState::Detached => CoreError::Detached { name },
            _ => CoreError::DatabaseClosed { name },
        })
    }

    /// Closes the connection for good. Pending operations fail with
    /// [`CoreError::DatabaseClosed`].
    pub(crate) fn close(&self) {
        self.apply(Signal::Close);
        info!(db = %self.name, "database closed");
    }

    /// Containers the live handle exposes.
    pub(crate) async fn store_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.ensure_open().await?.store_names())
    }

    /// Applies a structural change with a version-bumping upgrade.
    ///
    /// Returns false when the schema already had the requested shape.
    pub(crate) async fn change_schema(&self, change: SchemaChange) -> CoreResult<bool> {
        let _guard = self.open_lock.lock().await;
        self.ensure_usable()?;

        let live = match self.current().filter(|l| !l.connection.is_closed()) {
            Some(live) => live,
            None => {
                self.connect_locked().await?;
                self.current().ok_or_else(|| CoreError::DatabaseClosed {
                    name: self.name.clone(),
                })?
            }
        };

        let stores = live.connection.store_names();
        let satisfied = match &change {
            SchemaChange::Create(store) => stores.contains(store),
            SchemaChange::Delete(store) => !stores.contains(store),
        };
        if satisfied {
            return Ok(false);
        }

        let next = live.connection.version() + 1;
        self.retire(&live);
        let handler = apply_change(change.clone());
        match self.engine.open(&self.name, Some(next), Some(handler)).await {
            Ok(opened) => {
                self.publish(opened);
                info!(db = %self.name, version = next, change = ?change, "schema changed");
                Ok(true)
            }
            Err(e) => {
                warn!(db = %self.name, version = next, error = %e, "schema change failed");
                if let Err(reopen) = self.connect_locked().await {
                    warn!(db = %self.name, error = %reopen, "reconnect after failed schema change failed");
                    self.apply(Signal::OpenFailed);
                }
                Err(match e {
                    EngineError::Blocked { name } => CoreError::Blocked {
                        name,
                        operation: "schema change",
                    },
                    other => CoreError::Engine(other),
                })
            }
        }
    }

    fn current(&self) -> Option<Live> {
        self.live.borrow().clone()
    }

    /// Opens the database at its current version and publishes the handle,
    /// re-creating any required container that went missing. Tables other
    /// handles created or deleted are taken as they are.
    ///
    /// Callers hold `open_lock`.
    async fn connect_locked(&self) -> EngineResult<()> {
        let required: Vec<String> = self.required.iter().cloned().collect();
        let opened = self
            .engine
            .open(&self.name, None, Some(create_missing(required.clone())))
            .await?;

        let present = opened.connection.store_names();
        let missing: Vec<String> = required
            .into_iter()
            .filter(|store| !present.contains(store))
            .collect();
        let opened = if missing.is_empty() {
            opened
        } else {
            let next = opened.connection.version() + 1;
            opened.connection.close();
            info!(db = %self.name, version = next, missing = ?missing, "replaying schema");
            self.engine
                .open(&self.name, Some(next), Some(create_missing(missing)))
                .await?
        };

        self.publish(opened);
        Ok(())
    }

    fn publish(&self, opened: Opened) {
        let Opened { connection, events } = opened;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let signal = Signal::Opened {
            generation,
            version: connection.version(),
        };

        {
            let mut state = self.state.lock();
            let transition = state.on(&signal);
            *state = transition.state;
            if transition.effect == Effect::Discard {
                drop(state);
                debug!(db = %self.name, generation, "discarding late connection");
                connection.close();
                return;
            }
            self.live.send_replace(Some(Live {
                generation,
                connection: Arc::clone(&connection),
            }));
        }

        debug!(db = %self.name, generation, version = connection.version(), "connection published");
        self.watch_events(generation, events);
    }

    fn retire(&self, live: &Live) {
        debug!(db = %self.name, generation = live.generation, "retiring connection");
        self.apply(Signal::Retired);
        self.live.send_replace(None);
        live.connection.close();
    }

    fn watch_events(&self, generation: u64, mut events: UnboundedReceiver<EngineEvent>) {
        let this = self.this.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = this.upgrade() else {
                    break;
                };
                debug!(db = %manager.name, generation, event = ?event, "engine event");
                manager.apply(Signal::Engine { generation, event });
            }
        });
    }

    fn apply(&self, signal: Signal) {
        let mut state = self.state.lock();
        let transition = state.on(&signal);
        *state = transition.state;

        match transition.effect {
            Effect::None | Effect::Publish | Effect::Discard => {}
            Effect::Reopen => {
                self.release();
                drop(state);
                info!(db = %self.name, signal = ?signal, "connection lost");
                self.schedule_reopen();
            }
            Effect::Release => {
                self.release();
                drop(state);
                if let Signal::Engine { event, .. } = &signal {
                    warn!(db = %self.name, event = ?event, "database detached");
                }
            }
        }
    }

    fn release(&self) {
        if let Some(live) = self.live.send_replace(None) {
            live.connection.close();
        }
    }

    fn schedule_reopen(&self) {
        if self.reopening.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.this.clone();
        let delay = self.config.reopen_delay;
        info!(db = %self.name, delay_ms = delay.as_millis() as u64, "reopen scheduled");

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                tokio::time::sleep(delay).await;
                let Some(manager) = this.upgrade() else {
                    return;
                };
                if manager.state() != ConnectionState::Connecting {
                    manager.reopening.store(false, Ordering::SeqCst);
                    return;
                }
                attempt += 1;

                let result = {
                    let _guard = manager.open_lock.lock().await;
                    if manager.state() != ConnectionState::Connecting {
                        // A schema change reconnected while we waited for the lock.
                        manager.reopening.store(false, Ordering::SeqCst);
                        return;
                    }
                    manager.connect_locked().await
                };
                match result {
                    Ok(()) => {
                        manager.reopening.store(false, Ordering::SeqCst);
                        info!(db = %manager.name, attempt, version = ?manager.version(), "reopened");
                        // The new handle may have been lost before the flag cleared.
                        if manager.state() == ConnectionState::Connecting {
                            manager.schedule_reopen();
                        }
                        return;
                    }
                    Err(e) => {
                        warn!(db = %manager.name, attempt, error = %e, "reopen failed, retrying");
                    }
                }
            }
        });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(live) = self.live.send_replace(None) {
            live.connection.close();
        }
    }
}

fn create_missing(stores: Vec<String>) -> UpgradeHandler {
    Box::new(move |tx: &mut dyn UpgradeTransaction| {
        for store in &stores {
            if !tx.has_store(store) {
                tx.create_store(store)?;
            }
        }
        Ok(())
    })
}

fn apply_change(change: SchemaChange) -> UpgradeHandler {
    Box::new(move |tx: &mut dyn UpgradeTransaction| match &change {
        SchemaChange::Create(store) if !tx.has_store(store) => tx.create_store(store),
        SchemaChange::Delete(store) if tx.has_store(store) => tx.delete_store(store),
        _ => Ok(()),
    })
}
