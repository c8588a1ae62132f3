//! # kvtable engine
//!
//! The ordered, transactional key-value engine interface kvtable is built on,
//! plus two engines implementing it.
//!
//! An engine holds named databases. A database has a schema version and a
//! set of named containers ("object stores"), each an ordered map from
//! [`Key`] to opaque bytes. Containers can only be created or removed inside
//! the upgrade transaction that runs when a database is opened at a higher
//! version.
//!
//! ## Design Principles
//!
//! - Engines store opaque bytes and never interpret values
//! - All integer keys sort before all string keys
//! - Engine-initiated closures and errors are delivered as [`EngineEvent`]s
//! - Engines must be `Send + Sync` for sharing across tasks
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - in-process engine with fault injection for tests
//! - [`FileEngine`] - the same engine persisted as snapshot files
//!
//! ## Example
//!
//! ```rust
//! use kvtable_engine::{Key, KeyRange};
//!
//! let range = KeyRange::bound(Key::from("t^0"), Key::from("t^2"), true, true);
//! assert!(range.contains(&Key::from("t^1^n000000001")));
//! assert!(!range.contains(&Key::Integer(1)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod key;
mod memory;

pub use backend::{
    Connection, Cursor, Durability, EngineEvent, Opened, Record, StorageEngine, Transaction,
    TransactionMode, UpgradeHandler, UpgradeTransaction,
};
pub use error::{EngineError, EngineResult};
pub use file::{FileEngine, SNAPSHOT_EXTENSION};
pub use key::{Direction, Key, KeyRange};
pub use memory::{DatabaseStats, MemoryEngine, MemoryEngineConfig};
