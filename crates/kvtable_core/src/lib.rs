//! # kvtable core
//!
//! Typed tables over an ordered, transactional key-value engine.
//!
//! This crate provides:
//! - [`Database`], a handle that keeps its engine connection alive and
//!   reopens it after engine failures
//! - [`Table`], a named table with range reads, range deletes and
//!   reverse-bounded pagination
//! - two table layouts: one container per table, or a fixed pool of
//!   hash-assigned containers shared by all tables (see [`Layout`])
//!
//! The storage engine is passed in as an `Arc<dyn StorageEngine>`; see
//! [`kvtable_engine`] for the interface and the bundled engines.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod connection;
mod database;
mod error;
mod table;

pub use config::{Config, Layout, DEFAULT_STORE_COUNT};
pub use connection::ConnectionState;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use table::Table;

pub use kvtable_codec::{Row, Value, MAX_INTEGER_KEY};
pub use kvtable_engine::{Durability, Key};
