//! # kvtable Codec
//!
//! Row encoding and key layout for kvtable.
//!
//! ## Components
//!
//! - [`Value`] / [`Row`] - dynamic rows, an open mapping from field to value
//! - [`RowCodec`] - CBOR row encoding and key-column extraction for any
//!   serde row type
//! - [`KeyCodec`] - composite `table^marker^payload` keys with before-first
//!   and after-last sentinels, for tables sharing a container
//! - [`ShardSelector`] - stable hash assignment of tables to a fixed pool
//!   of containers
//!
//! ## Key Rules
//!
//! - Keys are non-negative integers up to [`MAX_INTEGER_KEY`] or strings
//! - Table names are non-empty and never contain [`SEPARATOR`]
//! - Encoded keys order exactly like native keys
//!
//! ## Usage
//!
//! ```
//! use kvtable_codec::{KeyCodec, Row, RowCodec, ShardSelector};
//!
//! let row = Row::new().with("id", 42).with("name", "answer");
//! let (key, bytes) = RowCodec::new("id").encode(&row).unwrap();
//!
//! let pool = ShardSelector::new(16).unwrap();
//! let store = pool.store_for("app", "facts");
//! let stored_key = KeyCodec::new("facts").unwrap().encode(&key).unwrap();
//! # let _ = (bytes, store, stored_key);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod row;
mod shard;
mod value;

pub use error::{CodecError, CodecResult};
pub use key::{decode, validate_key, validate_table_name, KeyCodec, MAX_INTEGER_KEY, SEPARATOR};
pub use row::RowCodec;
pub use shard::{store_name, ShardSelector};
pub use value::{Row, Value};
