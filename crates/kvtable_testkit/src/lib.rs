//! # kvtable testkit
//!
//! Test utilities for kvtable.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvtable_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_table() {
//!     let db = TestDatabase::memory().await;
//!     let table = scenarios::populated_table(&db, "events", 10).await;
//!     assert_eq!(table.count().await.unwrap(), 10);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
