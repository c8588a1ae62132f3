//! Benchmark support for kvtable.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
