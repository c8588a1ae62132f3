//! Connection lifecycle: the state machine and the manager driving it.

mod manager;
mod state;

pub(crate) use manager::{ConnectionManager, SchemaChange};
pub use state::{ConnectionState, Effect, Signal, Transition};
