//! Connection lifecycle state machine.
//!
//! Every input the manager reacts to is a [`Signal`]; [`ConnectionState::on`]
//! maps the current state and a signal to the next state and the single
//! [`Effect`] the manager must carry out. The function is pure so the whole
//! lifecycle can be tested without an engine or a runtime.

use kvtable_engine::EngineEvent;

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live handle; an open is pending or scheduled.
    Connecting,
    /// A live handle is published.
    Open {
        /// Identifies the handle; events of older handles are ignored.
        generation: u64,
        /// Schema version the handle was opened at.
        version: u32,
    },
    /// Another connection deleted or downgraded the database. No reopen.
    Detached,
    /// Closed through this handle. Terminal.
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// An open attempt produced a handle.
    Opened {
        /// Generation assigned to the new handle.
        generation: u64,
        /// Its schema version.
        version: u32,
    },
    /// A scheduled reopen attempt failed.
    OpenFailed,
    /// The manager retired the live handle to change the schema.
    Retired,
    /// The engine signalled an event on handle `generation`.
    Engine {
        /// Handle the event was delivered on.
        generation: u64,
        /// The event.
        event: EngineEvent,
    },
    /// Explicit close.
    Close,
}

/// Work the manager performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do.
    None,
    /// Publish the handle that was just opened.
    Publish,
    /// Close the handle that was just opened; it arrived too late.
    Discard,
    /// Drop the live handle and schedule a reopen after the fixed delay.
    Reopen,
    /// Drop the live handle without reopening.
    Release,
}

/// Result of applying a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the signal.
    pub state: ConnectionState,
    /// Effect to carry out.
    pub effect: Effect,
}

impl Transition {
    const fn to(state: ConnectionState, effect: Effect) -> Self {
        Self { state, effect }
    }
}

impl ConnectionState {
    /// Returns true once no reopen will ever be attempted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Detached | ConnectionState::Closed)
    }

    /// Applies `signal`.
    pub fn on(self, signal: &Signal) -> Transition {
        use ConnectionState::{Closed, Connecting, Detached, Open};

        match (self, signal) {
            (Closed, Signal::Opened { .. }) | (Detached, Signal::Opened { .. }) => {
                Transition::to(self, Effect::Discard)
            }
            (Closed, _) => Transition::to(Closed, Effect::None),
            (_, Signal::Close) => Transition::to(Closed, Effect::Release),

            (_, Signal::Opened {
                generation,
                version,
            }) => Transition::to(
                Open {
                    generation: *generation,
                    version: *version,
                },
                Effect::Publish,
            ),

            (Connecting, Signal::OpenFailed) => Transition::to(Connecting, Effect::Reopen),
            (Open { .. }, Signal::Retired) => Transition::to(Connecting, Effect::None),

            (
                Open {
                    generation: live,
                    version,
                },
                Signal::Engine { generation, event },
            ) if live == *generation => match event {
                EngineEvent::Closed | EngineEvent::Aborted | EngineEvent::Error(_) => {
                    Transition::to(Connecting, Effect::Reopen)
                }
                EngineEvent::VersionChange { new: Some(new), .. } if *new > version => {
                    Transition::to(Connecting, Effect::Reopen)
                }
                EngineEvent::VersionChange { .. } => Transition::to(Detached, Effect::Release),
            },

            // Stale events, duplicate failures and retirements without a handle.
            _ => Transition::to(self, Effect::None),
        }
    }
}
