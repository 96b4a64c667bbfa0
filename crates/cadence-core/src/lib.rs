//! # Cadence Core
//!
//! The timeline plan executor and adaptor: attaches to an external
//! constraint solver as a theory module and, as an external driver
//! ticks it, drives the solved plan forward one time quantum at a time.
//!
//! This crate contains:
//! - the adaptation store: per-activity execution commitments guarded
//!   by a fresh literal, relaxed automatically under backjumps;
//! - the pulse index: the sorted map of future activity transitions;
//! - the theory propagator replaying commitments into the solver;
//! - the tick engine and the executor controller state machine.
//!
//! This crate does NOT contain:
//! - a solver (see the `cadence-solver` contract);
//! - the pacing timer or the multi-executor registry (`cadence-runtime`);
//! - the wire format for notifications (`cadence-api`).

pub mod adaptation;
pub mod error;
pub mod executor;
pub mod listener;
pub mod pulse;
pub mod state;

mod theory;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::adaptation::{AdaptationStore, AtomAdaptation, BoundSnapshot};
    pub use crate::error::ExecutorError;
    pub use crate::executor::Executor;
    pub use crate::listener::{DeferralSink, ExecutorListener, ExecutorListenerRef, ListenerId};
    pub use crate::pulse::{relevant_predicates, ExecutingSet, PulseIndex};
    pub use crate::state::ExecutorState;
}

pub use adaptation::{AdaptationStore, AtomAdaptation, BoundSnapshot};
pub use error::ExecutorError;
pub use executor::Executor;
pub use listener::{DeferralSink, ExecutorListener, ExecutorListenerRef, ListenerId};
pub use pulse::{relevant_predicates, ExecutingSet, PulseIndex};
pub use state::ExecutorState;
