//! # Cadence Testkit
//!
//! Test doubles for the cadence crates: a scripted in-memory solver
//! implementing the full solver contract, and a recording observer for
//! asserting callback sequences.

mod recorder;
mod solver;

pub use recorder::Recorder;
pub use solver::ScriptedSolver;
