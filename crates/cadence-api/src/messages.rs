//! Observer notifications as tagged wire records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use cadence_core::ExecutorState;
use cadence_solver::{AtomId, Rational};

/// A notification published by an executor, tagged by `type`.
/// Rationals serialize as `(numerator, denominator)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorMessage {
    ExecutorStateChanged {
        solver_id: Uuid,
        state: ExecutorState,
    },
    Tick {
        solver_id: Uuid,
        time: Rational,
    },
    Starting {
        solver_id: Uuid,
        starting: Vec<AtomId>,
    },
    Start {
        solver_id: Uuid,
        start: Vec<AtomId>,
    },
    Ending {
        solver_id: Uuid,
        ending: Vec<AtomId>,
    },
    End {
        solver_id: Uuid,
        end: Vec<AtomId>,
    },
    SolverState {
        solver_id: Uuid,
        time: Rational,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timelines: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        executing_atoms: Option<Vec<AtomId>>,
    },
    NewSolver {
        solver_id: Uuid,
        name: String,
        state: ExecutorState,
    },
    DeletedSolver {
        solver_id: Uuid,
    },
}

impl ExecutorMessage {
    /// The executor this message is about.
    pub fn solver_id(&self) -> Uuid {
        match self {
            ExecutorMessage::ExecutorStateChanged { solver_id, .. }
            | ExecutorMessage::Tick { solver_id, .. }
            | ExecutorMessage::Starting { solver_id, .. }
            | ExecutorMessage::Start { solver_id, .. }
            | ExecutorMessage::Ending { solver_id, .. }
            | ExecutorMessage::End { solver_id, .. }
            | ExecutorMessage::SolverState { solver_id, .. }
            | ExecutorMessage::NewSolver { solver_id, .. }
            | ExecutorMessage::DeletedSolver { solver_id } => *solver_id,
        }
    }
}
