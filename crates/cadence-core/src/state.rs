//! Executor lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an executor.
///
/// The machine starts in `Reasoning` while the initial problem is being
/// solved, oscillates between `Idle`, `Executing`, and `Adapting` while
/// the plan is driven forward, and ends in `Finished` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    /// Solving the initial problem.
    Reasoning,
    /// A plan exists but the clock is not running.
    Idle,
    /// Re-solving after new requirements or a reported failure.
    Adapting,
    /// The clock is running and ticks drive the plan forward.
    Executing,
    /// The horizon was reached with nothing left to end.
    Finished,
    /// The plan can no longer be executed.
    Failed,
}

impl ExecutorState {
    /// Terminal states are only left through adaptation (`Finished`) or
    /// never (`Failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Finished | ExecutorState::Failed)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Reasoning => "reasoning",
            ExecutorState::Idle => "idle",
            ExecutorState::Adapting => "adapting",
            ExecutorState::Executing => "executing",
            ExecutorState::Finished => "finished",
            ExecutorState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
