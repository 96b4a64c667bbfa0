use cadence_solver::{AtomId, SolverError};
use thiserror::Error;

/// Execution-fatal errors.
///
/// Every variant is non-recoverable: real-world commitments cannot be
/// undone, so once one of these surfaces the executor transitions to
/// `Failed` and subsequent ticks are no-ops.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("the plan can no longer be executed")]
    Unexecutable,

    #[error("cannot delay the constant-valued coordinate of atom {0}")]
    ConstantCoordinate(AtomId),

    #[error("no adaptation record exists for atom {0}")]
    MissingAdaptation(AtomId),

    #[error("atom {0} has no `{1}` coordinate")]
    MissingCoordinate(AtomId, &'static str),

    #[error("executor mutex poisoned")]
    Poisoned,

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}
