use thiserror::Error;

/// Errors surfaced by the solver's problem-reading facade.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal solver error: {0}")]
    Internal(String),
}
