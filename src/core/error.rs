//! Driver-level error taxonomy, realized as a typed enum.
//!
//! The `SolverBackend` boundary stays an integer `StatusCode` because
//! callers branch on magnitude; `CoreError` covers the failures a caller is
//! expected to handle programmatically above that boundary.

use thiserror::Error;

use super::state::ProcessState;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("solver backend reported numerical failure (status {status})")]
    SolverFailure { status: i32 },

    #[error("solver reported an invalid state: {detail}")]
    InvalidState { detail: String },

    #[error("non-finite value encountered in {where_}: {detail}")]
    NonFinite { where_: &'static str, detail: String },

    #[error("progress stagnated: {reason}")]
    Stagnation { reason: &'static str },

    #[error("allocation failed while reinitializing the solver (error code -101)")]
    AllocationFailure,

    #[error("solver backend construction failed: {detail}")]
    SolverConstruction { detail: String },

    #[error("recovery ladder exhausted after {attempts} attempts")]
    RecoveryExhausted { attempts: u32 },

    #[error("invalid process-state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ProcessState,
        to: ProcessState,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Whether this error should drive the process state to `GdError`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::AllocationFailure | CoreError::SolverConstruction { .. }
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
