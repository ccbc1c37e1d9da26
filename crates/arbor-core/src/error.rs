//! Error types for Arbor

use thiserror::Error;

/// Core Arbor errors
///
/// All errors are synchronous and propagate to the immediate caller;
/// nothing is retried or recovered internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArborError {
    #[error("a store named '{0}' already exists, store names must be unique")]
    NameConflict(String),

    #[error("action targeted store '{0}', which does not exist")]
    TargetNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(&'static str),
}

/// Result type for Arbor operations
pub type ArborResult<T> = Result<T, ArborError>;
