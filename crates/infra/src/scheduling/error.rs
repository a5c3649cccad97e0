//! Scheduler error types

use std::time::Duration;

use flaggate_domain::FlagError;
use thiserror::Error;
use tokio::task::JoinError;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The bound that was exceeded.
        duration: Duration,
    },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<JoinError> for SchedulerError {
    fn from(err: JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let flag_err = match err {
            SchedulerError::Timeout { .. } => FlagError::Timeout(err.to_string()),
            _ => FlagError::Internal(err.to_string()),
        };
        Self(flag_err)
    }
}

impl From<SchedulerError> for FlagError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
