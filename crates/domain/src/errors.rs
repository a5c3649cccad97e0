//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for flag operations.
///
/// Evaluation never surfaces these to callers (failures degrade to a
/// disabled result); administrative operations do.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FlagError {
    /// No flag with this name.
    #[error("Flag not found: {0}")]
    NotFound(String),

    /// A flag with this name already exists.
    #[error("Flag already exists: {0}")]
    DuplicateName(String),

    /// Record or patch failed validation.
    #[error("Invalid flag record: {0}")]
    InvalidRecord(String),

    /// The backing store could not serve the call.
    #[error("Flag store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call or refresh exceeded its bound.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected failure, e.g. a corrupt stored row.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlagError {
    /// Stable label suitable for structured logging fields.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateName(_) => "duplicate_name",
            Self::InvalidRecord(_) => "invalid_record",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for flag operations
pub type Result<T> = std::result::Result<T, FlagError>;
