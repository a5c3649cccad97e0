//! Conversions from external infrastructure errors into domain errors.

use flaggate_domain::FlagError;
use rusqlite::Error as SqlError;
use serde_json::Error as JsonError;
use tokio::task::JoinError;

/// SQLite extended result code for a violated `UNIQUE` constraint.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLite extended result code for a violated `PRIMARY KEY` constraint.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FlagError);

impl From<InfraError> for FlagError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FlagError> for InfraError {
    fn from(value: FlagError) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for InfraError {}

/// True when `err` is a uniqueness violation on insert.
pub fn is_unique_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(failure, _)
            if failure.extended_code == SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → FlagError */
/* -------------------------------------------------------------------------- */

fn sql_to_flag_error(err: SqlError) -> FlagError {
    use rusqlite::ffi::ErrorCode;
    use rusqlite::Error as RE;

    // the flag name is unknown here; callers that know it map
    // unique violations to `DuplicateName` themselves
    match err {
        RE::SqliteFailure(failure, maybe_message) => {
            let message = maybe_message.unwrap_or_default();
            match failure.code {
                ErrorCode::DatabaseBusy => FlagError::StoreUnavailable("database is busy".into()),
                ErrorCode::DatabaseLocked => {
                    FlagError::StoreUnavailable("database is locked".into())
                }
                ErrorCode::ConstraintViolation => {
                    FlagError::InvalidRecord(format!("constraint violation: {message}"))
                }
                _ => FlagError::StoreUnavailable(format!(
                    "sqlite failure {:?} (code {}): {message}",
                    failure.code, failure.extended_code
                )),
            }
        }
        RE::QueryReturnedNoRows => FlagError::NotFound("no rows returned by query".into()),
        RE::FromSqlConversionFailure(_, _, cause) => {
            FlagError::Internal(format!("failed to convert sqlite value: {cause}"))
        }
        RE::InvalidColumnType(_, _, ty) => {
            FlagError::Internal(format!("invalid column type: {ty}"))
        }
        RE::InvalidPath(path) => {
            FlagError::Config(format!("invalid database path: {}", path.to_string_lossy()))
        }
        other => FlagError::StoreUnavailable(other.to_string()),
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(sql_to_flag_error(value))
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → FlagError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(FlagError::StoreUnavailable(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → FlagError */
/* -------------------------------------------------------------------------- */

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        Self(FlagError::Internal(format!("malformed stored flag data: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → FlagError */
/* -------------------------------------------------------------------------- */

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        if value.is_cancelled() {
            Self(FlagError::Internal("blocking task cancelled".into()))
        } else {
            Self(FlagError::Internal(format!("blocking task failed: {value}")))
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
