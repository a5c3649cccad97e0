//! Validation rules applied at the administrative boundary
//!
//! Records that fail here never reach a store or the cache.

use crate::constants::{MAX_FLAG_NAME_LENGTH, MAX_ROLLOUT_PERCENTAGE};
use crate::errors::{FlagError, Result};
use crate::types::{FlagPatch, NewFlag};

/// Check a flag name: lowercase ASCII letters, digits, `_` and `-`,
/// starting with a letter, at most 64 characters.
///
/// # Errors
/// Returns `FlagError::InvalidRecord` describing the violated rule.
pub fn validate_flag_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(FlagError::InvalidRecord("flag name cannot be empty".into()));
    };

    if name.len() > MAX_FLAG_NAME_LENGTH {
        return Err(FlagError::InvalidRecord(format!(
            "flag name is too long (max {MAX_FLAG_NAME_LENGTH} characters)"
        )));
    }

    if !first.is_ascii_lowercase() {
        return Err(FlagError::InvalidRecord(format!(
            "flag name '{name}' must start with a lowercase letter"
        )));
    }

    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(FlagError::InvalidRecord(format!(
            "flag name '{name}' may only contain lowercase letters, digits, underscores and hyphens"
        )));
    }

    Ok(())
}

/// # Errors
/// Returns `FlagError::InvalidRecord` when `percentage` exceeds 100.
pub fn validate_rollout_percentage(percentage: u8) -> Result<()> {
    if percentage > MAX_ROLLOUT_PERCENTAGE {
        return Err(FlagError::InvalidRecord(format!(
            "rollout percentage must be between 0 and {MAX_ROLLOUT_PERCENTAGE}, got {percentage}"
        )));
    }
    Ok(())
}

/// # Errors
/// Returns `FlagError::InvalidRecord` for a bad name or percentage.
pub fn validate_new_flag(flag: &NewFlag) -> Result<()> {
    validate_flag_name(&flag.name)?;
    validate_rollout_percentage(flag.rollout_percentage)
}

/// # Errors
/// Returns `FlagError::InvalidRecord` for an out-of-range percentage.
pub fn validate_patch(patch: &FlagPatch) -> Result<()> {
    patch.rollout_percentage.map_or(Ok(()), validate_rollout_percentage)
}
