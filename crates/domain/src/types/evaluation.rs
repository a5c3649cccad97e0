//! Evaluation outcome types

use std::fmt;

use serde::{Serialize, Serializer};

use super::flag::Metadata;

/// Targeting dimension that rejected a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionFailure {
    /// `environment` missing or not allowed.
    Environment,
    /// `tenant_id` missing or not allowed.
    Tenant,
    /// `user_role` missing or not allowed.
    Role,
    /// `subscription_plan` missing or not allowed.
    SubscriptionPlan,
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Environment => "environment not in allowed list",
            Self::Tenant => "tenant not in allowed list",
            Self::Role => "role not in allowed list",
            Self::SubscriptionPlan => "subscription plan not in allowed list",
        };
        f.write_str(reason)
    }
}

/// Why an evaluation produced its answer.
///
/// The display strings are a stable contract with callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationReason {
    /// No such flag.
    FlagNotFound,
    /// The kill switch is off.
    GloballyDisabled,
    /// First targeting dimension that rejected the context.
    ConditionNotMet(ConditionFailure),
    /// The subject's bucket is at or above the rollout.
    NotInRollout {
        /// The subject's bucket, `0..100`.
        bucket: u8,
        /// The flag's rollout percentage.
        percentage: u8,
    },
    /// Enabled.
    AllConditionsMet,
    /// The store failed; the flag reads as disabled.
    EvaluationError(String),
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlagNotFound => f.write_str("flag not found"),
            Self::GloballyDisabled => f.write_str("flag globally disabled"),
            Self::ConditionNotMet(failure) => fmt::Display::fmt(failure, f),
            Self::NotInRollout { bucket, percentage } => {
                write!(f, "not in rollout percentage ({bucket}% >= {percentage}%)")
            }
            Self::AllConditionsMet => f.write_str("all conditions met"),
            Self::EvaluationError(cause) => write!(f, "evaluation error: {cause}"),
        }
    }
}

impl Serialize for EvaluationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Answer for one flag and one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    /// Flag that was evaluated.
    pub flag_name: String,
    /// Whether the feature is on for this context.
    pub enabled: bool,
    /// Why `enabled` has its value.
    pub reason: EvaluationReason,
    /// The flag's metadata; empty unless `enabled`.
    pub metadata: Metadata,
}

impl EvaluationResult {
    /// Enabled result carrying the flag's metadata.
    pub fn enabled(flag_name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            flag_name: flag_name.into(),
            enabled: true,
            reason: EvaluationReason::AllConditionsMet,
            metadata,
        }
    }

    /// Disabled result; metadata is never exposed.
    pub fn disabled(flag_name: impl Into<String>, reason: EvaluationReason) -> Self {
        Self { flag_name: flag_name.into(), enabled: false, reason, metadata: Metadata::new() }
    }
}
