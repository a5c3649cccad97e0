//! Per-request evaluation context

use serde::{Deserialize, Serialize};

/// Request attributes a flag is evaluated against.
///
/// Built by the caller per request and discarded after evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationContext {
    /// Explicit bucketing identity; wins over tenant and user.
    pub subject_key: Option<String>,
    /// Tenant; checked against tenant conditions.
    pub tenant_id: Option<String>,
    /// Bucketing fallback after tenant.
    pub user_id: Option<String>,
    /// Deployment environment, e.g. "production".
    pub environment: Option<String>,
    /// Role; checked against role conditions.
    pub user_role: Option<String>,
    /// Plan; checked against plan conditions.
    pub subscription_plan: Option<String>,
}

impl EvaluationContext {
    /// Empty context; matches only unconditioned flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bucketing subject.
    #[must_use]
    pub fn subject(mut self, key: impl Into<String>) -> Self {
        self.subject_key = Some(key.into());
        self
    }

    /// Set the tenant.
    #[must_use]
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the user.
    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the environment.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the role.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.user_role = Some(role.into());
        self
    }

    /// Set the subscription plan.
    #[must_use]
    pub fn plan(mut self, plan: impl Into<String>) -> Self {
        self.subscription_plan = Some(plan.into());
        self
    }

    /// Identity used for rollout bucketing.
    ///
    /// Precedence is `subject_key`, then `tenant_id`, then `user_id`; empty
    /// strings are skipped. Anonymous contexts yield `""`, which buckets on
    /// the flag name alone.
    pub fn bucketing_identity(&self) -> &str {
        [&self.subject_key, &self.tenant_id, &self.user_id]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}
