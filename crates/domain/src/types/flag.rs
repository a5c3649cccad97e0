//! Flag definition types
//!
//! A [`FlagRecord`] is the stored unit of configuration. Stores create
//! records from a [`NewFlag`] and mutate them by applying a [`FlagPatch`];
//! the engine itself only ever swaps whole record values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form metadata, opaque to the engine.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Targeting conditions, one allow-list per dimension.
///
/// An empty list places no restriction on its dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagConditions {
    /// Allowed deployment environments.
    pub environments: Vec<String>,
    /// Allowed tenants.
    pub tenant_ids: Vec<String>,
    /// Allowed roles.
    pub user_roles: Vec<String>,
    /// Allowed plans.
    pub subscription_plans: Vec<String>,
}

impl FlagConditions {
    /// True when no dimension is restricted.
    pub fn is_unrestricted(&self) -> bool {
        self.environments.is_empty()
            && self.tenant_ids.is_empty()
            && self.user_roles.is_empty()
            && self.subscription_plans.is_empty()
    }

    /// Restrict to these environments.
    #[must_use]
    pub fn with_environments<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to these tenants.
    #[must_use]
    pub fn with_tenant_ids<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenant_ids = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to these roles.
    #[must_use]
    pub fn with_user_roles<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to these plans.
    #[must_use]
    pub fn with_subscription_plans<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscription_plans = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Stored flag definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// Unique, immutable flag identifier (e.g. "beta_export")
    pub name: String,
    /// Human-readable summary.
    pub description: String,
    /// Global kill switch
    pub enabled: bool,
    /// Share of subjects, by stable bucket, that see the flag on (0-100)
    pub rollout_percentage: u8,
    /// `None` targets every context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<FlagConditions>,
    /// Free-form JSON; `tags` drives tag lookup.
    #[serde(default)]
    pub metadata: Metadata,
    /// Set once on insert.
    pub created_at: DateTime<Utc>,
    /// Touched by every store write, including no-op seeding.
    pub updated_at: DateTime<Utc>,
    /// Actor that inserted the record.
    pub created_by: Option<String>,
    /// Actor behind the last non-empty change.
    pub updated_by: Option<String>,
}

impl FlagRecord {
    /// True when `metadata[key]` equals `value`, or is an array containing it.
    pub fn has_metadata_tag(&self, key: &str, value: &serde_json::Value) -> bool {
        match self.metadata.get(key) {
            Some(serde_json::Value::Array(items)) => items.contains(value),
            Some(stored) => stored == value,
            None => false,
        }
    }
}

/// Input for creating a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlag {
    /// Unique flag identifier.
    pub name: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Initial kill switch state.
    #[serde(default)]
    pub enabled: bool,
    /// Initial rollout (0-100).
    #[serde(default)]
    pub rollout_percentage: u8,
    /// Initial targeting; `None` targets every context.
    #[serde(default)]
    pub conditions: Option<FlagConditions>,
    /// Initial metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewFlag {
    /// A disabled flag with 0% rollout and no conditions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: false,
            rollout_percentage: 0,
            conditions: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the kill switch.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the rollout percentage.
    #[must_use]
    pub const fn rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = percentage;
        self
    }

    /// Set the targeting conditions.
    #[must_use]
    pub fn conditions(mut self, conditions: FlagConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Insert one metadata key.
    #[must_use]
    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Materialize a stored record with audit fields set to `now`/`actor`.
    pub fn into_record(self, actor: Option<&str>, now: DateTime<Utc>) -> FlagRecord {
        FlagRecord {
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            rollout_percentage: self.rollout_percentage,
            conditions: self.conditions,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            created_by: actor.map(str::to_owned),
            updated_by: actor.map(str::to_owned),
        }
    }
}

/// Partial update applied by a store. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagPatch {
    /// New description.
    pub description: Option<String>,
    /// New kill switch state.
    pub enabled: Option<bool>,
    /// New rollout (0-100).
    pub rollout_percentage: Option<u8>,
    /// `Some` replaces the conditions; pass unrestricted conditions to clear.
    pub conditions: Option<FlagConditions>,
    /// `Some` replaces the whole metadata map.
    pub metadata: Option<Metadata>,
}

impl FlagPatch {
    /// Set the kill switch.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Change the rollout percentage.
    #[must_use]
    pub const fn rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = Some(percentage);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the targeting conditions.
    #[must_use]
    pub fn conditions(mut self, conditions: FlagConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Replace the whole metadata map.
    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True when applying the patch would change no field.
    pub const fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.enabled.is_none()
            && self.rollout_percentage.is_none()
            && self.conditions.is_none()
            && self.metadata.is_none()
    }

    /// Merge the patch onto `record` and stamp the audit fields.
    ///
    /// `updated_at` is always refreshed, even for an empty patch.
    pub fn apply_to(&self, record: &mut FlagRecord, actor: Option<&str>, now: DateTime<Utc>) {
        if let Some(description) = &self.description {
            record.description.clone_from(description);
        }
        if let Some(enabled) = self.enabled {
            record.enabled = enabled;
        }
        if let Some(percentage) = self.rollout_percentage {
            record.rollout_percentage = percentage;
        }
        if let Some(conditions) = &self.conditions {
            record.conditions =
                if conditions.is_unrestricted() { None } else { Some(conditions.clone()) };
        }
        if let Some(metadata) = &self.metadata {
            record.metadata.clone_from(metadata);
        }
        record.updated_at = now;
        if let Some(actor) = actor {
            record.updated_by = Some(actor.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    fn sample_record() -> FlagRecord {
        NewFlag::new("beta_export")
            .description("CSV export beta")
            .enabled(true)
            .rollout(50)
            .metadata_entry("variant", json!("b"))
            .into_record(Some("seed"), Utc::now())
    }

    #[test]
    fn into_record_sets_audit_fields() {
        let now = Utc::now();
        let record = NewFlag::new("x").into_record(Some("alice"), now);
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.created_by.as_deref(), Some("alice"));
        assert_eq!(record.updated_by.as_deref(), Some("alice"));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut record = sample_record();
        let later = record.updated_at + Duration::seconds(5);

        FlagPatch::default().enabled(false).apply_to(&mut record, Some("bob"), later);

        assert!(!record.enabled);
        assert_eq!(record.rollout_percentage, 50);
        assert_eq!(record.description, "CSV export beta");
        assert_eq!(record.metadata.get("variant"), Some(&json!("b")));
        assert_eq!(record.updated_at, later);
        assert_eq!(record.updated_by.as_deref(), Some("bob"));
        assert_eq!(record.created_by.as_deref(), Some("seed"));
    }

    #[test]
    fn empty_patch_refreshes_updated_at_only() {
        let mut record = sample_record();
        let before = record.clone();
        let later = record.updated_at + Duration::seconds(1);

        let patch = FlagPatch::default();
        assert!(patch.is_empty());
        patch.apply_to(&mut record, None, later);

        assert_eq!(record.updated_at, later);
        assert_eq!(FlagRecord { updated_at: before.updated_at, ..record }, before);
    }

    #[test]
    fn unrestricted_conditions_clear_the_field() {
        let mut record = sample_record();
        record.conditions = Some(FlagConditions::default().with_user_roles(["admin"]));

        FlagPatch::default().conditions(FlagConditions::default()).apply_to(
            &mut record,
            None,
            Utc::now(),
        );

        assert!(record.conditions.is_none());
    }

    #[test]
    fn metadata_tag_matches_scalar_and_array() {
        let record = NewFlag::new("x")
            .metadata_entry("tags", json!(["beta", "export"]))
            .metadata_entry("owner", json!("growth"))
            .into_record(None, Utc::now());

        assert!(record.has_metadata_tag("tags", &json!("beta")));
        assert!(!record.has_metadata_tag("tags", &json!("ui")));
        assert!(record.has_metadata_tag("owner", &json!("growth")));
        assert!(!record.has_metadata_tag("missing", &json!("growth")));
    }

    #[test]
    fn record_json_shape() {
        let record = sample_record();
        let value = serde_json::to_value(&record).expect("record serializes");
        assert_eq!(value["name"], "beta_export");
        assert_eq!(value["rollout_percentage"], 50);
        assert!(value.get("conditions").is_none());

        let back: FlagRecord = serde_json::from_value(value).expect("record deserializes");
        assert_eq!(back, record);
    }
}
