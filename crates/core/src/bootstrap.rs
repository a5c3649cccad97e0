//! Canonical flag seeding.
//!
//! On startup every canonical flag is upserted with an empty patch: missing
//! flags are inserted with their defaults, existing flags keep every
//! administrative edit. The cache is then loaded in one full refresh.

use std::time::Duration;

use flaggate_domain::{FlagConditions, FlagError, FlagPatch, NewFlag, Result};
use serde_json::json;
use tracing::info;

use crate::engine::FlagEngine;
use crate::ports::FlagStore;

/// Bumped whenever the canonical list changes.
pub const CANONICAL_FLAGS_VERSION: u32 = 1;

const BOOTSTRAP_ACTOR: &str = "system:bootstrap";

/// Default flags every deployment starts from.
pub fn canonical_flags() -> Vec<NewFlag> {
    vec![
        NewFlag::new("beta_export")
            .description("CSV and JSON export of workspace data")
            .enabled(true)
            .rollout(50)
            .metadata_entry("tags", json!(["beta", "export"])),
        NewFlag::new("ai_recommendations")
            .description("AI-generated recommendations panel")
            .conditions(FlagConditions::default().with_environments(["staging", "development"]))
            .metadata_entry("tags", json!(["ai", "beta"])),
        NewFlag::new("new_dashboard")
            .description("Redesigned dashboard layout")
            .enabled(true)
            .rollout(10)
            .metadata_entry("tags", json!(["ui"])),
        NewFlag::new("advanced_analytics")
            .description("Advanced analytics reports")
            .metadata_entry("tags", json!(["analytics", "premium"])),
        NewFlag::new("bulk_operations")
            .description("Bulk edit and delete actions")
            .enabled(true)
            .rollout(100)
            .metadata_entry("tags", json!(["productivity"])),
        NewFlag::new("audit_log_export")
            .description("Export of the audit log")
            .metadata_entry("tags", json!(["compliance", "export"])),
    ]
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Version of the flag list that was seeded.
    pub version: u32,
    /// Names upserted, in seeding order.
    pub seeded: Vec<String>,
}

/// Inserts canonical flags that are missing from the store.
#[derive(Debug, Clone)]
pub struct BootstrapSeeder {
    flags: Vec<NewFlag>,
    version: u32,
    store_timeout: Option<Duration>,
}

impl Default for BootstrapSeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapSeeder {
    /// Seeder for the canonical flag list.
    pub fn new() -> Self {
        Self { flags: canonical_flags(), version: CANONICAL_FLAGS_VERSION, store_timeout: None }
    }

    /// Seed a custom list instead of the canonical one.
    pub fn with_flags(flags: Vec<NewFlag>, version: u32) -> Self {
        Self { flags, version, store_timeout: None }
    }

    /// Bound each upsert by `timeout`. `run` falls back to the engine's
    /// store timeout when this is unset.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Upsert every flag into `store`. Existing records are left untouched
    /// apart from `updated_at`.
    ///
    /// # Errors
    /// The first store failure or timeout; flags before it stay seeded.
    pub async fn seed(&self, store: &dyn FlagStore) -> Result<SeedReport> {
        self.seed_within(store, self.store_timeout).await
    }

    async fn seed_within(
        &self,
        store: &dyn FlagStore,
        limit: Option<Duration>,
    ) -> Result<SeedReport> {
        let mut seeded = Vec::with_capacity(self.flags.len());
        for flag in &self.flags {
            let name = flag.name.clone();
            let upsert =
                store.upsert(&name, FlagPatch::default(), flag.clone(), Some(BOOTSTRAP_ACTOR));
            match limit {
                Some(limit) => tokio::time::timeout(limit, upsert).await.map_err(|_| {
                    FlagError::Timeout(format!(
                        "seeding {name} exceeded {}ms",
                        limit.as_millis()
                    ))
                })??,
                None => upsert.await?,
            };
            seeded.push(name);
        }

        info!(version = self.version, count = seeded.len(), "canonical flags seeded");
        Ok(SeedReport { version: self.version, seeded })
    }

    /// Seed through the engine's store, then load the engine cache.
    ///
    /// # Errors
    /// Store failures or timeouts from seeding or from the refresh.
    pub async fn run(&self, engine: &FlagEngine) -> Result<SeedReport> {
        let limit = self.store_timeout.unwrap_or_else(|| engine.store_timeout());
        let report = self.seed_within(engine.store().as_ref(), Some(limit)).await?;
        engine.refresh_cache().await?;
        Ok(report)
    }
}
