//! Flag evaluation engine.
//!
//! Answers `is_enabled(flag, context)` from the [`FlagCache`], reading
//! through to the [`FlagStore`] on a miss, and exposes the administrative
//! operations that keep the cache coherent with the store.
//!
//! # Evaluation order
//!
//! 1. Cache lookup, then store read-through (bounded by the store timeout;
//!    a timeout counts as "not found").
//! 2. Global kill switch.
//! 3. Targeting conditions (environment, tenant, role, plan).
//! 4. A rollout of 100% skips bucketing entirely.
//! 5. Otherwise the subject's bucket must be below the rollout percentage.
//! 6. Enabled, with the flag's metadata.
//!
//! Evaluation never returns an error: any failure yields a disabled result
//! whose reason describes the cause.
//!
//! # Consistency
//!
//! - Administrative mutations write the store first, then the cache, while
//!   holding the engine's writer lock. Full refreshes take the same lock, so
//!   a refresh never installs data fetched before an admin write committed.
//! - Within one process, the effect of a mutation is visible to every
//!   evaluation started after the mutation returns. An evaluation that read
//!   the cache entry before the write may still see the old value.
//! - Across processes sharing one store, consistency is eventual: each
//!   instance converges within its own refresh interval plus in-flight
//!   request latency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flaggate_domain::constants::{MAX_ROLLOUT_PERCENTAGE, METADATA_TAGS_KEY};
use flaggate_domain::validation::{validate_new_flag, validate_patch};
use flaggate_domain::{
    CacheConfig, EvaluationContext, EvaluationReason, EvaluationResult, FlagError, FlagPatch,
    FlagRecord, NewFlag, Result,
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::bucketing::bucket;
use crate::cache::{CacheStats, FlagCache};
use crate::conditions::evaluate_conditions;
use crate::ports::FlagStore;

/// Apply evaluation steps 2-6 to a resolved record.
///
/// `bucketer` is only invoked when the rollout is below 100%.
pub fn evaluate_record<B>(
    record: &FlagRecord,
    context: &EvaluationContext,
    bucketer: B,
) -> EvaluationResult
where
    B: FnOnce(&str, &str) -> u8,
{
    if !record.enabled {
        return EvaluationResult::disabled(&record.name, EvaluationReason::GloballyDisabled);
    }

    if let Err(failure) = evaluate_conditions(record.conditions.as_ref(), context) {
        return EvaluationResult::disabled(&record.name, EvaluationReason::ConditionNotMet(failure));
    }

    let percentage = record.rollout_percentage;
    if percentage < MAX_ROLLOUT_PERCENTAGE {
        let bucket = bucketer(&record.name, context.bucketing_identity());
        if bucket >= percentage {
            return EvaluationResult::disabled(
                &record.name,
                EvaluationReason::NotInRollout { bucket, percentage },
            );
        }
    }

    EvaluationResult::enabled(&record.name, record.metadata.clone())
}

/// Flag evaluation engine with read-through, write-through caching.
pub struct FlagEngine {
    store: Arc<dyn FlagStore>,
    cache: Arc<FlagCache>,
    writer: Mutex<()>,
    store_timeout: Duration,
}

impl FlagEngine {
    /// Create an engine with an empty cache sized by `config`.
    pub fn new(store: Arc<dyn FlagStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            cache: Arc::new(FlagCache::new(config.ttl())),
            writer: Mutex::new(()),
            store_timeout: config.store_timeout(),
        }
    }

    /// The cache evaluations read from.
    pub const fn cache(&self) -> &Arc<FlagCache> {
        &self.cache
    }

    /// The backing store.
    pub const fn store(&self) -> &Arc<dyn FlagStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Decide whether `flag_name` is active for `context`.
    ///
    /// A missing flag is a normal, disabled outcome.
    pub async fn is_enabled(
        &self,
        flag_name: &str,
        context: &EvaluationContext,
    ) -> EvaluationResult {
        let record = match self.lookup(flag_name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(flag_name, "flag not found");
                return EvaluationResult::disabled(flag_name, EvaluationReason::FlagNotFound);
            }
            Err(err) => {
                warn!(flag_name, error = %err, "flag lookup failed during evaluation");
                return EvaluationResult::disabled(
                    flag_name,
                    EvaluationReason::EvaluationError(err.to_string()),
                );
            }
        };

        let result = evaluate_record(&record, context, bucket);
        debug!(
            flag_name,
            enabled = result.enabled,
            reason = %result.reason,
            "feature_flag_evaluated"
        );
        result
    }

    /// Evaluate several flags concurrently for one context.
    ///
    /// Each flag is resolved independently; a failed lookup only affects its
    /// own entry. Duplicate names collapse to a single entry.
    pub async fn evaluate_many<I, S>(
        &self,
        flag_names: I,
        context: &EvaluationContext,
    ) -> HashMap<String, EvaluationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let evaluations = flag_names.into_iter().map(|name| async move {
            let name = name.as_ref();
            (name.to_owned(), self.is_enabled(name, context).await)
        });

        join_all(evaluations).await.into_iter().collect()
    }

    /// Cache-first lookup with store read-through.
    ///
    /// A store timeout is reported as `Ok(None)`.
    async fn lookup(&self, flag_name: &str) -> Result<Option<FlagRecord>> {
        if let Some(record) = self.cache.get(flag_name) {
            debug!(flag_name, "flag cache hit");
            return Ok(Some(record));
        }

        let generation = self.cache.generation();
        let lookup = tokio::time::timeout(self.store_timeout, self.store.find(flag_name));
        let found = match lookup.await {
            Ok(found) => found?,
            Err(_) => {
                warn!(
                    flag_name,
                    timeout_ms = self.store_timeout.as_millis(),
                    "store lookup timed out; treating flag as not found"
                );
                return Ok(None);
            }
        };

        if let Some(record) = &found {
            let cached = self.cache.insert_if_generation(record.clone(), generation);
            debug!(flag_name, cached, "flag read through from store");
        }

        Ok(found)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Full record for `flag_name`, cache first.
    ///
    /// # Errors
    /// Store failures are returned; a timeout reads as `Ok(None)`.
    pub async fn get_flag(&self, flag_name: &str) -> Result<Option<FlagRecord>> {
        self.lookup(flag_name).await
    }

    /// Every stored flag, sorted by name. Always reads the store.
    ///
    /// # Errors
    /// `StoreUnavailable` or `Timeout` from the store call.
    pub async fn get_all_flags(&self) -> Result<Vec<FlagRecord>> {
        let mut flags = self.bounded("find_all", self.store.find_all()).await?;
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }

    /// Flags tagged with `tag` in their metadata, sorted by name.
    ///
    /// # Errors
    /// `StoreUnavailable` or `Timeout` from the store call.
    pub async fn get_flags_by_tag(&self, tag: &str) -> Result<Vec<FlagRecord>> {
        let value = serde_json::Value::String(tag.to_owned());
        let lookup = self.store.find_by_metadata_tag(METADATA_TAGS_KEY, &value);
        let mut flags = self.bounded("find_by_metadata_tag", lookup).await?;
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }

    /// Create a flag and make it visible to evaluation immediately.
    ///
    /// # Errors
    /// `InvalidRecord` before touching the store, `DuplicateName` if the name
    /// exists, `StoreUnavailable`/`Timeout` on store failure.
    pub async fn create_flag(&self, flag: NewFlag, actor: &str) -> Result<FlagRecord> {
        validate_new_flag(&flag)?;

        let _writer = self.writer.lock().await;
        let flag_name = flag.name.clone();
        let created = self.bounded("create", self.store.create(flag, Some(actor))).await;
        let record = self.evict_on_failure(&flag_name, "create", created)?;
        self.cache.insert(record.clone());

        info!(
            flag_name = %record.name,
            actor,
            enabled = record.enabled,
            rollout_percentage = record.rollout_percentage,
            "feature flag created"
        );
        Ok(record)
    }

    /// Apply `patch` in the store and replace the cached copy with the result.
    ///
    /// # Errors
    /// `InvalidRecord` for a bad patch, `NotFound` for an unknown flag,
    /// `StoreUnavailable`/`Timeout` on store failure. A failed store call
    /// evicts the cached copy, since the write may still have landed.
    pub async fn update_flag(
        &self,
        flag_name: &str,
        patch: FlagPatch,
        actor: &str,
    ) -> Result<FlagRecord> {
        validate_patch(&patch)?;

        let _writer = self.writer.lock().await;
        let updated =
            self.bounded("update", self.store.update(flag_name, patch, Some(actor))).await;
        let record = self
            .evict_on_failure(flag_name, "update", updated)?
            .ok_or_else(|| FlagError::NotFound(flag_name.to_owned()))?;
        self.cache.insert(record.clone());

        info!(
            flag_name,
            actor,
            enabled = record.enabled,
            rollout_percentage = record.rollout_percentage,
            "feature flag updated"
        );
        Ok(record)
    }

    /// Remove a flag from the store, then evict it from the cache.
    ///
    /// Returns whether the store held the flag.
    ///
    /// # Errors
    /// `StoreUnavailable`/`Timeout` on store failure; the entry is evicted
    /// either way.
    pub async fn delete_flag(&self, flag_name: &str, actor: &str) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let deleted = self.bounded("delete", self.store.delete(flag_name)).await;
        let removed = self.evict_on_failure(flag_name, "delete", deleted)?;
        self.cache.invalidate(flag_name);

        info!(flag_name, actor, removed, "feature flag deleted");
        Ok(removed)
    }

    /// Drop every cached entry. Subsequent reads go to the store.
    pub async fn clear_cache(&self) {
        let _writer = self.writer.lock().await;
        self.cache.invalidate_all();
        info!("flag cache cleared");
    }

    /// Reload the whole cache from the store.
    ///
    /// On failure the previous mapping is kept.
    ///
    /// # Errors
    /// The store error that prevented the refresh.
    pub async fn refresh_cache(&self) -> Result<usize> {
        let _writer = self.writer.lock().await;
        match self.bounded("find_all", self.store.find_all()).await {
            Ok(records) => {
                let count = records.len();
                self.cache.replace_all(records);
                debug!(count, "flag cache refreshed");
                Ok(count)
            }
            Err(err) => {
                error!(
                    error = %err,
                    retained = self.cache.len(),
                    "flag cache refresh failed; keeping previous entries"
                );
                Err(err)
            }
        }
    }

    /// Point-in-time counters for the cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Upper bound applied to every store call the engine makes.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// An admin write that failed or timed out may still commit in the store,
    /// so the cached copy can no longer be trusted.
    fn evict_on_failure<T>(
        &self,
        flag_name: &str,
        operation: &'static str,
        result: Result<T>,
    ) -> Result<T> {
        result.map_err(|err| {
            self.cache.invalidate(flag_name);
            warn!(flag_name, operation, error = %err, "admin write failed; cache entry evicted");
            err
        })
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, call).await.map_err(|_| {
            FlagError::Timeout(format!(
                "store {operation} exceeded {}ms",
                self.store_timeout.as_millis()
            ))
        })?
    }
}

impl std::fmt::Debug for FlagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagEngine")
            .field("cache", &self.cache)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
