//! Flag store port.
//!
//! Durable storage of flag definitions keyed by unique flag name. The engine
//! only talks to storage through this trait; adapters live in
//! `flaggate-infra`.
//!
//! # Example
//!
//! ```no_run
//! use flaggate_core::FlagStore;
//!
//! async fn is_known(store: &dyn FlagStore, name: &str) -> bool {
//!     matches!(store.find(name).await, Ok(Some(_)))
//! }
//! ```

use async_trait::async_trait;
use flaggate_domain::{FlagPatch, FlagRecord, NewFlag, Result};

/// Port for reading and mutating stored flag definitions.
///
/// Stores own the audit fields (`created_at`, `updated_at`, `created_by`,
/// `updated_by`) and apply patches; callers always receive full records.
/// Transient I/O failures are reported as `FlagError::StoreUnavailable`.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Look up one flag by name.
    async fn find(&self, name: &str) -> Result<Option<FlagRecord>>;

    /// Every stored flag, in no particular order.
    async fn find_all(&self) -> Result<Vec<FlagRecord>>;

    /// Flags whose `metadata[key]` equals `value` or is an array containing
    /// it.
    async fn find_by_metadata_tag(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<FlagRecord>>;

    /// Insert `insert_defaults` (under `name`) if no flag named `name` exists,
    /// then apply `patch` to the stored record.
    ///
    /// With an empty patch an existing record is left untouched except for
    /// `updated_at`.
    async fn upsert(
        &self,
        name: &str,
        patch: FlagPatch,
        insert_defaults: NewFlag,
        actor: Option<&str>,
    ) -> Result<FlagRecord>;

    /// Insert a new flag.
    ///
    /// # Errors
    /// `FlagError::DuplicateName` if the name is already taken.
    async fn create(&self, flag: NewFlag, actor: Option<&str>) -> Result<FlagRecord>;

    /// Apply `patch` to an existing flag; `None` if the flag does not exist.
    async fn update(
        &self,
        name: &str,
        patch: FlagPatch,
        actor: Option<&str>,
    ) -> Result<Option<FlagRecord>>;

    /// Remove a flag; `true` if a record was removed.
    async fn delete(&self, name: &str) -> Result<bool>;
}
