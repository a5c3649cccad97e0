//! In-process flag store.
//!
//! Default store for tests and for runtimes configured without a database
//! path. Data lives only as long as the process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use flaggate_core::FlagStore;
use flaggate_domain::{FlagError, FlagPatch, FlagRecord, NewFlag, Result};
use tokio::sync::RwLock;

/// `FlagStore` backed by an ordered map.
#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    records: RwLock<BTreeMap<String, FlagRecord>>,
}

impl InMemoryFlagStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored flags.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when no flag is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FlagStore for InMemoryFlagStore {
    async fn find(&self, name: &str) -> Result<Option<FlagRecord>> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn find_all(&self) -> Result<Vec<FlagRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_metadata_tag(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<FlagRecord>> {
        let records = self.records.read().await;
        Ok(records.values().filter(|record| record.has_metadata_tag(key, value)).cloned().collect())
    }

    async fn upsert(
        &self,
        name: &str,
        patch: FlagPatch,
        insert_defaults: NewFlag,
        actor: Option<&str>,
    ) -> Result<FlagRecord> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let record = records.entry(name.to_owned()).or_insert_with(|| {
            let mut defaults = insert_defaults;
            defaults.name = name.to_owned();
            defaults.into_record(actor, now)
        });

        let patch_actor = if patch.is_empty() { None } else { actor };
        patch.apply_to(record, patch_actor, now);
        Ok(record.clone())
    }

    async fn create(&self, flag: NewFlag, actor: Option<&str>) -> Result<FlagRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&flag.name) {
            return Err(FlagError::DuplicateName(flag.name));
        }
        let record = flag.into_record(actor, Utc::now());
        records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        name: &str,
        patch: FlagPatch,
        actor: Option<&str>,
    ) -> Result<Option<FlagRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(name).map(|record| {
            patch.apply_to(record, actor, Utc::now());
            record.clone()
        }))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(name).is_some())
    }
}
