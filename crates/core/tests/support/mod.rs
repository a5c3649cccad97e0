//! Shared test helpers for `flaggate-core` integration tests.
//!
//! Provides an in-memory `FlagStore` double with failure and latency
//! injection so engine tests can focus on behaviour instead of plumbing.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flaggate_core::FlagStore;
use flaggate_domain::{FlagError, FlagPatch, FlagRecord, NewFlag, Result as DomainResult};
use parking_lot::Mutex;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory store with switchable failures and artificial latency.
#[derive(Default)]
pub struct MockFlagStore {
    records: Mutex<BTreeMap<String, FlagRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_names: Mutex<HashSet<String>>,
    find_delay: Mutex<Option<Duration>>,
    find_all_delay: Mutex<Option<Duration>>,
    write_delay: Mutex<Option<Duration>>,
    find_calls: AtomicUsize,
    find_all_calls: AtomicUsize,
}

impl MockFlagStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_flags(flags: impl IntoIterator<Item = NewFlag>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut records = store.records.lock();
            for flag in flags {
                let record = flag.into_record(Some("fixture"), Utc::now());
                records.insert(record.name.clone(), record);
            }
        }
        Arc::new(store)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `find` fail for one flag name only.
    pub fn fail_find_for(&self, name: &str) {
        self.failing_names.lock().insert(name.to_owned());
    }

    /// Delay every `find` call by `delay`. The record is read before the
    /// delay, so a slow call returns what was stored when it started.
    pub fn set_find_delay(&self, delay: Option<Duration>) {
        *self.find_delay.lock() = delay;
    }

    /// Delay every `find_all` call by `delay`.
    pub fn set_find_all_delay(&self, delay: Option<Duration>) {
        *self.find_all_delay.lock() = delay;
    }

    /// Delay every write by `delay` after it has been applied, like a commit
    /// whose acknowledgement arrives late.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    /// Read a record bypassing the store API.
    pub fn raw(&self, name: &str) -> Option<FlagRecord> {
        self.records.lock().get(name).cloned()
    }

    /// Mutate storage directly, as another process sharing the store would.
    pub fn put_raw(&self, record: FlagRecord) {
        self.records.lock().insert(record.name.clone(), record);
    }

    pub fn remove_raw(&self, name: &str) {
        self.records.lock().remove(name);
    }

    fn check_reads(&self) -> DomainResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FlagError::StoreUnavailable("injected read failure".into()));
        }
        Ok(())
    }

    async fn pause(delay: &Mutex<Option<Duration>>) {
        let delay = *delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_writes(&self) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FlagError::StoreUnavailable("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FlagStore for MockFlagStore {
    async fn find(&self, name: &str) -> DomainResult<Option<FlagRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        if self.failing_names.lock().contains(name) {
            return Err(FlagError::StoreUnavailable(format!("injected failure for {name}")));
        }
        let found = self.records.lock().get(name).cloned();
        Self::pause(&self.find_delay).await;
        Ok(found)
    }

    async fn find_all(&self) -> DomainResult<Vec<FlagRecord>> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let all: Vec<_> = self.records.lock().values().cloned().collect();
        Self::pause(&self.find_all_delay).await;
        Ok(all)
    }

    async fn find_by_metadata_tag(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<FlagRecord>> {
        self.check_reads()?;
        let records = self.records.lock();
        Ok(records.values().filter(|r| r.has_metadata_tag(key, value)).cloned().collect())
    }

    async fn upsert(
        &self,
        name: &str,
        patch: FlagPatch,
        insert_defaults: NewFlag,
        actor: Option<&str>,
    ) -> DomainResult<FlagRecord> {
        self.check_writes()?;
        let now = Utc::now();
        let stored = {
            let mut records = self.records.lock();
            let record = records.entry(name.to_owned()).or_insert_with(|| {
                let mut defaults = insert_defaults;
                defaults.name = name.to_owned();
                defaults.into_record(actor, now)
            });
            // an empty patch must not claim authorship of an existing record
            let patch_actor = if patch.is_empty() { None } else { actor };
            patch.apply_to(record, patch_actor, now);
            record.clone()
        };
        Self::pause(&self.write_delay).await;
        Ok(stored)
    }

    async fn create(&self, flag: NewFlag, actor: Option<&str>) -> DomainResult<FlagRecord> {
        self.check_writes()?;
        let record = {
            let mut records = self.records.lock();
            if records.contains_key(&flag.name) {
                return Err(FlagError::DuplicateName(flag.name));
            }
            let record = flag.into_record(actor, Utc::now());
            records.insert(record.name.clone(), record.clone());
            record
        };
        Self::pause(&self.write_delay).await;
        Ok(record)
    }

    async fn update(
        &self,
        name: &str,
        patch: FlagPatch,
        actor: Option<&str>,
    ) -> DomainResult<Option<FlagRecord>> {
        self.check_writes()?;
        let updated = self.records.lock().get_mut(name).map(|record| {
            patch.apply_to(record, actor, Utc::now());
            record.clone()
        });
        Self::pause(&self.write_delay).await;
        Ok(updated)
    }

    async fn delete(&self, name: &str) -> DomainResult<bool> {
        self.check_writes()?;
        let removed = self.records.lock().remove(name).is_some();
        Self::pause(&self.write_delay).await;
        Ok(removed)
    }
}
