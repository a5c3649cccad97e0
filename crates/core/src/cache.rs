//! In-memory flag cache.
//!
//! The cache holds an immutable snapshot (`Arc<HashMap<..>>`) that writers
//! replace or copy-on-write under a short lock; readers only clone the `Arc`
//! or a single record, so they never observe a half-updated mapping and
//! never wait on I/O.
//!
//! A single `expires_at` governs the whole cache and is reset on every full
//! replace. Staleness only signals that a refresh is due; stale entries are
//! still served.
//!
//! Every authoritative write bumps a generation counter. Read-through
//! population uses [`FlagCache::insert_if_generation`] so that a record
//! fetched before a concurrent update, delete or refresh is discarded
//! instead of overwriting the newer state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flaggate_domain::FlagRecord;
use parking_lot::RwLock;
use tokio::time::Instant;

type Snapshot = Arc<HashMap<String, FlagRecord>>;

/// Point-in-time view of the cache for operational endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached flags.
    pub entries: usize,
    /// True once the snapshot has outlived its TTL.
    pub stale: bool,
    /// Bumped on every replace and invalidation.
    pub generation: u64,
    /// Wall-clock time of the last full replace.
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

struct CacheState {
    entries: Snapshot,
    expires_at: Instant,
    generation: u64,
    last_refreshed_at: Option<DateTime<Utc>>,
}

/// Shared flag cache with whole-cache TTL.
pub struct FlagCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl FlagCache {
    /// Create an empty cache. It is stale until the first full replace.
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: Arc::new(HashMap::new()),
                expires_at: Instant::now(),
                generation: 0,
                last_refreshed_at: None,
            }),
            ttl,
        }
    }

    /// Lifetime of a full snapshot.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached copy of `name`, stale or not.
    pub fn get(&self, name: &str) -> Option<FlagRecord> {
        self.state.read().entries.get(name).cloned()
    }

    /// Current snapshot; later writes do not affect it.
    pub fn get_all(&self) -> Arc<HashMap<String, FlagRecord>> {
        Arc::clone(&self.state.read().entries)
    }

    /// Number of cached flags.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Swap in a complete new mapping and restart the TTL.
    pub fn replace_all(&self, records: Vec<FlagRecord>) {
        let entries: HashMap<String, FlagRecord> =
            records.into_iter().map(|record| (record.name.clone(), record)).collect();

        let mut state = self.state.write();
        state.entries = Arc::new(entries);
        state.expires_at = Instant::now() + self.ttl;
        state.generation += 1;
        state.last_refreshed_at = Some(Utc::now());
    }

    /// Write-through of an authoritative record (create or update).
    pub fn insert(&self, record: FlagRecord) {
        let mut state = self.state.write();
        Arc::make_mut(&mut state.entries).insert(record.name.clone(), record);
        state.generation += 1;
    }

    /// Read-through population; dropped if any authoritative write happened
    /// since `generation` was observed. Returns whether the record was stored.
    pub fn insert_if_generation(&self, record: FlagRecord, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        Arc::make_mut(&mut state.entries).insert(record.name.clone(), record);
        true
    }

    /// Evict one entry. Returns whether it was present.
    pub fn invalidate(&self, name: &str) -> bool {
        let mut state = self.state.write();
        state.generation += 1;
        Arc::make_mut(&mut state.entries).remove(name).is_some()
    }

    /// Drop every entry and mark the cache stale.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write();
        state.entries = Arc::new(HashMap::new());
        state.expires_at = Instant::now();
        state.generation += 1;
    }

    /// Current generation; read-through inserts are checked against it.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// When the current snapshot goes stale.
    pub fn expires_at(&self) -> Instant {
        self.state.read().expires_at
    }

    /// True once the TTL since the last full replace has elapsed.
    pub fn is_stale(&self) -> bool {
        Instant::now() >= self.state.read().expires_at
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            entries: state.entries.len(),
            stale: Instant::now() >= state.expires_at,
            generation: state.generation,
            last_refreshed_at: state.last_refreshed_at,
        }
    }
}

impl std::fmt::Debug for FlagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("FlagCache")
            .field("entries", &state.entries.len())
            .field("generation", &state.generation)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use flaggate_domain::NewFlag;

    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn record(name: &str, enabled: bool) -> FlagRecord {
        NewFlag::new(name).enabled(enabled).into_record(None, Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn new_cache_is_empty_and_stale() {
        let cache = FlagCache::new(TTL);
        assert!(cache.is_empty());
        assert!(cache.is_stale());
        assert!(cache.stats().last_refreshed_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn replace_all_resets_ttl() {
        let cache = FlagCache::new(TTL);
        cache.replace_all(vec![record("a", true), record("b", false)]);

        assert_eq!(cache.len(), 2);
        assert!(!cache.is_stale());

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(!cache.is_stale());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.is_stale());
        // stale entries are still served
        assert!(cache.get("a").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_isolated_from_later_writes() {
        let cache = FlagCache::new(TTL);
        cache.replace_all(vec![record("a", true)]);

        let snapshot = cache.get_all();
        cache.insert(record("a", false));
        cache.insert(record("b", true));

        assert!(snapshot["a"].enabled);
        assert!(!snapshot.contains_key("b"));
        assert_eq!(cache.get("a").map(|r| r.enabled), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn replace_all_drops_absent_entries() {
        let cache = FlagCache::new(TTL);
        cache.replace_all(vec![record("a", true), record("b", true)]);
        cache.replace_all(vec![record("b", true)]);

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn read_through_insert_is_dropped_after_a_write() {
        let cache = FlagCache::new(TTL);
        let observed = cache.generation();

        // A delete lands while the store read is in flight.
        cache.invalidate("a");

        assert!(!cache.insert_if_generation(record("a", true), observed));
        assert!(cache.get("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn read_through_insert_succeeds_without_interference() {
        let cache = FlagCache::new(TTL);
        let observed = cache.generation();

        assert!(cache.insert_if_generation(record("a", true), observed));
        assert_eq!(cache.generation(), observed);
        assert!(cache.get("a").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_and_invalidate_all() {
        let cache = FlagCache::new(TTL);
        cache.replace_all(vec![record("a", true), record("b", true)]);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn stats_reflect_state() {
        let cache = FlagCache::new(TTL);
        cache.replace_all(vec![record("a", true)]);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert!(!stats.stale);
        assert!(stats.last_refreshed_at.is_some());
    }
}
