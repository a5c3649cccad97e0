//! Engine constants
//!
//! Centralized location for domain-level constants used throughout the
//! engine.

// Cache configuration
/// Five minutes.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
/// Bound on one store call.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

// Refresh scheduler configuration
/// Bound on one refresh tick.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

// Database configuration
/// Connections per pool.
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// Flag records
/// Longest accepted flag name.
pub const MAX_FLAG_NAME_LENGTH: usize = 64;
/// Rollout at or above this enables every subject.
pub const MAX_ROLLOUT_PERCENTAGE: u8 = 100;
/// Buckets are `0..BUCKET_COUNT`.
pub const BUCKET_COUNT: u32 = 100;

/// Separator between flag name and subject key in bucketing input.
pub const BUCKET_KEY_SEPARATOR: &str = ":";

/// Metadata key holding a flag's tag (string or array of strings).
pub const METADATA_TAGS_KEY: &str = "tags";
