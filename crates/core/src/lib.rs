//! # Flaggate Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The flag store port (trait) implemented by infrastructure adapters
//! - Deterministic rollout bucketing and condition evaluation
//! - The in-memory flag cache and the evaluation engine
//! - Bootstrap seeding of canonical flags
//!
//! ## Architecture Principles
//! - Only depends on `flaggate-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

#![deny(missing_docs)]

pub mod bootstrap;
pub mod bucketing;
pub mod cache;
pub mod conditions;
pub mod engine;
pub mod ports;

pub use bootstrap::{canonical_flags, BootstrapSeeder, SeedReport, CANONICAL_FLAGS_VERSION};
pub use bucketing::bucket;
pub use cache::{CacheStats, FlagCache};
pub use conditions::evaluate_conditions;
pub use engine::{evaluate_record, FlagEngine};
pub use ports::FlagStore;
