//! # Flaggate Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Flag store adapters (in-memory, SQLite via an r2d2 pool)
//! - The background cache refresh scheduler
//! - Configuration loading from env and files
//! - The runtime composition root
//!
//! ## Architecture
//! - Implements traits defined in `flaggate-core`
//! - Contains all "impure" code (I/O, timers, environment)

#![deny(missing_docs)]

pub mod config;
pub mod database;
pub mod errors;
pub mod runtime;
pub mod scheduling;

// Re-export commonly used items
pub use database::{DbManager, InMemoryFlagStore, SqliteFlagStore};
pub use errors::InfraError;
pub use runtime::FlagRuntime;
pub use scheduling::{RefreshScheduler, RefreshSchedulerConfig, SchedulerError};
