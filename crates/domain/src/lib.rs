//! # Flaggate Domain
//!
//! Business domain types and models for the flag engine.
//!
//! This crate contains:
//! - Flag records, patches and evaluation context/result types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and validation rules
//!
//! ## Architecture
//! - No dependencies on other flaggate crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

#![deny(missing_docs)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
