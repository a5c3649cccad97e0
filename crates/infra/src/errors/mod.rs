//! Infrastructure error handling

mod conversions;

pub use conversions::{is_unique_violation, InfraError};
