//! Background scheduling
//!
//! The refresh scheduler keeps the flag cache warm:
//! - Explicit lifecycle management (start/stop)
//! - Join handle for the spawned task
//! - Cancellation token support
//! - Timeout wrapping on every refresh

pub mod error;
pub mod refresh_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use refresh_scheduler::{RefreshScheduler, RefreshSchedulerConfig};
