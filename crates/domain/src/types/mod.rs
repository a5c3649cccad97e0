//! Domain types and models

pub mod context;
pub mod evaluation;
pub mod flag;

pub use context::EvaluationContext;
pub use evaluation::{ConditionFailure, EvaluationReason, EvaluationResult};
pub use flag::{FlagConditions, FlagPatch, FlagRecord, Metadata, NewFlag};
