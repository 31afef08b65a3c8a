//! Fortuna - lottery decision engine
//!
//! The decision core of a points-based lottery platform:
//! - Per-draw decision pipeline (gate, correct, select, execute)
//! - Per-user experiential state machine (streaks, cooldowns, luck debt)
//! - Budget x pressure weight controller
//! - Idempotent, per-user serialized draw execution
//! - Hourly metrics aggregation with a unique-user sketch

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{DrawError, DrawResult};
pub use services::pipeline::{DecisionPipeline, DrawContext, DrawResponse};
