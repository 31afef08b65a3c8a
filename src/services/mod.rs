//! Services for the lottery decision engine.

pub mod config;
pub mod corrections;
pub mod executor;
pub mod experience;
pub mod metrics;
pub mod outbox_worker;
pub mod pipeline;
pub mod pressure;
pub mod pricing_service;
pub mod selector;
pub mod telemetry;

pub use config::{ConfigLoader, EngineConfig};
pub use corrections::{Correction, CorrectionOutcome, CorrectionRegistry};
pub use executor::{DrawExecutor, ExecutionOutcome, ExecutionRequest};
pub use metrics::MetricsAggregator;
pub use outbox_worker::{DrainReport, IssueOutboxWorker};
pub use pipeline::{DecisionPipeline, DecisionPipelineBuilder, DrawContext, DrawResponse};
pub use pressure::{BudgetPressureController, PressureCell};
pub use pricing_service::PricingService;
