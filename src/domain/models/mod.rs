//! Domain models.
//!
//! Entities are plain structs with serde derives; persistence mapping
//! lives in the adapters. All weight and multiplier arithmetic is
//! integer parts-per-million (see [`weights`]).

pub mod admin_intent;
pub mod campaign;
pub mod decision;
pub mod draw;
pub mod experience;
pub mod idempotency;
pub mod metrics;
pub mod outbox;
pub mod pricing;
pub mod prize;
pub mod quota_rule;
pub mod tier_rule;
pub mod weights;

pub use admin_intent::AdminIntent;
pub use campaign::{BudgetMode, Campaign, CampaignStatus, GuaranteeConfig};
pub use decision::{
    BudgetTier, CorrectionTrace, DrawDecision, PipelineType, PressureTier, WeightSnapshot,
};
pub use draw::{DrawRecord, DrawType};
pub use experience::{UserExperienceState, UserGlobalState};
pub use idempotency::{IdempotencyRecord, IdempotencyStatus};
pub use metrics::{hour_bucket, shanghai_day, DrawSample, HourlyMetric};
pub use outbox::{IssueOutboxEntry, OutboxStatus};
pub use pricing::{PricingConfig, PricingMap, PricingStatus};
pub use prize::{Prize, PrizeStatus, PrizeTier};
pub use quota_rule::{QuotaRule, QuotaScope};
pub use tier_rule::TierRule;
pub use weights::{TierMultipliers, TierWeights, PPM};
