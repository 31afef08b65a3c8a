//! Domain ports (interfaces) for the lottery decision engine.

pub mod admin_intent_repository;
pub mod asset_service;
pub mod campaign_repository;
pub mod clock;
pub mod draw_repository;
pub mod draw_store;
pub mod experience_repository;
pub mod idempotency_store;
pub mod lock_service;
pub mod metrics_sink;
pub mod outbox_repository;
pub mod pricing_repository;
pub mod prize_repository;
pub mod rng;
pub mod rule_repository;

pub use admin_intent_repository::AdminIntentRepository;
pub use asset_service::{AssetService, DebitReceipt};
pub use campaign_repository::CampaignRepository;
pub use clock::{Clock, FixedClock, SystemClock};
pub use draw_repository::DrawRepository;
pub use draw_store::{DrawStore, DrawUnitOfWork};
pub use experience_repository::ExperienceRepository;
pub use idempotency_store::{IdempotencyStore, ReservationOutcome};
pub use lock_service::{DrawLockGuard, DrawLockService};
pub use metrics_sink::MetricsSink;
pub use outbox_repository::OutboxRepository;
pub use pricing_repository::PricingRepository;
pub use prize_repository::PrizeRepository;
pub use rng::{DrawRng, OsDrawRng, SeededDrawRng};
pub use rule_repository::{QuotaRuleRepository, TierRuleRepository};
