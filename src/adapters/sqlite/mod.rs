//! SQLite adapters over sqlx.

pub mod admin_intent_repository;
pub mod campaign_repository;
pub mod draw_repository;
pub mod draw_store;
pub mod experience_repository;
pub mod idempotency_store;
pub mod metrics_store;
pub mod outbox_repository;
pub mod pricing_repository;
pub mod prize_repository;
pub mod rule_repository;
pub mod store;

pub use admin_intent_repository::SqliteAdminIntentRepository;
pub use campaign_repository::SqliteCampaignRepository;
pub use draw_repository::SqliteDrawRepository;
pub use draw_store::SqliteDrawStore;
pub use experience_repository::SqliteExperienceRepository;
pub use idempotency_store::SqliteIdempotencyStore;
pub use metrics_store::SqliteMetricsStore;
pub use outbox_repository::SqliteOutboxRepository;
pub use pricing_repository::SqlitePricingRepository;
pub use prize_repository::SqlitePrizeRepository;
pub use rule_repository::{SqliteQuotaRuleRepository, SqliteTierRuleRepository};
pub use store::{SqliteStore, StoreError, StoreSettings};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// UTC range `[start, end)` covering one Asia/Shanghai calendar day.
/// Day N in Shanghai starts at N-1 16:00 UTC.
pub(crate) fn shanghai_day_utc_range(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let start = DateTime::<Utc>::from_naive_utc_and_offset(
        local_midnight - TimeDelta::hours(8),
        Utc,
    );
    (start, start + TimeDelta::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn shanghai_day_maps_to_utc_window() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (start, end) = shanghai_day_utc_range(day);
        assert_eq!(start.hour(), 16);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(end - start, TimeDelta::hours(24));
    }
}
