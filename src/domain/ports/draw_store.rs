//! Draw unit of work.
//!
//! The executor is the only mutating component; everything it touches
//! goes through one explicit transaction handle obtained here. The
//! handle re-validates critical invariants that read-side caches may
//! have served stale.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{
    Campaign, DrawDecision, DrawRecord, IssueOutboxEntry, UserExperienceState, UserGlobalState,
};

#[async_trait]
pub trait DrawStore: Send + Sync {
    async fn begin(&self) -> DrawResult<Box<dyn DrawUnitOfWork>>;
}

/// One open transaction. Dropping without `commit` rolls back.
#[async_trait]
pub trait DrawUnitOfWork: Send {
    /// Reload the campaign inside the transaction.
    async fn campaign(&mut self, id: Uuid) -> DrawResult<Campaign>;

    /// Deduct `amount` from a budget-pool campaign's remaining budget.
    /// Returns false (and deducts nothing) if the remainder would go
    /// negative.
    async fn consume_budget(&mut self, campaign_id: Uuid, amount: i64) -> DrawResult<bool>;

    /// Give back budget consumed for an award that later failed its
    /// stock decrement, capped at the campaign total.
    async fn refund_budget(&mut self, campaign_id: Uuid, amount: i64) -> DrawResult<()>;

    /// Conditional decrement: `stock = stock - 1 WHERE stock > 0`.
    /// Returns whether a unit was taken. Infinite-stock prizes always
    /// succeed.
    async fn decrement_stock(&mut self, prize_id: Uuid) -> DrawResult<bool>;

    /// In-transaction quota recount for the Shanghai day.
    async fn count_user_draws_on_day(
        &mut self,
        campaign_id: Uuid,
        user_id: &str,
        day: NaiveDate,
    ) -> DrawResult<u32>;

    async fn insert_draw(&mut self, record: &DrawRecord) -> DrawResult<()>;

    async fn insert_decision(&mut self, decision: &DrawDecision) -> DrawResult<()>;

    async fn upsert_experience(&mut self, state: &UserExperienceState) -> DrawResult<()>;

    async fn upsert_global(&mut self, state: &UserGlobalState) -> DrawResult<()>;

    /// Mark an admin intent consumed by this draw.
    async fn consume_admin_intent(&mut self, intent_id: Uuid) -> DrawResult<()>;

    async fn enqueue_issue(&mut self, entry: &IssueOutboxEntry) -> DrawResult<()>;

    async fn commit(self: Box<Self>) -> DrawResult<()>;

    async fn rollback(self: Box<Self>) -> DrawResult<()>;
}
