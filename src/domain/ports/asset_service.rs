//! External asset (points ledger) service contract.
//!
//! The ledger is a collaborator, not part of this core. Debit and
//! issue are idempotent by key: replaying a key returns the original
//! result without moving assets twice.

use async_trait::async_trait;

use crate::domain::errors::DrawResult;

/// Result of a successful debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitReceipt {
    pub balance_before: i64,
    pub balance_after: i64,
}

#[async_trait]
pub trait AssetService: Send + Sync {
    /// Current spendable balance of an account.
    async fn balance(&self, account: &str) -> DrawResult<i64>;

    /// Debit `amount` points. Idempotent by `idem_key`; a replay
    /// returns the original receipt.
    async fn debit(&self, account: &str, amount: i64, idem_key: &str) -> DrawResult<DebitReceipt>;

    /// Grant an item to an account. Idempotent by `idem_key`; returns
    /// a receipt reference.
    async fn issue(&self, account: &str, item_ref: &str, idem_key: &str) -> DrawResult<String>;
}
