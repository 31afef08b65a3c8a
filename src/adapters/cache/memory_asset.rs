//! In-process asset service.
//!
//! Keeps accounts, debit receipts, and issue receipts in memory with
//! full idempotency-by-key semantics. Backs the test suites and the
//! CLI's local draw command; production wiring uses the HTTP client.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::ports::{AssetService, DebitReceipt};

#[derive(Default)]
struct Ledger {
    balances: HashMap<String, i64>,
    debits: HashMap<String, DebitReceipt>,
    issues: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryAssetService {
    ledger: Mutex<Ledger>,
    /// When set, issue calls fail; exercises the outbox path.
    fail_issues: std::sync::atomic::AtomicBool,
}

impl MemoryAssetService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credit(&self, account: &str, amount: i64) {
        let mut ledger = self.ledger.lock().await;
        *ledger.balances.entry(account.to_string()).or_insert(0) += amount;
    }

    pub fn set_fail_issues(&self, fail: bool) {
        self.fail_issues.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn issue_count(&self) -> usize {
        self.ledger.lock().await.issues.len()
    }
}

#[async_trait]
impl AssetService for MemoryAssetService {
    async fn balance(&self, account: &str) -> DrawResult<i64> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.balances.get(account).copied().unwrap_or(0))
    }

    async fn debit(&self, account: &str, amount: i64, idem_key: &str) -> DrawResult<DebitReceipt> {
        let mut ledger = self.ledger.lock().await;
        if let Some(receipt) = ledger.debits.get(idem_key) {
            return Ok(*receipt);
        }
        let balance = ledger.balances.get(account).copied().unwrap_or(0);
        if balance < amount {
            return Err(DrawError::AssetDebitFailed(format!(
                "balance {balance} below debit {amount}"
            )));
        }
        let receipt = DebitReceipt { balance_before: balance, balance_after: balance - amount };
        ledger.balances.insert(account.to_string(), receipt.balance_after);
        ledger.debits.insert(idem_key.to_string(), receipt);
        Ok(receipt)
    }

    async fn issue(&self, account: &str, item_ref: &str, idem_key: &str) -> DrawResult<String> {
        if self.fail_issues.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DrawError::TransientStore("issue endpoint unavailable".to_string()));
        }
        let mut ledger = self.ledger.lock().await;
        if let Some(receipt) = ledger.issues.get(idem_key) {
            return Ok(receipt.clone());
        }
        let receipt = format!("receipt:{}:{}:{}", account, item_ref, Uuid::new_v4());
        ledger.issues.insert(idem_key.to_string(), receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn debit_is_idempotent_by_key() {
        let assets = MemoryAssetService::new();
        assets.credit("u1", 500).await;

        let first = assets.debit("u1", 100, "k1").await.unwrap();
        let replay = assets.debit("u1", 100, "k1").await.unwrap();
        assert_eq!(first, replay);
        assert_eq!(assets.balance("u1").await.unwrap(), 400);
    }

    #[tokio::test]
    async fn insufficient_balance_rejects() {
        let assets = MemoryAssetService::new();
        assets.credit("u1", 50).await;
        let err = assets.debit("u1", 100, "k1").await.unwrap_err();
        assert!(matches!(err, DrawError::AssetDebitFailed(_)));
        assert_eq!(assets.balance("u1").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn issue_replays_same_receipt() {
        let assets = MemoryAssetService::new();
        let a = assets.issue("u1", "prize:p1", "k1:issue").await.unwrap();
        let b = assets.issue("u1", "prize:p1", "k1:issue").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(assets.issue_count().await, 1);
    }
}
