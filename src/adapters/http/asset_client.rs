//! HTTP client for the external asset (points ledger) service.
//!
//! The ledger exposes balance, debit, and issue endpoints; debit and
//! issue are idempotent by key on the server side, this client just
//! forwards the key. 4xx responses map to domain errors, everything
//! else is transient.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::ports::{AssetService, DebitReceipt};

#[derive(Debug, Clone)]
pub struct HttpAssetClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpAssetClientConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8200".to_string(), timeout: Duration::from_secs(2) }
    }
}

pub struct HttpAssetClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct DebitRequest<'a> {
    account: &'a str,
    amount: i64,
    idempotency_key: &'a str,
}

#[derive(Deserialize)]
struct DebitResponse {
    balance_before: i64,
    balance_after: i64,
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    account: &'a str,
    item_ref: &'a str,
    idempotency_key: &'a str,
}

#[derive(Deserialize)]
struct IssueResponse {
    receipt: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: i64,
}

impl HttpAssetClient {
    pub fn new(config: HttpAssetClientConfig) -> DrawResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DrawError::Internal(format!("asset client build: {e}")))?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn map_transport(err: reqwest::Error) -> DrawError {
        DrawError::TransientStore(format!("asset service transport: {err}"))
    }
}

#[async_trait]
impl AssetService for HttpAssetClient {
    async fn balance(&self, account: &str) -> DrawResult<i64> {
        let url = format!("{}/accounts/{}/balance", self.base_url, account);
        let response = self.client.get(&url).send().await.map_err(Self::map_transport)?;
        if !response.status().is_success() {
            return Err(DrawError::TransientStore(format!(
                "asset balance returned {}",
                response.status()
            )));
        }
        let body: BalanceResponse = response.json().await.map_err(Self::map_transport)?;
        Ok(body.balance)
    }

    async fn debit(&self, account: &str, amount: i64, idem_key: &str) -> DrawResult<DebitReceipt> {
        let url = format!("{}/debits", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DebitRequest { account, amount, idempotency_key: idem_key })
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            status if status.is_success() => {
                let body: DebitResponse = response.json().await.map_err(Self::map_transport)?;
                Ok(DebitReceipt {
                    balance_before: body.balance_before,
                    balance_after: body.balance_after,
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::PAYMENT_REQUIRED => {
                let detail = response.text().await.unwrap_or_default();
                Err(DrawError::AssetDebitFailed(detail))
            }
            status if status.is_client_error() => {
                let detail = response.text().await.unwrap_or_default();
                Err(DrawError::AssetDebitFailed(format!("{status}: {detail}")))
            }
            status => Err(DrawError::TransientStore(format!("asset debit returned {status}"))),
        }
    }

    async fn issue(&self, account: &str, item_ref: &str, idem_key: &str) -> DrawResult<String> {
        let url = format!("{}/issues", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&IssueRequest { account, item_ref, idempotency_key: idem_key })
            .send()
            .await
            .map_err(Self::map_transport)?;

        if response.status().is_success() {
            let body: IssueResponse = response.json().await.map_err(Self::map_transport)?;
            Ok(body.receipt)
        } else {
            Err(DrawError::TransientStore(format!(
                "asset issue returned {}",
                response.status()
            )))
        }
    }
}
