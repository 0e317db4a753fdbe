//! Billing ledger client.
//!
//! The ledger is read-only from the edge's point of view: one subscriber
//! lookup per identifier casing, authenticated with a bearer secret.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;

use crate::entitlement::EntitlementRecord;

/// Errors from the billing ledger that abort an entitlement check.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Ledger returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// Result of a single subscriber lookup.
///
/// `NotFound` is kept apart from `Failed` so that a variant without a
/// subscriber record is skipped while a real ledger failure is not.
#[derive(Debug)]
pub enum LedgerLookup {
    /// Subscriber exists. `None` when it has no record for the entitlement.
    Found(Option<EntitlementRecord>),
    NotFound,
    Failed(LedgerError),
}

#[async_trait]
pub trait BillingLedger: Send + Sync {
    async fn lookup(&self, app_user_id: &str, entitlement_id: &str) -> LedgerLookup;
}

/// HTTP client for the subscriber endpoint of the billing ledger.
pub struct RevenueCatLedger {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl RevenueCatLedger {
    pub fn new(client: reqwest::Client, base_url: &str, secret_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn subscriber_url(&self, app_user_id: &str) -> String {
        format!(
            "{}/v1/subscribers/{}",
            self.base_url,
            urlencoding::encode(app_user_id)
        )
    }

    async fn fetch(&self, app_user_id: &str, entitlement_id: &str) -> Result<LedgerLookup, LedgerError> {
        let response = self
            .client
            .get(self.subscriber_url(app_user_id))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(LedgerLookup::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        let subscriber = body
            .get("subscriber")
            .ok_or_else(|| LedgerError::InvalidResponse("missing 'subscriber'".to_string()))?;

        let record = subscriber
            .get("entitlements")
            .and_then(|e| e.get(entitlement_id))
            .filter(|e| e.is_object())
            .map(EntitlementRecord::from_json);
        Ok(LedgerLookup::Found(record))
    }
}

#[async_trait]
impl BillingLedger for RevenueCatLedger {
    async fn lookup(&self, app_user_id: &str, entitlement_id: &str) -> LedgerLookup {
        match self.fetch(app_user_id, entitlement_id).await {
            Ok(lookup) => lookup,
            Err(err) => LedgerLookup::Failed(err),
        }
    }
}
