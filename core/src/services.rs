//! Collaborator bundle shared by all handlers.

use std::sync::Arc;

use crate::USER_AGENT;
use crate::backend::{BackendClient, IdentityProvider, ObjectStore, RowStore};
use crate::billing::{BillingLedger, RevenueCatLedger};
use crate::config::{Config, Setting};
use crate::upstream::{CompletionUpstream, HttpCompletionUpstream};

/// Handles to every external system a handler may call.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub rows: Arc<dyn RowStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ledger: Arc<dyn BillingLedger>,
    pub upstream: Arc<dyn CompletionUpstream>,
}

impl Services {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        rows: Arc<dyn RowStore>,
        objects: Arc<dyn ObjectStore>,
        ledger: Arc<dyn BillingLedger>,
        upstream: Arc<dyn CompletionUpstream>,
    ) -> Self {
        Self {
            identity,
            rows,
            objects,
            ledger,
            upstream,
        }
    }

    /// Builds the HTTP-backed collaborators from `config`.
    ///
    /// Absent credentials become empty strings here; the gateway refuses
    /// requests that need them before any of these clients is called.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        let backend = Arc::new(BackendClient::new(
            client.clone(),
            &config.backend_base(),
            config.get(Setting::BackendServiceKey).unwrap_or_default(),
            &config.storage_bucket,
        ));
        let ledger = Arc::new(RevenueCatLedger::new(
            client.clone(),
            &config.billing_base_url,
            config.get(Setting::BillingSecretKey).unwrap_or_default(),
        ));
        let upstream = Arc::new(HttpCompletionUpstream::new(
            client,
            &config.upstream_url,
            config.get(Setting::UpstreamApiKey).unwrap_or_default(),
        ));

        Ok(Self::new(
            backend.clone(),
            backend.clone(),
            backend,
            ledger,
            upstream,
        ))
    }
}
