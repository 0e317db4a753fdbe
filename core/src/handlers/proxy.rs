//! Entitlement-gated completion proxy.
//!
//! Keeps the upstream API key off the client: the caller's JSON is forwarded
//! verbatim with the service credential, and the upstream status and body
//! come back unchanged.

use bytes::Bytes;
use chrono::Utc;
use serde::de::IgnoredAny;

use super::HandlerContext;
use crate::HandlerError;
use crate::backend::Identity;
use crate::entitlement::{EntitlementStatus, check_entitlement};
use crate::upstream::UpstreamReply;

pub async fn handle(
    ctx: HandlerContext<'_>,
    caller: &Identity,
    body: &Bytes,
) -> Result<UpstreamReply, HandlerError> {
    let entitlement_id = &ctx.config.entitlement_id;
    match check_entitlement(
        ctx.services.ledger.as_ref(),
        &caller.id,
        entitlement_id,
        Utc::now(),
    )
    .await
    {
        Ok(EntitlementStatus::Active { app_user_id }) => {
            tracing::debug!("'{entitlement_id}' active under ledger id {app_user_id}");
        }
        Ok(EntitlementStatus::Inactive) => {
            tracing::info!("no active '{entitlement_id}' entitlement");
            return Err(HandlerError::SubscriptionRequired);
        }
        Err(err) => {
            tracing::error!("entitlement lookup failed: {err}");
            return Err(HandlerError::SubscriptionRequired);
        }
    }

    serde_json::from_slice::<IgnoredAny>(body)
        .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;

    let reply = ctx.services.upstream.forward(body.clone()).await?;
    if !reply.status.is_success() {
        tracing::warn!("upstream answered {}, relaying as-is", reply.status);
    }
    Ok(reply)
}
