//! Entitlement evaluation for the completion proxy.
//!
//! A ledger record is considered active when any of these holds, checked in
//! order:
//!
//! 1. the ledger's own `is_active` flag is `true`
//! 2. a grace-period expiry is present and in the future
//! 3. no expiry is present at all (non-expiring entitlement)
//! 4. the expiry is present and in the future
//!
//! Timestamps arrive either as ISO-8601 strings (full timestamps with or
//! without an offset, or bare dates) or epoch milliseconds. A string that
//! does not parse is treated as absent, which makes an
//! unparseable expiry fall under rule 3.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::billing::{BillingLedger, LedgerError, LedgerLookup};
use crate::identity::candidate_ids;

/// One entitlement as reported by the billing ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementRecord {
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub grace_period_expires_at: Option<DateTime<Utc>>,
}

impl EntitlementRecord {
    /// Builds a record from the ledger's JSON entitlement object.
    pub fn from_json(value: &Value) -> Self {
        Self {
            is_active: value.get("is_active").and_then(Value::as_bool),
            expires_at: value.get("expires_date").and_then(parse_timestamp),
            grace_period_expires_at: value
                .get("grace_period_expires_date")
                .and_then(parse_timestamp),
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_active == Some(true) {
            return true;
        }
        if self.grace_period_expires_at.is_some_and(|grace| grace > now) {
            return true;
        }
        match self.expires_at {
            None => true,
            Some(expires) => expires > now,
        }
    }
}

/// Parses an ISO-8601 string or an epoch-millisecond number.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

/// ISO-8601 forms accepted besides RFC 3339, with an offset.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Offset-less forms, taken as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    // Date-only expiries mean midnight UTC of that day.
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Outcome of an entitlement check across all identifier casings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementStatus {
    /// `app_user_id` is the casing under which the active record was found.
    Active { app_user_id: String },
    Inactive,
}

/// Looks up `entitlement_id` for every casing of `user_id`, stopping at the
/// first active record.
///
/// A variant the ledger does not know is skipped. Any other ledger failure
/// aborts the whole check.
pub async fn check_entitlement(
    ledger: &dyn BillingLedger,
    user_id: &str,
    entitlement_id: &str,
    now: DateTime<Utc>,
) -> Result<EntitlementStatus, LedgerError> {
    for app_user_id in candidate_ids(user_id) {
        match ledger.lookup(&app_user_id, entitlement_id).await {
            LedgerLookup::Found(Some(record)) if record.is_active_at(now) => {
                return Ok(EntitlementStatus::Active { app_user_id });
            }
            LedgerLookup::Found(Some(_)) => {
                tracing::debug!("entitlement '{entitlement_id}' expired for a variant");
            }
            LedgerLookup::Found(None) => {
                tracing::debug!("subscriber has no '{entitlement_id}' entitlement");
            }
            LedgerLookup::NotFound => {
                tracing::debug!("no ledger subscriber for variant, trying next");
            }
            LedgerLookup::Failed(err) => return Err(err),
        }
    }
    Ok(EntitlementStatus::Inactive)
}
