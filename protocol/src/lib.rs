//! Wire types for the Solace edge endpoints.
//!
//! Every endpoint answers with JSON. Failures share one envelope,
//! `{ "error": "<code>", ...optional fields }`, where `<code>` is one of
//! [`ErrorCode`]. Success bodies are endpoint specific and live next to the
//! request types below.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Routes and CORS
// ─────────────────────────────────────────────────────────────────────────────

/// Route of the entitlement-gated completion proxy.
pub const AI_PROXY_PATH: &str = "/ai-proxy";
/// Route of the account eraser.
pub const DELETE_ACCOUNT_PATH: &str = "/delete-account";
/// Route of the account merger.
pub const MIGRATE_ACCOUNT_PATH: &str = "/migrate-account";

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Body of a successful `OPTIONS` preflight.
pub const PREFLIGHT_BODY: &str = "ok";

// ─────────────────────────────────────────────────────────────────────────────
// Error envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Machine-readable error codes carried in the `error` field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    MethodNotAllowed,
    ServerMisconfigured,
    AuthRequired,
    SubscriptionRequired,
    InvalidRequest,
    PayloadTooLarge,
    UpstreamUnavailable,

    OldUserNotFound,
    OldUserNotAnonymous,

    DeleteProfileFailed,
    DeleteQuotesFailed,
    DeleteConversationsFailed,
    DeleteStorageFailed,
    DeleteUserFailed,

    CheckProfileFailed,
    CheckConversationsFailed,
    CheckQuotesFailed,

    MigrateProfileFailed,
    MigrateConversationsFailed,
    MigrateQuotesFailed,
}

/// `{ "error": "<code>" }`, plus the names of absent settings when the
/// code is `server_misconfigured`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl ErrorBody {
    pub fn new(error: ErrorCode) -> Self {
        Self {
            error,
            missing: None,
        }
    }

    pub fn misconfigured(missing: Vec<String>) -> Self {
        Self {
            error: ErrorCode::ServerMisconfigured,
            missing: Some(missing),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// delete-account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// migrate-account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateAccountRequest {
    #[serde(rename = "oldUserId")]
    pub old_user_id: String,
}

/// Why a merge request was accepted without doing anything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// Old and new identity are the same principal.
    SameUser,
    /// The new identity already owns rows; merging could overwrite them.
    TargetNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MigrateAccountResponse {
    Migrated {
        migrated: bool,
        /// Storage objects that could not be moved. Omitted when zero.
        #[serde(default, skip_serializing_if = "is_zero")]
        files_failed: u32,
    },
    Skipped {
        skipped: SkipReason,
    },
}

impl MigrateAccountResponse {
    pub fn migrated(files_failed: u32) -> Self {
        Self::Migrated {
            migrated: true,
            files_failed,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { skipped: reason }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(n: &u32) -> bool {
    *n == 0
}
