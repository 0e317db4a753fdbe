//! Request-level error taxonomy.

use reqwest::StatusCode;
use solace_protocol::{ErrorBody, ErrorCode};
use thiserror::Error;

use crate::backend::BackendError;
use crate::upstream::UpstreamError;

/// Every way a request can fail. Each variant maps to one wire code and
/// one HTTP status.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Missing configuration: {}", .0.join(", "))]
    Misconfigured(Vec<String>),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Active subscription required")]
    SubscriptionRequired,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Old user not found")]
    OldUserNotFound,

    #[error("Old user is not anonymous")]
    OldUserNotAnonymous,

    /// A backend call failed partway through a multi-step operation.
    #[error("{code}: {source}")]
    Step {
        code: ErrorCode,
        #[source]
        source: BackendError,
    },

    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] UpstreamError),
}

impl HandlerError {
    pub fn step(code: ErrorCode) -> impl FnOnce(BackendError) -> HandlerError {
        move |source| HandlerError::Step { code, source }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            HandlerError::MethodNotAllowed => ErrorCode::MethodNotAllowed,
            HandlerError::Misconfigured(_) => ErrorCode::ServerMisconfigured,
            HandlerError::AuthRequired => ErrorCode::AuthRequired,
            HandlerError::SubscriptionRequired => ErrorCode::SubscriptionRequired,
            HandlerError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            HandlerError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            HandlerError::OldUserNotFound => ErrorCode::OldUserNotFound,
            HandlerError::OldUserNotAnonymous => ErrorCode::OldUserNotAnonymous,
            HandlerError::Step { code, .. } => *code,
            HandlerError::Upstream(_) => ErrorCode::UpstreamUnavailable,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Misconfigured(_) | HandlerError::Step { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            HandlerError::AuthRequired => StatusCode::UNAUTHORIZED,
            HandlerError::SubscriptionRequired => StatusCode::PAYMENT_REQUIRED,
            HandlerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::InvalidRequest(_)
            | HandlerError::OldUserNotFound
            | HandlerError::OldUserNotAnonymous => StatusCode::BAD_REQUEST,
            HandlerError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            HandlerError::Misconfigured(missing) => ErrorBody::misconfigured(missing.clone()),
            other => ErrorBody::new(other.code()),
        }
    }

    /// Whether this failure came from a dependent system rather than the
    /// caller.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            HandlerError::Step { .. } | HandlerError::Upstream(_) | HandlerError::Misconfigured(_)
        )
    }
}
