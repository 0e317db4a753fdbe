//! Shared request convention for the edge endpoints.
//!
//! Every endpoint goes through [`Gateway::handle`], which applies, in order:
//!
//! 1. `OPTIONS` preflight → `200 ok`
//! 2. method gate (only `POST`) → `405 method_not_allowed`
//! 3. configuration check → `500 server_misconfigured`
//! 4. bearer token presence and resolution → `401 auth_required`
//! 5. the endpoint's handler
//!
//! Every response carries the permissive CORS headers.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use solace_protocol::{
    AI_PROXY_PATH, CORS_ALLOW_HEADERS, CORS_ALLOW_ORIGIN, DELETE_ACCOUNT_PATH,
    MIGRATE_ACCOUNT_PATH, PREFLIGHT_BODY,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::HandlerError;
use crate::backend::Identity;
use crate::config::{Config, Setting};
use crate::handlers::{HandlerContext, eraser, merger, proxy};
use crate::services::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AiProxy,
    DeleteAccount,
    MigrateAccount,
}

impl Endpoint {
    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::AiProxy,
            Endpoint::DeleteAccount,
            Endpoint::MigrateAccount,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::AiProxy => "ai-proxy",
            Endpoint::DeleteAccount => "delete-account",
            Endpoint::MigrateAccount => "migrate-account",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::AiProxy => AI_PROXY_PATH,
            Endpoint::DeleteAccount => DELETE_ACCOUNT_PATH,
            Endpoint::MigrateAccount => MIGRATE_ACCOUNT_PATH,
        }
    }

    /// Settings that must be present before the endpoint touches anything
    /// external.
    pub fn required_settings(self) -> &'static [Setting] {
        match self {
            Endpoint::AiProxy => &[
                Setting::BackendUrl,
                Setting::BackendServiceKey,
                Setting::UpstreamApiKey,
                Setting::BillingSecretKey,
            ],
            Endpoint::DeleteAccount | Endpoint::MigrateAccount => {
                &[Setting::BackendUrl, Setting::BackendServiceKey]
            }
        }
    }
}

/// Transport-neutral view of an incoming request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Raw `Authorization` header, if any.
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn post(authorization: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            authorization: authorization.map(str::to_string),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body),
        }
    }

    pub fn preflight() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: Bytes::from_static(PREFLIGHT_BODY.as_bytes()),
        }
    }

    pub fn from_error(err: &HandlerError) -> Self {
        Self::json(err.status(), &err.body())
    }

    /// Headers to send: CORS always, content type when known.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("access-control-allow-origin", CORS_ALLOW_ORIGIN.to_string()),
            ("access-control-allow-headers", CORS_ALLOW_HEADERS.to_string()),
        ];
        if let Some(content_type) = &self.content_type {
            headers.push(("content-type", content_type.clone()));
        }
        headers
    }
}

/// Extracts the token from `Bearer <token>`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Preflight and non-POST answers, which need neither config nor auth.
fn method_gate(method: &Method) -> Option<ApiResponse> {
    if *method == Method::OPTIONS {
        return Some(ApiResponse::preflight());
    }
    if *method != Method::POST {
        return Some(ApiResponse::from_error(&HandlerError::MethodNotAllowed));
    }
    None
}

fn reject(endpoint: Endpoint, err: &HandlerError) -> ApiResponse {
    if err.is_dependency_failure() {
        tracing::error!("{endpoint:?} failed: {err}");
    } else {
        tracing::info!("{endpoint:?} rejected: {err}");
    }
    ApiResponse::from_error(err)
}

/// Entry point shared by every endpoint.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<Config>,
    services: Services,
}

impl Gateway {
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config: Arc::new(config),
            services,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle(&self, endpoint: Endpoint, request: ApiRequest) -> ApiResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", endpoint = endpoint.as_str(), %request_id);

        async move {
            if let Some(response) = method_gate(&request.method) {
                return response;
            }
            match self.dispatch(endpoint, &request).await {
                Ok(response) => response,
                Err(err) => reject(endpoint, &err),
            }
        }
        .instrument(span)
        .await
    }

    /// Answers a request whose body the transport could not hand over,
    /// such as one above `max_body_bytes`. Preflight and the method gate
    /// still apply first.
    pub fn handle_unreadable_body(
        &self,
        endpoint: Endpoint,
        method: &Method,
        err: HandlerError,
    ) -> ApiResponse {
        let request_id = Uuid::new_v4();
        let _span =
            tracing::info_span!("request", endpoint = endpoint.as_str(), %request_id).entered();
        method_gate(method).unwrap_or_else(|| reject(endpoint, &err))
    }

    async fn dispatch(
        &self,
        endpoint: Endpoint,
        request: &ApiRequest,
    ) -> Result<ApiResponse, HandlerError> {
        let missing = self.config.missing(endpoint.required_settings());
        if !missing.is_empty() {
            return Err(HandlerError::Misconfigured(missing));
        }

        let token =
            bearer_token(request.authorization.as_deref()).ok_or(HandlerError::AuthRequired)?;
        let caller = self.resolve_caller(token).await?;

        let ctx = HandlerContext {
            config: &self.config,
            services: &self.services,
        };
        match endpoint {
            Endpoint::AiProxy => {
                let reply = proxy::handle(ctx, &caller, &request.body).await?;
                Ok(ApiResponse {
                    status: reply.status,
                    content_type: reply
                        .content_type
                        .or_else(|| Some("application/json".to_string())),
                    body: reply.body,
                })
            }
            Endpoint::DeleteAccount => {
                let result = eraser::handle(ctx, &caller).await?;
                Ok(ApiResponse::json(StatusCode::OK, &result))
            }
            Endpoint::MigrateAccount => {
                let result = merger::handle(ctx, &caller, &request.body).await?;
                Ok(ApiResponse::json(StatusCode::OK, &result))
            }
        }
    }

    async fn resolve_caller(&self, token: &str) -> Result<Identity, HandlerError> {
        match self.services.identity.user_for_token(token).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(HandlerError::AuthRequired),
            Err(err) => {
                tracing::warn!("token resolution failed: {err}");
                Err(HandlerError::AuthRequired)
            }
        }
    }
}
