//! HTTP front for the Solace edge endpoints.
//!
//! Every endpoint path accepts any method; the gateway decides what a
//! method means (preflight, rejection or dispatch).

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any, get};
use bytes::Bytes;
use solace_core::{ApiRequest, ApiResponse, Endpoint, Gateway, HandlerError};
use tokio::net::TcpListener;

pub const HEALTH_PATH: &str = "/healthz";

pub fn router(gateway: Arc<Gateway>) -> Router {
    let body_limit = gateway.config().max_body_bytes;
    let mut router = Router::new().route(HEALTH_PATH, get(|| async { "ok" }));
    for endpoint in Endpoint::all() {
        router = router.route(endpoint.path(), endpoint_route(*endpoint));
    }
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(gateway)
}

fn endpoint_route(endpoint: Endpoint) -> MethodRouter<Arc<Gateway>> {
    any(
        move |State(gateway): State<Arc<Gateway>>,
              method: Method,
              headers: HeaderMap,
              body: Result<Bytes, BytesRejection>| async move {
            let body = match body {
                Ok(body) => body,
                Err(rejection) => {
                    let err = body_error(&rejection, gateway.config().max_body_bytes);
                    return to_http(gateway.handle_unreadable_body(endpoint, &method, err));
                }
            };
            let request = ApiRequest {
                method,
                authorization: headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body,
            };
            to_http(gateway.handle(endpoint, request).await)
        },
    )
}

fn body_error(rejection: &BytesRejection, limit: usize) -> HandlerError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HandlerError::PayloadTooLarge { limit }
    } else {
        HandlerError::InvalidRequest(rejection.body_text())
    }
}

fn to_http(response: ApiResponse) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!("dropping unrepresentable {name} header"),
        }
    }
    (response.status, headers, response.body).into_response()
}

/// Serves `gateway` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, gateway: Arc<Gateway>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {addr}");
    }
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await
}
