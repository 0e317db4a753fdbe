use core_test_support::Harness;
use core_test_support::full_config;
use pretty_assertions::assert_eq;
use reqwest::Method;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use solace_core::ApiRequest;
use solace_core::ApiResponse;
use solace_core::Config;
use solace_core::Endpoint;
use solace_core::HandlerError;

fn body_json(response: &ApiResponse) -> Value {
    serde_json::from_slice(&response.body).expect("response body is JSON")
}

fn request(method: Method, authorization: Option<&str>) -> ApiRequest {
    ApiRequest {
        method,
        authorization: authorization.map(str::to_string),
        body: "{}".into(),
    }
}

#[tokio::test]
async fn preflight_answers_ok_everywhere() {
    let harness = Harness::new();
    for endpoint in Endpoint::all() {
        let response = harness
            .gateway
            .handle(*endpoint, request(Method::OPTIONS, None))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{endpoint:?}");
        assert_eq!(&response.body[..], b"ok");
        assert!(
            response
                .headers()
                .contains(&("access-control-allow-origin", "*".to_string()))
        );
    }
    assert_eq!(harness.backend.writes(), 0);
}

#[tokio::test]
async fn non_post_methods_are_rejected_before_auth() {
    let harness = Harness::new();
    harness.backend.add_user("tok", "u-1", false);
    for endpoint in Endpoint::all() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let response = harness
                .gateway
                .handle(*endpoint, request(method.clone(), Some("Bearer tok")))
                .await;
            assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body_json(&response), json!({"error": "method_not_allowed"}));
        }
    }
    assert!(harness.ledger.calls().is_empty());
    assert!(harness.upstream.received().is_empty());
}

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
    let harness = Harness::new();
    harness.backend.add_user("tok", "u-1", false);
    for endpoint in Endpoint::all() {
        for auth in [None, Some("tok"), Some("Bearer "), Some("Bearer nope")] {
            for body in ["", "{}", "not json", r#"{"oldUserId":"anon-1"}"#] {
                let response = harness
                    .gateway
                    .handle(*endpoint, ApiRequest::post(auth, body))
                    .await;
                assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{auth:?} {body}");
                assert_eq!(body_json(&response), json!({"error": "auth_required"}));
            }
        }
    }
    assert_eq!(harness.backend.writes(), 0);
    assert!(harness.ledger.calls().is_empty());
}

#[tokio::test]
async fn token_resolution_failure_is_treated_as_unauthenticated() {
    let harness = Harness::new();
    harness.backend.add_user("tok", "u-1", false);
    harness
        .backend
        .fail(core_test_support::FailPoint::ResolveToken);
    let response = harness
        .gateway
        .handle(Endpoint::DeleteAccount, ApiRequest::post(Some("Bearer tok"), ""))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(harness.backend.user_exists("u-1"));
}

#[tokio::test]
async fn misconfiguration_names_missing_variables() {
    let config = Config {
        upstream_api_key: None,
        billing_secret_key: Some("   ".to_string()),
        ..full_config()
    };
    let harness = Harness::with_config(config);
    harness.backend.add_user("tok", "u-1", false);

    let response = harness
        .gateway
        .handle(Endpoint::AiProxy, ApiRequest::post(Some("Bearer tok"), "{}"))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(&response),
        json!({
            "error": "server_misconfigured",
            "missing": ["OPENAI_API_KEY", "REVENUECAT_SECRET_KEY"],
        })
    );

    // The account endpoints only need the backend credentials.
    harness.backend.add_row(solace_core::backend::Table::Profiles, "u-1");
    let response = harness
        .gateway
        .handle(Endpoint::DeleteAccount, ApiRequest::post(Some("Bearer tok"), ""))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn configuration_is_checked_before_the_token() {
    let config = Config {
        backend_service_key: None,
        ..full_config()
    };
    let harness = Harness::with_config(config);
    let response = harness
        .gateway
        .handle(Endpoint::MigrateAccount, ApiRequest::post(None, "{}"))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(&response)["missing"],
        json!(["SUPABASE_SERVICE_ROLE_KEY"])
    );
}

#[tokio::test]
async fn error_responses_carry_cors_and_json_content_type() {
    let harness = Harness::new();
    let response = harness
        .gateway
        .handle(Endpoint::AiProxy, ApiRequest::post(None, "{}"))
        .await;
    let headers = response.headers();
    assert!(headers.contains(&("access-control-allow-origin", "*".to_string())));
    assert!(headers.contains(&("content-type", "application/json".to_string())));
}

#[tokio::test]
async fn unreadable_body_is_answered_after_the_method_gate() {
    let harness = Harness::new();
    let too_large = || HandlerError::PayloadTooLarge { limit: 1024 };

    let response = harness
        .gateway
        .handle_unreadable_body(Endpoint::AiProxy, &Method::POST, too_large());
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(&response), json!({"error": "payload_too_large"}));
    assert!(
        response
            .headers()
            .contains(&("access-control-allow-origin", "*".to_string()))
    );

    let response = harness
        .gateway
        .handle_unreadable_body(Endpoint::AiProxy, &Method::OPTIONS, too_large());
    assert_eq!(response.status, StatusCode::OK);

    let response = harness
        .gateway
        .handle_unreadable_body(Endpoint::DeleteAccount, &Method::PUT, too_large());
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(harness.ledger.calls().is_empty());
}
