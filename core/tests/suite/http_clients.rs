//! The HTTP-backed collaborators against mock servers, alone and wired into
//! a gateway through `Services::from_config`.

use bytes::Bytes;
use chrono::TimeZone;
use chrono::Utc;
use core_test_support::BILLING_KEY;
use core_test_support::SERVICE_KEY;
use core_test_support::UPSTREAM_KEY;
use core_test_support::full_config;
use core_test_support::http_config;
use core_test_support::mount_session;
use core_test_support::subscriber_body;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;
use solace_core::ApiRequest;
use solace_core::Config;
use solace_core::Endpoint;
use solace_core::Gateway;
use solace_core::Services;
use solace_core::backend::BackendClient;
use solace_core::backend::IdentityProvider;
use solace_core::backend::ObjectStore;
use solace_core::backend::RowStore;
use solace_core::backend::Table;
use solace_core::billing::BillingLedger;
use solace_core::billing::LedgerLookup;
use solace_core::billing::RevenueCatLedger;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::body_string;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

const CHAT: &str = r#"{"model":"gpt-4o-mini","messages":[]}"#;

fn backend_client(server: &MockServer) -> BackendClient {
    BackendClient::new(reqwest::Client::new(), &server.uri(), SERVICE_KEY, "profile-images")
}

fn gateway(config: Config) -> Gateway {
    let services = Services::from_config(&config).expect("build http services");
    Gateway::new(config, services)
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend REST client
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_owned_uses_quoted_in_filter_and_service_key() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/saved_quotes"))
        .and(query_param("user_id", r#"in.("Ab-1","ab-1","AB-1")"#))
        .and(header("apikey", SERVICE_KEY))
        .and(header("authorization", format!("Bearer {SERVICE_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let owners = solace_core::identity::candidate_ids("Ab-1");
    backend_client(&server)
        .delete_owned(Table::SavedQuotes, &owners)
        .await
        .expect("delete succeeds");
}

#[tokio::test]
async fn count_owned_reads_content_range_total() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/conversations"))
        .and(query_param("user_id", "eq.perm-1"))
        .and(header("prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-2/3"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;

    let client = backend_client(&server);
    assert_eq!(client.count_owned(Table::Conversations, "perm-1").await.unwrap(), 3);
    assert_eq!(client.count_owned(Table::Profiles, "perm-1").await.unwrap(), 0);
}

#[tokio::test]
async fn count_owned_without_content_range_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = backend_client(&server)
        .count_owned(Table::SavedQuotes, "perm-1")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn reassign_owner_patches_owner_and_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("user_id", r#"in.("anon-1","ANON-1")"#))
        .and(body_json(json!({
            "user_id": "perm-1",
            "updated_at": "2025-03-01T12:00:00.000Z",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    backend_client(&server)
        .reassign_owner(
            Table::Profiles,
            &["anon-1".to_string(), "ANON-1".to_string()],
            "perm-1",
            Some(at),
        )
        .await
        .expect("patch succeeds");
}

#[tokio::test]
async fn storage_calls_use_bucket_and_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/profile-images"))
        .and(body_partial_json(json!({"prefix": "anon-1", "limit": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "profile.jpg", "id": "obj-1"},
            {"name": "notes.txt", "id": "obj-2"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/move"))
        .and(body_json(json!({
            "bucketId": "profile-images",
            "sourceKey": "anon-1/profile.jpg",
            "destinationKey": "perm-1/profile.jpg",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/profile-images"))
        .and(body_json(json!({"prefixes": ["anon-1/notes.txt"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = backend_client(&server);
    assert_eq!(
        client.list("anon-1", 100).await.unwrap(),
        vec!["profile.jpg".to_string(), "notes.txt".to_string()]
    );
    client
        .move_object("anon-1/profile.jpg", "perm-1/profile.jpg")
        .await
        .unwrap();
    client.remove(&["anon-1/notes.txt".to_string()]).await.unwrap();
    assert_eq!(
        client.public_url("perm-1/profile.jpg"),
        format!(
            "{}/storage/v1/object/public/profile-images/perm-1/profile.jpg",
            server.uri()
        )
    );
}

#[tokio::test]
async fn admin_user_lookup_maps_404_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users/anon-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "anon-1", "is_anonymous": true})),
        )
        .mount(&server)
        .await;

    let client = backend_client(&server);
    let user = client.user_by_id("anon-1").await.unwrap().expect("user");
    assert!(user.is_anonymous);
    assert_eq!(client.user_by_id("missing").await.unwrap(), None);
}

#[tokio::test]
async fn rejected_token_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "bad jwt"})))
        .mount(&server)
        .await;

    let client = backend_client(&server);
    assert_eq!(client.user_for_token("expired").await.unwrap(), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Billing ledger
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ledger_distinguishes_missing_subscriber_and_entitlement() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/with-pro"))
        .and(header("authorization", format!("Bearer {BILLING_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscriber_body(json!(
            "2999-01-01T00:00:00Z"
        ))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/no-pro"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"subscriber": {"entitlements": {}}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let ledger = RevenueCatLedger::new(reqwest::Client::new(), &server.uri(), BILLING_KEY);
    assert!(matches!(
        ledger.lookup("with-pro", "pro").await,
        LedgerLookup::Found(Some(_))
    ));
    assert!(matches!(
        ledger.lookup("no-pro", "pro").await,
        LedgerLookup::Found(None)
    ));
    assert!(matches!(
        ledger.lookup("nobody", "pro").await,
        LedgerLookup::NotFound
    ));
    assert!(matches!(
        ledger.lookup("broken", "pro").await,
        LedgerLookup::Failed(_)
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Full stack
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn proxy_relays_upstream_error_status_and_body() {
    let backend = MockServer::start().await;
    let ledger = MockServer::start().await;
    let upstream = MockServer::start().await;
    mount_session(&backend, "tok", "A1b2", false).await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/a1b2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscriber_body(json!(
            32_503_680_000_000_i64
        ))))
        .mount(&ledger)
        .await;
    let upstream_body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", format!("Bearer {UPSTREAM_KEY}").as_str()))
        .and(body_string(CHAT))
        .respond_with(ResponseTemplate::new(429).set_body_raw(upstream_body, "application/json"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = gateway(http_config(&backend, &ledger, &upstream))
        .handle(Endpoint::AiProxy, ApiRequest::post(Some("Bearer tok"), CHAT))
        .await;

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.body, Bytes::from_static(upstream_body.as_bytes()));
    assert_eq!(response.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn proxy_with_expired_entitlement_never_reaches_upstream() {
    let backend = MockServer::start().await;
    let ledger = MockServer::start().await;
    let upstream = MockServer::start().await;
    mount_session(&backend, "tok", "a1b2", false).await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/a1b2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(subscriber_body(json!("2001-01-01T00:00:00Z"))),
        )
        .mount(&ledger)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = gateway(http_config(&backend, &ledger, &upstream))
        .handle(Endpoint::AiProxy, ApiRequest::post(Some("Bearer tok"), CHAT))
        .await;

    assert_eq!(response.status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn unreachable_upstream_is_502() {
    let backend = MockServer::start().await;
    let ledger = MockServer::start().await;
    mount_session(&backend, "tok", "a1b2", false).await;
    Mock::given(method("GET"))
        .and(path("/v1/subscribers/a1b2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(subscriber_body(json!("2999-01-01T00:00:00Z"))),
        )
        .mount(&ledger)
        .await;

    let config = Config {
        backend_url: Some(backend.uri()),
        billing_base_url: ledger.uri(),
        upstream_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        ..full_config()
    };
    let response = gateway(config)
        .handle(Endpoint::AiProxy, ApiRequest::post(Some("Bearer tok"), CHAT))
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(&response.body[..], br#"{"error":"upstream_unavailable"}"#);
}

#[tokio::test]
async fn eraser_issues_every_backend_call_once() {
    let backend = MockServer::start().await;
    mount_session(&backend, "tok", "User-1", false).await;
    for table in ["profiles", "saved_quotes", "conversations"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/v1/{table}")))
            .and(query_param("user_id", r#"in.("User-1","user-1","USER-1")"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&backend)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/list/profile-images"))
        .and(body_partial_json(json!({"prefix": "user-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "profile.jpg"}])))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/profile-images"))
        .and(body_json(json!({"prefixes": ["user-1/profile.jpg"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/auth/v1/admin/users/User-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&backend)
        .await;

    let config = Config {
        backend_url: Some(backend.uri()),
        ..full_config()
    };
    let response = gateway(config)
        .handle(Endpoint::DeleteAccount, ApiRequest::post(Some("Bearer tok"), ""))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], br#"{"success":true}"#);
}
