use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::error::{INVALID_CREDENTIALS_MESSAGE, NETWORK_ERROR_MESSAGE, SERVER_ERROR_MESSAGE};
use crate::storage::{CredentialPair, KeyValueStorage, MemoryStorage};

struct Harness {
    service: AuthService,
    persistent: Arc<MemoryStorage>,
    ephemeral: Arc<MemoryStorage>,
}

fn harness(base_url: &str) -> Harness {
    let persistent = Arc::new(MemoryStorage::new());
    let ephemeral = Arc::new(MemoryStorage::new());
    let tokens = Arc::new(TokenStore::new(persistent.clone(), ephemeral.clone()));
    let config = PortalConfig::new(base_url).unwrap();
    Harness { service: AuthService::from_config(&config, tokens).unwrap(), persistent, ephemeral }
}

fn api_base(server: &MockServer) -> String {
    format!("{}/api/v1", server.uri())
}

fn login_body(user: Value) -> Value {
    json!({ "data": { "token": "T1", "refreshToken": "R1", "user": user } })
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_sends_null_for_blank_optionals() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .and(body_json(json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "otherNames": null,
            "email": null,
            "phoneNumber": "0712345678",
            "password": "Secret123!"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": 4 } })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let data = RegistrationRequest {
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        other_names: Some(String::new()),
        email: Some(String::new()),
        phone_number: "0712345678".into(),
        password: "Secret123!".into(),
        ..Default::default()
    };
    let payload = h.service.register(data).await.unwrap();
    assert_eq!(payload, json!({ "data": { "id": 4 } }));
    assert!(!h.service.has_credentials());
}

#[tokio::test]
async fn register_conflict_uses_server_message() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/register"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Phone number already registered" })))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let err = h.service.register(RegistrationRequest::default()).await.unwrap_err();
    assert_eq!(err, AuthError::Api { status: 409, message: "Phone number already registered".into() });
}

// =============================================================================
// login / admin_login
// =============================================================================

#[tokio::test]
async fn remembered_login_stores_persistent_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "identifier": "0712345678", "password": "Secret123!" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(json!({ "id": 1, "role": "user" }))))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let outcome = h.service.login("0712345678", "Secret123!", true).await.unwrap();

    assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
    assert_eq!(h.persistent.get("token").as_deref(), Some("T1"));
    assert_eq!(h.persistent.get("refreshToken").as_deref(), Some("R1"));
    assert_eq!(h.ephemeral.get("token"), None);
}

#[tokio::test]
async fn unremembered_login_stores_ephemeral_pair() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(json!({ "id": 1 }))))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.login("jane@example.test", "pw", false).await.unwrap();

    assert_eq!(h.ephemeral.get("token").as_deref(), Some("T1"));
    assert_eq!(h.persistent.get("token"), None);
}

#[tokio::test]
async fn login_without_user_reports_missing_user() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "T1", "refreshToken": "R1" } })))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let outcome = h.service.login("x", "y", false).await.unwrap();
    assert_eq!(outcome, LoginOutcome::MissingUser { tokens: CredentialPair::new("T1", "R1") });
    assert!(h.service.has_credentials());
}

#[tokio::test]
async fn login_malformed_response_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "user": { "id": 1 } } })))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let err = h.service.login("x", "y", true).await.unwrap_err();
    assert!(matches!(err, AuthError::Client { .. }));
    assert!(!h.service.has_credentials());
}

#[tokio::test]
async fn login_401_without_message_uses_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let err = h.service.login("x", "bad", false).await.unwrap_err();
    assert_eq!(err.message(), INVALID_CREDENTIALS_MESSAGE);
    assert_eq!(err.status(), Some(401));
    assert!(err.is_api_error());
}

#[tokio::test]
async fn admin_login_uses_admin_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/admin-login"))
        .and(body_json(json!({ "email": "ops@example.test", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(json!({ "id": 2, "role": "admin" }))))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    match h.service.admin_login("ops@example.test", "pw", true).await.unwrap() {
        LoginOutcome::Authenticated { user, .. } => assert!(user.is_admin()),
        LoginOutcome::MissingUser { .. } => panic!("expected inline user"),
    }
    assert_eq!(h.persistent.get("token").as_deref(), Some("T1"));
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_posts_refresh_token_and_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .and(header("authorization", "Bearer T1"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.tokens().save(&CredentialPair::new("T1", "R1"), StorageScope::Persistent).unwrap();
    h.service.logout().await;
    assert!(!h.service.has_credentials());
}

#[tokio::test]
async fn logout_server_failure_still_clears() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.tokens().save(&CredentialPair::new("T1", "R1"), StorageScope::Ephemeral).unwrap();
    h.service.logout().await;
    assert_eq!(h.ephemeral.get("token"), None);
    assert_eq!(h.ephemeral.get("refreshToken"), None);
}

#[tokio::test]
async fn logout_network_failure_still_clears() {
    let h = harness("http://127.0.0.1:9/api/v1");
    h.service.tokens().save(&CredentialPair::new("T1", "R1"), StorageScope::Persistent).unwrap();
    h.service.logout().await;
    assert!(!h.service.has_credentials());
}

#[tokio::test]
async fn logout_without_tokens_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.logout().await;
}

// =============================================================================
// refresh
// =============================================================================

#[tokio::test]
async fn refresh_rotates_only_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh-token"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "NEW", "refreshToken": "IGNORED" } })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.tokens().save(&CredentialPair::new("OLD", "R1"), StorageScope::Ephemeral).unwrap();

    assert_eq!(h.service.refresh().await.unwrap(), "NEW");
    assert_eq!(h.ephemeral.get("token").as_deref(), Some("NEW"));
    assert_eq!(h.ephemeral.get("refreshToken").as_deref(), Some("R1"));
    assert_eq!(h.persistent.get("token"), None);
}

#[tokio::test]
async fn refresh_failure_clears_and_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.tokens().save(&CredentialPair::new("OLD", "BAD"), StorageScope::Persistent).unwrap();

    let err = h.service.refresh().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!h.service.has_credentials());
}

#[tokio::test]
async fn refresh_without_token_errors_without_request() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let err = h.service.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::Client { .. }));
}

// =============================================================================
// profile / password flows
// =============================================================================

#[tokio::test]
async fn get_profile_parses_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/profile"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 1, "firstName": "Jane", "role": "user" } })))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.tokens().save(&CredentialPair::new("T1", "R1"), StorageScope::Persistent).unwrap();
    let user = h.service.get_profile().await.unwrap();
    assert_eq!(user.first_name, "Jane");
}

#[tokio::test]
async fn get_profile_server_error_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/profile"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let err = h.service.get_profile().await.unwrap_err();
    assert_eq!(err.message(), SERVER_ERROR_MESSAGE);
}

#[tokio::test]
async fn network_failure_is_flagged() {
    let h = harness("http://127.0.0.1:9/api/v1");
    let err = h.service.get_profile().await.unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(err.message(), NETWORK_ERROR_MESSAGE);
}

#[tokio::test]
async fn forgot_password_email_and_phone_shapes() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/auth/forgot-password"))
        .and(body_json(json!({ "email": "jane@example.test" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/auth/forgot-password"))
        .and(body_json(json!({ "phoneNumber": "0712345678" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    h.service.forgot_password("jane@example.test").await.unwrap();
    h.service.forgot_password("0712345678").await.unwrap();
}

#[tokio::test]
async fn reset_password_posts_to_token_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/reset-password/abc123"))
        .and(body_json(json!({ "password": "N3wSecret!" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Password updated" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&api_base(&server));
    let body = h.service.reset_password("abc123", "N3wSecret!").await.unwrap();
    assert_eq!(body["message"], "Password updated");
}
