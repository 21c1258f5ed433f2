//! Integration tests for account endpoints

use actalog_client::storage::TOKEN_KEY;
use actalog_client::{ClientError, Gateway, MemoryStorage, RecordingNavigator, SessionPersistence};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, Gateway, Arc<RecordingNavigator>) {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "stale");
    let navigator = Arc::new(RecordingNavigator::new());
    let gateway = Gateway::builder()
        .base_url(server.uri())
        .storage(storage)
        .navigator(navigator.clone())
        .build()
        .unwrap();
    (server, gateway, navigator)
}

fn message(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"message": text}))
}

#[tokio::test]
async fn test_forgot_password() {
    let (server, gateway, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/forgot-password"))
        .and(body_json(json!({"email": "ada@x.com"})))
        .respond_with(message(
            "If an account exists with that email, a password reset link has been sent",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway.forgot_password("ada@x.com").await.unwrap();
    assert!(response.message.starts_with("If an account exists"));
}

#[tokio::test]
async fn test_reset_password_rejects_short_password_locally() {
    let (server, gateway, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/reset-password"))
        .respond_with(message("Password has been reset successfully"))
        .expect(0)
        .mount(&server)
        .await;

    let error = gateway.reset_password("tok", "short").await.unwrap_err();
    assert!(matches!(error, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_reset_password() {
    let (server, gateway, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/reset-password"))
        .and(body_json(json!({"token": "tok", "new_password": "longenough"})))
        .respond_with(message("Password has been reset successfully"))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway.reset_password("tok", "longenough").await.unwrap();
    assert_eq!(response.message, "Password has been reset successfully");
}

#[tokio::test]
async fn test_verify_email_with_bad_token_does_not_end_session() {
    let (server, gateway, navigator) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/verify-email"))
        .and(query_param("token", "expired"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Invalid or expired verification token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let error = gateway.verify_email("expired").await.unwrap_err();

    assert_eq!(
        error.server_message(),
        Some("Invalid or expired verification token")
    );
    assert!(navigator.routes().is_empty());
    assert_eq!(gateway.current_token().as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_resend_verification() {
    let (server, gateway, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/resend-verification"))
        .and(body_json(json!({"email": "ada@x.com"})))
        .respond_with(message("Verification email sent"))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway.resend_verification("ada@x.com").await.unwrap();
    assert_eq!(response.message, "Verification email sent");
}
