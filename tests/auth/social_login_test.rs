use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test]
#[serial]
async fn social_login_creates_passwordless_account() {
    let ctx = TestContext::new().await;
    let email = test_email();

    let response = ctx
        .server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "google",
            "provider_user_id": "g-100",
            "email": &email,
            "name": "Social User"
        }))
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert!(body.get("access_token").is_some());
    assert_eq!(body["user"]["email"], email.as_str());

    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert!(password_hash.is_none());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn repeated_social_login_reuses_the_account() {
    let ctx = TestContext::new().await;
    let email = test_email();

    let first = ctx
        .server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "google",
            "provider_user_id": "g-200",
            "email": &email,
            "name": "Social User"
        }))
        .await;
    let first_body: serde_json::Value = first.json();

    let second = ctx
        .server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "google",
            "provider_user_id": "g-200",
            "email": &email,
            "name": "Social User"
        }))
        .await;
    let second_body: serde_json::Value = second.json();

    assert_eq!(first_body["user"]["id"], second_body["user"]["id"]);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn social_login_links_to_existing_password_account() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Password User",
            "email": &email,
            "password": test_password()
        }))
        .await;

    let response = ctx
        .server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "linkedin",
            "provider_user_id": "li-300",
            "email": &email,
            "name": "Password User"
        }))
        .await;

    response.assert_status(StatusCode::OK);

    // One user, now with a linked provider; the password still works.
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    let linked: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM social_accounts WHERE provider = 'linkedin' AND provider_user_id = 'li-300'",
    )
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(linked.0, 1);

    let login = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({ "username": &email, "password": test_password() }))
        .await;
    login.assert_status(StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn social_login_with_unsupported_provider_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "myspace",
            "provider_user_id": "m-1",
            "email": test_email(),
            "name": "Nobody"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

// =============================================================================
// AUTHORIZATION-CODE CALLBACK + DEDUPLICATION
// =============================================================================

#[tokio::test]
#[serial]
async fn google_callback_without_code_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/social/google")
        .json(&json!({ "code": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn duplicate_authorization_code_is_rejected_before_exchange() {
    let ctx = TestContext::new().await;

    // Google is unconfigured in tests, so the first request claims the code
    // and then fails at the exchange step with a server error. The second
    // request must be turned away by the deduplicator without ever reaching
    // the exchange, which a 409 demonstrates.
    let first = ctx
        .server
        .post("/api/auth/social/google")
        .json(&json!({ "code": "code-abc-123" }))
        .await;
    first.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let second = ctx
        .server
        .post("/api/auth/social/google")
        .json(&json!({ "code": "code-abc-123" }))
        .await;
    second.assert_status(StatusCode::CONFLICT);

    let body: serde_json::Value = second.json();
    assert_eq!(body["error"], "Request already being processed");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn distinct_authorization_codes_are_tracked_independently() {
    let ctx = TestContext::new().await;

    let first = ctx
        .server
        .post("/api/auth/social/linkedin")
        .json(&json!({ "code": "code-one" }))
        .await;
    assert_ne!(first.status_code(), StatusCode::CONFLICT);

    let second = ctx
        .server
        .post("/api/auth/social/linkedin")
        .json(&json!({ "code": "code-two" }))
        .await;
    assert_ne!(second.status_code(), StatusCode::CONFLICT);

    ctx.cleanup().await;
}
