use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, test_password, TestContext};

async fn signup(ctx: &TestContext, email: &str) {
    ctx.server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": email,
            "password": test_password()
        }))
        .await;
}

// =============================================================================
// END-TO-END FLOW
// =============================================================================

#[tokio::test]
#[serial]
async fn verification_flow_pending_then_verified_then_already_verified() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    let token = ctx.verification_token_for(&email).await;

    let response = ctx
        .server
        .get(&format!("/api/auth/verify-email/{token}/status"))
        .await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");

    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &token }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "verified");

    // Replay: no second state mutation, answer flips to already_verified.
    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &token }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "already_verified");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn verify_email_marks_user_verified_and_clears_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    let token = ctx.verification_token_for(&email).await;

    ctx.server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &token }))
        .await;

    let (is_verified, stored_token): (bool, Option<String>) = sqlx::query_as(
        "SELECT is_verified, verification_token FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_one(&ctx.db)
    .await
    .unwrap();

    assert!(is_verified);
    assert!(stored_token.is_none());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn verify_email_with_invalid_token_returns_bad_request() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": "invalid-token-12345" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "expired");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn verify_email_outside_window_returns_bad_request() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    sqlx::query(
        "UPDATE users SET verification_sent_at = DATE_SUB(NOW(), INTERVAL 25 HOUR) WHERE email = ?",
    )
    .bind(&email)
    .execute(&ctx.db)
    .await
    .unwrap();

    let token = ctx.verification_token_for(&email).await;

    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &token }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

// =============================================================================
// CONCURRENT VERIFICATION (Race Condition)
// =============================================================================

#[tokio::test]
#[serial]
async fn concurrent_verification_yields_exactly_one_state_transition() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    let token = ctx.verification_token_for(&email).await;

    let (res1, res2) = tokio::join!(
        ctx.server
            .post("/api/auth/verify-email")
            .json(&json!({ "token": &token })),
        ctx.server
            .post("/api/auth/verify-email")
            .json(&json!({ "token": &token }))
    );

    let b1: serde_json::Value = res1.json();
    let b2: serde_json::Value = res2.json();
    let statuses = [b1["status"].as_str().unwrap(), b2["status"].as_str().unwrap()];

    assert_eq!(
        statuses.iter().filter(|s| **s == "verified").count(),
        1,
        "exactly one request may observe the transition: {:?}",
        statuses
    );
    assert_eq!(statuses.iter().filter(|s| **s == "already_verified").count(), 1);

    ctx.cleanup().await;
}

// =============================================================================
// STATUS ENDPOINT
// =============================================================================

#[tokio::test]
#[serial]
async fn status_for_unknown_token_is_invalid() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .get("/api/auth/verify-email/not-a-real-token/status")
        .await;

    response.assert_status(StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "invalid");

    ctx.cleanup().await;
}

// =============================================================================
// RESEND
// =============================================================================

#[tokio::test]
#[serial]
async fn resend_overwrites_previous_token() {
    let ctx = TestContext::new().await;
    let (email, access_token, _) = ctx.create_and_login().await;

    let first_token = ctx.verification_token_for(&email).await;

    let response = ctx
        .server
        .post("/api/auth/verify-email/resend")
        .authorization_bearer(&access_token)
        .await;

    response.assert_status(StatusCode::OK);

    let second_token = ctx.verification_token_for(&email).await;
    assert_ne!(first_token, second_token);

    // The superseded token no longer verifies.
    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &first_token }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // The fresh one does.
    let response = ctx
        .server
        .post("/api/auth/verify-email")
        .json(&json!({ "token": &second_token }))
        .await;
    response.assert_status(StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn resend_for_already_verified_user_reports_already_verified() {
    let ctx = TestContext::new().await;
    let (email, access_token, _) = ctx.create_and_login().await;

    sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/api/auth/verify-email/resend")
        .authorization_bearer(&access_token)
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("already"));

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn resend_requires_authentication() {
    let ctx = TestContext::new().await;

    let response = ctx.server.post("/api/auth/verify-email/resend").await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}
