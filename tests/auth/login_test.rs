use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, test_password, TestContext};

async fn signup(ctx: &TestContext, email: &str) {
    ctx.server
        .post("/api/auth/signup")
        .add_header("x-forwarded-for", "10.1.0.1")
        .json(&json!({
            "name": "Test User",
            "email": email,
            "password": test_password()
        }))
        .await;
}

#[tokio::test]
#[serial]
async fn login_with_valid_credentials_returns_tokens() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    let response = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({
            "username": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert!(body.get("access_token").is_some());
    assert!(body.get("refresh_token").is_some());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 1800);
    assert_eq!(body["user"]["email"], email.as_str());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_with_wrong_password_returns_unauthorized() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    let response = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({
            "username": &email,
            "password": "WrongPassword123!"
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid email or password");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_with_unknown_email_uses_same_message_as_wrong_password() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({
            "username": "nobody@example.com",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid email or password");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_to_deactivated_account_is_rejected() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    sqlx::query("UPDATE users SET is_active = FALSE WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({
            "username": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Account is disabled");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_to_social_only_account_points_at_social_login() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/api/auth/social-login")
        .json(&json!({
            "provider": "google",
            "provider_user_id": "g-login-1",
            "email": &email,
            "name": "Social User"
        }))
        .await;

    let response = ctx
        .server
        .post("/api/auth/login")
        .form(&json!({
            "username": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Please login with your social account");

    ctx.cleanup().await;
}

// =============================================================================
// RATE LIMITING (credential stuffing)
// =============================================================================

#[tokio::test]
#[serial]
async fn sixth_login_attempt_in_window_is_rate_limited() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    for _ in 0..5 {
        let response = ctx
            .server
            .post("/api/auth/login")
            .add_header("x-forwarded-for", "10.9.9.9")
            .form(&json!({
                "username": &email,
                "password": "WrongPassword123!"
            }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    // Denied regardless of credentials: this one uses the right password.
    let response = ctx
        .server
        .post("/api/auth/login")
        .add_header("x-forwarded-for", "10.9.9.9")
        .form(&json!({
            "username": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn rate_limit_is_per_client_key() {
    let ctx = TestContext::new().await;
    let email = test_email();
    signup(&ctx, &email).await;

    for _ in 0..5 {
        ctx.server
            .post("/api/auth/login")
            .add_header("x-forwarded-for", "10.2.2.2")
            .form(&json!({
                "username": &email,
                "password": "WrongPassword123!"
            }))
            .await;
    }

    let response = ctx
        .server
        .post("/api/auth/login")
        .add_header("x-forwarded-for", "10.3.3.3")
        .form(&json!({
            "username": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::OK);

    ctx.cleanup().await;
}
