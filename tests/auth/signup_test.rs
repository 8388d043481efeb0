use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test]
#[serial]
async fn signup_with_valid_data_returns_created() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": test_email(),
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert!(body.get("user").is_some());
    assert!(body["user"].get("id").is_some());
    assert!(body["user"].get("email").is_some());
    assert_eq!(body["user"]["is_verified"], false);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_stores_verification_token() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": &email,
            "password": test_password()
        }))
        .await;

    let token = ctx.verification_token_for(&email).await;
    assert!(!token.is_empty());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_with_invalid_email_returns_bad_request() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": "invalid-email",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_with_weak_password_returns_bad_request() {
    let ctx = TestContext::new().await;

    for weak in ["short1!", "alllowercase1!", "NoDigitsHere!", "NoSpecials123"] {
        let response = ctx
            .server
            .post("/api/auth/signup")
            .json(&json!({
                "name": "Test User",
                "email": test_email(),
                "password": weak
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_with_existing_email_returns_conflict() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": &email,
            "password": test_password()
        }))
        .await;

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Other User",
            "email": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_with_missing_fields_returns_unprocessable() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "email": test_email(),
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await;
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
#[serial]
async fn signup_rate_limits_sixth_attempt_in_window() {
    let ctx = TestContext::new().await;

    for _ in 0..5 {
        let response = ctx
            .server
            .post("/api/auth/signup")
            .add_header("x-forwarded-for", "10.8.8.8")
            .json(&json!({
                "name": "Test User",
                "email": test_email(),
                "password": test_password()
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
    }

    let response = ctx
        .server
        .post("/api/auth/signup")
        .add_header("x-forwarded-for", "10.8.8.8")
        .json(&json!({
            "name": "Test User",
            "email": test_email(),
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Another client is unaffected.
    let response = ctx
        .server
        .post("/api/auth/signup")
        .add_header("x-forwarded-for", "10.8.8.9")
        .json(&json!({
            "name": "Test User",
            "email": test_email(),
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    ctx.cleanup().await;
}

// =============================================================================
// CONCURRENT REQUESTS (Race Condition)
// =============================================================================

#[tokio::test]
#[serial]
async fn signup_handles_concurrent_duplicate_emails() {
    let ctx = TestContext::new().await;
    let email = test_email();

    let (res1, res2) = tokio::join!(
        ctx.server.post("/api/auth/signup").json(&json!({
            "name": "Test User",
            "email": &email,
            "password": test_password()
        })),
        ctx.server.post("/api/auth/signup").json(&json!({
            "name": "Test User",
            "email": &email,
            "password": test_password()
        }))
    );

    let statuses = [res1.status_code(), res2.status_code()];
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();

    // At most one row exists regardless of how the race resolved; the unique
    // constraint converts the loser into a 409.
    assert!(created >= 1, "unexpected statuses: {:?}", statuses);
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    ctx.cleanup().await;
}

// =============================================================================
// SECURITY
// =============================================================================

#[tokio::test]
#[serial]
async fn signup_response_includes_security_headers() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": test_email(),
            "password": test_password()
        }))
        .await;

    assert!(response.headers().get("x-content-type-options").is_some());
    assert!(response.headers().get("x-frame-options").is_some());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signup_rejects_oversized_payload() {
    let ctx = TestContext::new().await;

    let large_password = "a".repeat(1_000_000);

    let response = ctx
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "name": "Test User",
            "email": test_email(),
            "password": &large_password
        }))
        .await;

    assert!(
        response.status_code() == StatusCode::PAYLOAD_TOO_LARGE
            || response.status_code() == StatusCode::BAD_REQUEST
    );

    ctx.cleanup().await;
}
