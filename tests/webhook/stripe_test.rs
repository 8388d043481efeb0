use axum::http::StatusCode;
use serial_test::serial;

use platform_api::services::payments::stripe::sign_payload;

use crate::common::{TestContext, STRIPE_WEBHOOK_SECRET};

fn signed_header(payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    format!(
        "t={},v1={}",
        timestamp,
        sign_payload(STRIPE_WEBHOOK_SECRET, timestamp, payload)
    )
}

#[tokio::test]
#[serial]
async fn webhook_without_signature_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/api/webhook/stripe")
        .text(r#"{"type":"payment_intent.succeeded","data":{"object":{}}}"#)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn webhook_with_invalid_signature_is_rejected() {
    let ctx = TestContext::new().await;

    let payload = r#"{"type":"payment_intent.succeeded","data":{"object":{}}}"#;
    let bogus = format!("t={},v1={}", chrono::Utc::now().timestamp(), "0".repeat(64));

    let response = ctx
        .server
        .post("/api/webhook/stripe")
        .add_header("stripe-signature", bogus)
        .text(payload)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn webhook_with_stale_timestamp_is_rejected() {
    let ctx = TestContext::new().await;

    let payload = r#"{"type":"payment_intent.succeeded","data":{"object":{}}}"#;
    let old = chrono::Utc::now().timestamp() - 600;
    let header = format!(
        "t={},v1={}",
        old,
        sign_payload(STRIPE_WEBHOOK_SECRET, old, payload)
    );

    let response = ctx
        .server
        .post("/api/webhook/stripe")
        .add_header("stripe-signature", header)
        .text(payload)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn signature_must_match_exact_body() {
    let ctx = TestContext::new().await;

    let signed_for = r#"{"type":"payment_intent.created","data":{"object":{}}}"#;
    let tampered = r#"{"type":"payment_intent.succeeded","data":{"object":{}}}"#;

    let response = ctx
        .server
        .post("/api/webhook/stripe")
        .add_header("stripe-signature", signed_header(signed_for))
        .text(tampered)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn unhandled_event_types_are_acknowledged() {
    let ctx = TestContext::new().await;

    let payload = r#"{"type":"customer.created","data":{"object":{}}}"#;

    let response = ctx
        .server
        .post("/api/webhook/stripe")
        .add_header("stripe-signature", signed_header(payload))
        .text(payload)
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "processed");

    ctx.cleanup().await;
}
