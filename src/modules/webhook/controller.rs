use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use crate::modules::auth::crud::UserCrud;
use crate::modules::subscription::crud::{PlanCrud, SubscriptionCrud};
use crate::modules::webhook::interface::WebhookError;
use crate::modules::webhook::schema::{RazorpayEvent, StripeEvent, WebhookResponse};
use crate::services::payments::{razorpay, stripe};
use crate::AppState;

/// Grant the paid plan recorded in the payment's metadata and confirm by
/// email. Email failure is logged only; the subscription is already active.
async fn activate_paid_subscription(
    state: &AppState,
    user_id: &str,
    plan_id: &str,
    payment_id: &str,
) -> Result<(), WebhookError> {
    let plan = PlanCrud::new(state.db.clone())
        .find_by_id(plan_id)
        .await?
        .ok_or_else(|| WebhookError::InvalidPayload(format!("unknown plan {plan_id}")))?;

    let user = UserCrud::new(state.db.clone())
        .find_by_id(user_id)
        .await
        .map_err(|e| WebhookError::Internal(e.to_string()))?
        .ok_or_else(|| WebhookError::InvalidPayload(format!("unknown user {user_id}")))?;

    SubscriptionCrud::new(state.db.clone())
        .activate(user_id, &plan, Some(payment_id), false)
        .await?;

    tracing::info!(user_id, plan_id, payment_id, "subscription activated from webhook");

    let email = state.email.clone();
    let plan_title = plan.title.clone();
    tokio::spawn(async move {
        if let Err(e) = email
            .send_payment_confirmation_email(&user.email, &user.name, &plan_title)
            .await
        {
            tracing::warn!(error = %e, "payment confirmation email failed");
        }
    });

    Ok(())
}

/// Stripe webhook. The signature header is verified against the raw body
/// before the payload is even parsed, and the payment intent is re-fetched
/// from Stripe rather than trusted from the event.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let secret = &state.config.stripe_webhook_secret;
    if secret.is_empty() {
        return Err(WebhookError::NotConfigured("Stripe"));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    stripe::verify_webhook_signature(secret, signature, &body, stripe::SIGNATURE_TOLERANCE_SECS)?;

    let event: StripeEvent =
        serde_json::from_str(&body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    if event.event_type == "payment_intent.succeeded" {
        let intent_id = event.data.object["id"]
            .as_str()
            .ok_or_else(|| WebhookError::InvalidPayload("missing payment intent id".to_string()))?;

        let intent = state.stripe.retrieve_payment_intent(intent_id).await?;
        if intent.status != "succeeded" {
            return Err(WebhookError::PaymentVerification(format!(
                "payment intent status is {}",
                intent.status
            )));
        }

        let user_id = intent
            .metadata
            .get("user_id")
            .ok_or_else(|| WebhookError::InvalidPayload("missing user_id metadata".to_string()))?;
        let plan_id = intent
            .metadata
            .get("plan_id")
            .ok_or_else(|| WebhookError::InvalidPayload("missing plan_id metadata".to_string()))?;

        activate_paid_subscription(&state, user_id, plan_id, &intent.id).await?;
    } else {
        tracing::debug!(event_type = %event.event_type, "ignoring stripe event");
    }

    Ok(Json(WebhookResponse { status: "processed" }))
}

/// Razorpay webhook: header HMAC over the raw body, then the per-payment
/// signature when the payload carries one.
pub async fn razorpay_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let secret = &state.config.razorpay_webhook_secret;
    if secret.is_empty() {
        return Err(WebhookError::NotConfigured("Razorpay"));
    }

    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    razorpay::verify_webhook_signature(secret, signature, &body)?;

    let event: RazorpayEvent =
        serde_json::from_str(&body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    if event.event == "payment.captured" {
        let entity = &event.payload["payment"]["entity"];

        let payment_id = entity["id"]
            .as_str()
            .ok_or_else(|| WebhookError::InvalidPayload("missing payment id".to_string()))?;
        let order_id = entity["order_id"]
            .as_str()
            .ok_or_else(|| WebhookError::InvalidPayload("missing order id".to_string()))?;

        if let Some(payment_signature) = entity["signature"].as_str() {
            razorpay::verify_payment_signature(
                state.razorpay.key_secret(),
                order_id,
                payment_id,
                payment_signature,
            )?;
        }

        let user_id = entity["notes"]["user_id"]
            .as_str()
            .ok_or_else(|| WebhookError::InvalidPayload("missing user_id note".to_string()))?;
        let plan_id = entity["notes"]["plan_id"]
            .as_str()
            .ok_or_else(|| WebhookError::InvalidPayload("missing plan_id note".to_string()))?;

        activate_paid_subscription(&state, user_id, plan_id, payment_id).await?;
    } else {
        tracing::debug!(event = %event.event, "ignoring razorpay event");
    }

    Ok(Json(WebhookResponse { status: "processed" }))
}
