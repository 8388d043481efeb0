use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;

use crate::modules::auth::extractor::{AuthUser, VerifiedUser};
use crate::modules::auth::interface::AuthError;
use crate::modules::auth::schema::UserResponse;
use crate::modules::subscription::crud::{PlanCrud, SubscriptionCrud};
use crate::modules::subscription::schema::{
    CheckoutRequest, CheckoutResponse, CurrentSubscriptionResponse, FeatureResponse,
    MessageResponse, PlanFilter, PlanResponse, SubscribeRequest, SubscriptionResponse,
    SubscriptionStatusResponse,
};
use crate::services::payments::PaymentError;
use crate::AppState;

async fn catalog(
    state: &AppState,
    billing_period: Option<&str>,
) -> Result<Vec<PlanResponse>, AuthError> {
    let crud = PlanCrud::new(state.db.clone());
    let plans = crud.list(billing_period).await?;

    let mut responses = Vec::with_capacity(plans.len());
    for plan in plans {
        let features = crud.features_for(&plan.id).await?;
        responses.push(PlanResponse::new(plan, features));
    }

    Ok(responses)
}

/// Public plan catalog, optionally filtered by billing period.
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PlanFilter>,
) -> Result<Json<Vec<PlanResponse>>, AuthError> {
    Ok(Json(catalog(&state, filter.billing_period.as_deref()).await?))
}

pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanResponse>, AuthError> {
    let crud = PlanCrud::new(state.db.clone());
    let plan = crud
        .find_by_id(&plan_id)
        .await?
        .ok_or(AuthError::PlanNotFound)?;
    let features = crud.features_for(&plan.id).await?;

    Ok(Json(PlanResponse::new(plan, features)))
}

pub async fn list_features(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FeatureResponse>>, AuthError> {
    let features = PlanCrud::new(state.db.clone()).list_features().await?;

    Ok(Json(
        features
            .into_iter()
            .map(|f| FeatureResponse { id: f.id, text: f.text })
            .collect(),
    ))
}

/// Same catalog, mounted under /subscription for older clients.
pub async fn subscription_plans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PlanResponse>>, AuthError> {
    Ok(Json(catalog(&state, None).await?))
}

pub async fn current_subscription(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<CurrentSubscriptionResponse>, AuthError> {
    let subscription = SubscriptionCrud::new(state.db.clone())
        .current_for_user(&auth.user.id)
        .await?;

    Ok(Json(CurrentSubscriptionResponse {
        success: true,
        subscription: subscription.map(Into::into),
    }))
}

/// Snapshot read from the user record; requires authentication but not a
/// verified email.
pub async fn subscription_status(auth: AuthUser) -> Json<SubscriptionStatusResponse> {
    let user_response = UserResponse::from(&auth.user);

    Json(SubscriptionStatusResponse {
        subscription: user_response.subscription,
        is_verified: auth.user.is_verified,
    })
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscriptionResponse>, AuthError> {
    let plan = PlanCrud::new(state.db.clone())
        .find_by_id(&req.plan_id)
        .await?
        .ok_or(AuthError::PlanNotFound)?;

    let subscription = SubscriptionCrud::new(state.db.clone())
        .activate(&auth.user.id, &plan, req.payment_id.as_deref(), req.auto_renew)
        .await?;

    let email = state.email.clone();
    let user = auth.user.clone();
    let plan_title = plan.title.clone();
    let end_date = subscription.end_date.format("%Y-%m-%d").to_string();
    tokio::spawn(async move {
        if let Err(e) = email
            .send_subscription_update_email(&user.email, &user.name, &plan_title, &end_date)
            .await
        {
            tracing::warn!(error = %e, "subscription update email failed");
        }
    });

    Ok(Json(subscription.into()))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    let cancelled = SubscriptionCrud::new(state.db.clone())
        .cancel(&auth.user.id)
        .await?;

    if !cancelled {
        return Err(AuthError::BadRequest(
            "No active subscription to cancel".to_string(),
        ));
    }

    Ok(Json(MessageResponse {
        message: "Subscription cancelled successfully",
    }))
}

fn map_payment_error(e: PaymentError) -> AuthError {
    match e {
        PaymentError::NotConfigured(_) => AuthError::BadRequest(e.to_string()),
        PaymentError::Provider(_) | PaymentError::Response(_) => {
            AuthError::Internal(e.to_string())
        }
        other => AuthError::BadRequest(other.to_string()),
    }
}

/// Creates the provider-side payment object for a plan purchase. Requires a
/// verified email, matching the gate on the original checkout flow.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    VerifiedUser(auth): VerifiedUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AuthError> {
    let plan = PlanCrud::new(state.db.clone())
        .find_by_id(&req.plan_id)
        .await?
        .ok_or(AuthError::PlanNotFound)?;

    let response = match req.payment_method.as_str() {
        "stripe" => {
            let currency = req.currency.unwrap_or_else(|| "USD".to_string());
            let intent = state
                .stripe
                .create_payment_intent(plan.price, &currency, &auth.user.id, &plan.id)
                .await
                .map_err(map_payment_error)?;

            CheckoutResponse {
                provider: "stripe",
                payment_id: intent.id,
                client_secret: intent.client_secret,
                amount: plan.price,
                currency,
            }
        }
        "razorpay" => {
            let currency = req.currency.unwrap_or_else(|| "INR".to_string());
            let order = state
                .razorpay
                .create_order(plan.price, &currency, &auth.user.id, &plan.id)
                .await
                .map_err(map_payment_error)?;

            CheckoutResponse {
                provider: "razorpay",
                payment_id: order.id,
                client_secret: None,
                amount: plan.price,
                currency,
            }
        }
        other => {
            return Err(AuthError::BadRequest(format!(
                "Invalid payment method: {other}"
            )))
        }
    };

    Ok(Json(response))
}
