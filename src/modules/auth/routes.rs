use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::services::rate_limit::{SlidingWindowLayer, SlidingWindowLimiter};
use crate::AppState;

/// Credential endpoints sit behind the per-client sliding window; everything
/// else only gets the router-wide backstop limiter.
pub fn auth_routes(login_limiter: Arc<SlidingWindowLimiter>) -> Router<Arc<AppState>> {
    let sensitive = Router::new()
        .route("/signup", post(controller::signup))
        .route("/login", post(controller::login))
        .route("/forgot-password", post(controller::forgot_password))
        .layer(SlidingWindowLayer::new(login_limiter));

    Router::new()
        .merge(sensitive)
        .route("/social-login", post(controller::social_login))
        .route("/social/google", post(controller::google_login))
        .route("/social/linkedin", post(controller::linkedin_login))
        .route("/reset-password", post(controller::reset_password))
        .route("/verify-email", post(controller::verify_email))
        .route("/verify-email/resend", post(controller::resend_verification))
        .route(
            "/verify-email/{token}/status",
            get(controller::verification_status),
        )
        .route("/logout", post(controller::logout))
        .route("/refresh-token", post(controller::refresh_token))
        .route("/me", get(controller::me))
}
