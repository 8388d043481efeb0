use axum::{routing::post, Router};
use std::sync::Arc;

use super::controller;
use crate::AppState;

pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stripe", post(controller::stripe_webhook))
        .route("/razorpay", post(controller::razorpay_webhook))
}
