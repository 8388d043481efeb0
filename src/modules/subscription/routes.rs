use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::AppState;

pub fn subscription_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plans", get(controller::subscription_plans))
        .route("/current", get(controller::current_subscription))
        .route("/status", get(controller::subscription_status))
        .route("/subscribe", post(controller::subscribe))
        .route("/cancel", post(controller::cancel))
        .route("/checkout", post(controller::checkout))
}

pub fn plan_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(controller::list_plans))
        .route("/{plan_id}", get(controller::get_plan))
}

pub fn feature_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(controller::list_features))
}
