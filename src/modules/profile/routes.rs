use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::AppState;

pub fn profile_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(controller::get_profile)
                .patch(controller::update_profile)
                .delete(controller::deactivate_account),
        )
        .route("/change-password", post(controller::change_password))
}
