use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use validator::Validate;

use crate::modules::auth::crud::UserCrud;
use crate::modules::auth::extractor::AuthUser;
use crate::modules::auth::interface::AuthError;
use crate::modules::auth::schema::UserResponse;
use crate::modules::profile::schema::{
    ChangePasswordRequest, MessageResponse, UpdateProfileRequest,
};
use crate::services::hashing;
use crate::AppState;

pub async fn get_profile(auth: AuthUser) -> Json<UserResponse> {
    Json((&auth.user).into())
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::BadRequest(e.to_string()))?;

    let user = UserCrud::new(state.db.clone())
        .update_profile(&auth.user.id, req.name.as_deref(), req.username.as_deref())
        .await?;

    Ok(Json((&user).into()))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Some(current_hash) = auth.user.password_hash.as_deref() else {
        return Err(AuthError::BadRequest(
            "Social login accounts cannot change password".to_string(),
        ));
    };

    if !hashing::verify_password(&req.old_password, current_hash) {
        return Err(AuthError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    if !hashing::is_strong_password(&req.new_password) {
        return Err(AuthError::BadRequest(
            "Password must be at least 8 characters and include upper and lower case letters, a digit and a special character".to_string(),
        ));
    }

    let new_hash = hashing::hash_password(&req.new_password)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    UserCrud::new(state.db.clone())
        .update_password(&auth.user.id, &new_hash)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

/// Soft delete: logins stop working, the record stays. The presented token
/// is revoked so the session ends immediately.
pub async fn deactivate_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    UserCrud::new(state.db.clone())
        .deactivate(&auth.user.id)
        .await?;

    state.revocation.revoke(&auth.token).await?;

    Ok(Json(MessageResponse {
        message: "Account deactivated",
    }))
}

