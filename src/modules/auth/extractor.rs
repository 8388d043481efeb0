use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jsonwebtoken::errors::ErrorKind;
use std::sync::Arc;

use crate::modules::auth::crud::UserCrud;
use crate::modules::auth::interface::AuthError;
use crate::modules::auth::model::User;
use crate::AppState;

/// Identity resolved from the request's bearer token, plus the raw token so
/// handlers like logout can revoke it.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Same as [`AuthUser`] but additionally requires a verified email address.
pub struct VerifiedUser(pub AuthUser);

pub fn classify_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenMalformed,
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?;
    Ok(token.trim().to_string())
}

/// The validation sequence, in this exact order: empty check, revocation
/// list, signature/expiry, claims, then the user load. The revocation check
/// runs before decoding so an expired-but-revoked token still reports
/// "invalidated", consistent with tokens revoked at logout.
pub async fn validate_access_token(state: &AppState, token: &str) -> Result<User, AuthError> {
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    if state.revocation.is_revoked(token).await? {
        return Err(AuthError::TokenInvalidated);
    }

    let data = state
        .jwt_service
        .verify_access_token(token)
        .map_err(classify_jwt_error)?;

    if data.claims.sub.is_empty() {
        return Err(AuthError::InvalidClaims);
    }

    UserCrud::new(state.db.clone())
        .find_by_id(&data.claims.sub)
        .await?
        .ok_or(AuthError::UserNotFound)
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = validate_access_token(state, &token).await?;
        Ok(AuthUser { user, token })
    }
}

impl FromRequestParts<Arc<AppState>> for VerifiedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.user.is_verified {
            return Err(AuthError::EmailNotVerified);
        }
        Ok(VerifiedUser(auth))
    }
}
