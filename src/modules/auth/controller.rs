use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Form, Json};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::modules::auth::crud::{UserCrud, VerificationOutcome};
use crate::modules::auth::extractor::{classify_jwt_error, AuthUser};
use crate::modules::auth::interface::AuthError;
use crate::modules::auth::model::User;
use crate::modules::auth::schema::{
    ForgotPasswordRequest, ForgotPasswordResponse, LoginForm, LogoutRequest, LogoutResponse,
    OAuthCodeRequest, RefreshTokenRequest, ResendVerificationResponse, ResetPasswordRequest,
    ResetPasswordResponse, SignupRequest, SignupResponse, SocialLoginRequest, TokenPairResponse,
    UserResponse, VerificationStatusResponse, VerifyEmailRequest, VerifyEmailResponse,
};
use crate::services::hashing;
use crate::services::oauth::{OAuthError, SocialUserInfo};
use crate::AppState;

const PASSWORD_POLICY: &str =
    "Password must be at least 8 characters and include upper and lower case letters, a digit and a special character";

const FORGOT_PASSWORD_MESSAGE: &str =
    "If your email is registered, you will receive a password reset link.";

fn issue_token_pair(state: &AppState, user: &User) -> Result<(String, String), AuthError> {
    let access = state
        .jwt_service
        .create_access_token(&user.id, &user.email)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    let refresh = state
        .jwt_service
        .create_refresh_token(&user.id)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok((access, refresh))
}

fn token_pair_response(state: &AppState, user: &User) -> Result<TokenPairResponse, AuthError> {
    let (access_token, refresh_token) = issue_token_pair(state, user)?;
    Ok(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.jwt_service.get_access_token_duration_secs(),
        user: user.into(),
    })
}

// =============================================================================
// SIGNUP / LOGIN
// =============================================================================

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AuthError> {
    req.validate()
        .map_err(|e| AuthError::BadRequest(e.to_string()))?;

    if !hashing::is_strong_password(&req.password) {
        return Err(AuthError::BadRequest(PASSWORD_POLICY.to_string()));
    }

    let crud = UserCrud::new(state.db.clone());
    if crud.email_exists(&req.email).await? {
        return Err(AuthError::EmailAlreadyExists);
    }

    // Email goes out first: a user row is only created once the verification
    // mail was accepted, so nobody is left waiting for mail that never left.
    let verification_token = Uuid::new_v4().to_string();
    state
        .email
        .send_verification_email(&req.email, &req.name, &verification_token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "verification email failed during signup");
            AuthError::EmailDelivery("verification email".to_string())
        })?;

    let password_hash =
        hashing::hash_password(&req.password).map_err(|e| AuthError::Internal(e.to_string()))?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: req.email.clone(),
        username: req.email.clone(),
        name: req.name.clone(),
        phone: req.phone.clone(),
        password_hash: Some(password_hash),
        role: "user".to_string(),
        is_active: true,
        is_verified: false,
        verification_token: Some(verification_token),
        verification_sent_at: Some(now),
        password_reset_token: None,
        password_reset_expires: None,
        subscription_plan: None,
        subscription_status: None,
        subscription_start: None,
        subscription_end: None,
        subscription_auto_renew: false,
        subscription_payment_id: None,
        created_at: now,
        updated_at: now,
    };

    crud.create(&user).await?;

    tracing::info!(email = %user.email, "user created, verification pending");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user: (&user).into() }),
    ))
}

/// OAuth2-style credential login: form-encoded, email in the username field.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let crud = UserCrud::new(state.db.clone());
    let user = crud.authenticate(&form.username, &form.password).await?;

    Ok(Json(token_pair_response(&state, &user)?))
}

// =============================================================================
// SOCIAL LOGIN
// =============================================================================

fn provider_name(provider: &str) -> Result<&'static str, AuthError> {
    match provider {
        "google" => Ok("google"),
        "linkedin" => Ok("linkedin"),
        other => Err(AuthError::BadRequest(format!(
            "Unsupported provider: {other}"
        ))),
    }
}

async fn login_social_user(
    state: &AppState,
    info: SocialUserInfo,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let crud = UserCrud::new(state.db.clone());
    let user = crud.upsert_social_user(&info).await?;

    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }

    Ok(Json(token_pair_response(state, &user)?))
}

/// Direct social login with provider-resolved identity (mobile clients that
/// run the OAuth flow themselves).
pub async fn social_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SocialLoginRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    req.validate()
        .map_err(|e| AuthError::BadRequest(e.to_string()))?;

    let info = SocialUserInfo {
        provider: provider_name(&req.provider)?,
        provider_user_id: req.provider_user_id.clone(),
        email: req.email.clone(),
        name: Some(req.name.clone()),
        email_verified: false,
    };

    login_social_user(&state, info).await
}

fn map_oauth_error(e: OAuthError) -> AuthError {
    match e {
        OAuthError::NotConfigured(_) => AuthError::Internal(e.to_string()),
        other => AuthError::BadRequest(other.to_string()),
    }
}

/// Authorization-code callback. The code is claimed before the provider is
/// contacted: codes are single-use upstream, and a duplicate exchange would
/// only invalidate the legitimate in-flight one.
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OAuthCodeRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    if req.code.trim().is_empty() {
        return Err(AuthError::BadRequest(
            "Authorization code is required".to_string(),
        ));
    }

    if !state.code_tracker.try_claim(&req.code) {
        tracing::info!("duplicate google auth request for in-flight code");
        return Err(AuthError::DuplicateRequest);
    }

    let info = state
        .google_oauth
        .exchange_code(&req.code)
        .await
        .map_err(map_oauth_error)?;

    login_social_user(&state, info).await
}

pub async fn linkedin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OAuthCodeRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    if req.code.trim().is_empty() {
        return Err(AuthError::BadRequest(
            "Authorization code is required".to_string(),
        ));
    }

    if !state.code_tracker.try_claim(&req.code) {
        tracing::info!("duplicate linkedin auth request for in-flight code");
        return Err(AuthError::DuplicateRequest);
    }

    let info = state
        .linkedin_oauth
        .exchange_code(&req.code)
        .await
        .map_err(map_oauth_error)?;

    login_social_user(&state, info).await
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

/// Always answers with the same generic message so the endpoint cannot be
/// used to probe which addresses are registered.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AuthError> {
    let crud = UserCrud::new(state.db.clone());

    match crud.find_by_email(&req.email).await? {
        Some(user) if user.has_password() && user.is_active => {
            let token = Uuid::new_v4().to_string();
            let expires = Utc::now() + Duration::hours(1);

            // Send first; the token is only recorded once the mail left.
            state
                .email
                .send_password_reset_email(&user.email, &user.name, &token)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "password reset email failed");
                    AuthError::EmailDelivery("password reset email".to_string())
                })?;

            crud.set_password_reset(&user.id, &token, expires).await?;
            tracing::info!(user_id = %user.id, "password reset email sent");
        }
        Some(user) => {
            tracing::info!(user_id = %user.id, "password reset skipped for social-only or disabled account");
        }
        None => {
            tracing::info!("password reset requested for unknown email");
        }
    }

    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE,
    }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AuthError> {
    if !hashing::is_strong_password(&req.new_password) {
        return Err(AuthError::BadRequest(PASSWORD_POLICY.to_string()));
    }

    let crud = UserCrud::new(state.db.clone());
    let user = crud
        .find_by_reset_token(&req.token)
        .await?
        .ok_or(AuthError::InvalidOneTimeToken)?;

    let new_hash = hashing::hash_password(&req.new_password)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    if !crud.consume_password_reset(&req.token, &new_hash).await? {
        // A concurrent request got there first, or the window just closed.
        return Err(AuthError::InvalidOneTimeToken);
    }

    // Best effort only; the reset itself is already committed.
    let email = state.email.clone();
    tokio::spawn(async move {
        if let Err(e) = email
            .send_password_reset_notification(&user.email, &user.name)
            .await
        {
            tracing::warn!(error = %e, "password reset notification failed");
        }
    });

    Ok(Json(ResetPasswordResponse {
        message: "Your password has been reset successfully",
        success: true,
    }))
}

// =============================================================================
// EMAIL VERIFICATION
// =============================================================================

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<(StatusCode, Json<VerifyEmailResponse>), AuthError> {
    let crud = UserCrud::new(state.db.clone());

    let response = match crud.consume_verification_token(&req.token).await? {
        VerificationOutcome::Verified(user) => {
            // Failure here is logged, never rolled back: verification stands.
            let email = state.email.clone();
            tokio::spawn(async move {
                if let Err(e) = email
                    .send_verification_success_email(&user.email, &user.name)
                    .await
                {
                    tracing::warn!(error = %e, "verification success email failed");
                }
            });

            (
                StatusCode::OK,
                Json(VerifyEmailResponse {
                    success: true,
                    status: "verified",
                    message: "Email verified successfully",
                }),
            )
        }
        VerificationOutcome::AlreadyVerified => (
            StatusCode::OK,
            Json(VerifyEmailResponse {
                success: true,
                status: "already_verified",
                message: "Email already verified",
            }),
        ),
        VerificationOutcome::Expired => (
            StatusCode::BAD_REQUEST,
            Json(VerifyEmailResponse {
                success: false,
                status: "expired",
                message: "Invalid or expired verification token",
            }),
        ),
    };

    Ok(response)
}

pub async fn verification_status(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<VerificationStatusResponse>), AuthError> {
    let crud = UserCrud::new(state.db.clone());

    if crud.find_receipt(&token).await?.is_some() {
        return Ok((
            StatusCode::OK,
            Json(VerificationStatusResponse {
                status: "already_verified",
                message: "Email is already verified",
            }),
        ));
    }

    let response = match crud.find_by_verification_token(&token).await? {
        None => (
            StatusCode::NOT_FOUND,
            Json(VerificationStatusResponse {
                status: "invalid",
                message: "Invalid verification token",
            }),
        ),
        Some(user) if user.is_verified => (
            StatusCode::OK,
            Json(VerificationStatusResponse {
                status: "already_verified",
                message: "Email is already verified",
            }),
        ),
        Some(_) => (
            StatusCode::OK,
            Json(VerificationStatusResponse {
                status: "pending",
                message: "Token valid, verification pending",
            }),
        ),
    };

    Ok(response)
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ResendVerificationResponse>, AuthError> {
    if auth.user.is_verified {
        return Ok(Json(ResendVerificationResponse {
            success: true,
            message: "Email is already verified",
        }));
    }

    let token = Uuid::new_v4().to_string();

    // On failure the previously stored token stays valid.
    state
        .email
        .send_verification_email(&auth.user.email, &auth.user.name, &token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "verification email resend failed");
            AuthError::EmailDelivery("verification email".to_string())
        })?;

    UserCrud::new(state.db.clone())
        .set_verification_token(&auth.user.id, &token)
        .await?;

    Ok(Json(ResendVerificationResponse {
        success: true,
        message: "Verification email sent successfully",
    }))
}

// =============================================================================
// LOGOUT / REFRESH / ME
// =============================================================================

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AuthError> {
    state.revocation.revoke(&auth.token).await?;

    if let Some(refresh_token) = req.refresh_token.as_deref() {
        if !refresh_token.is_empty() {
            state.revocation.revoke(refresh_token).await?;
        }
    }

    Ok(Json(LogoutResponse {
        message: "Successfully logged out",
        status: "success",
    }))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    if req.refresh_token.is_empty() {
        return Err(AuthError::BadRequest(
            "Refresh token is required".to_string(),
        ));
    }

    if state.revocation.is_revoked(&req.refresh_token).await? {
        return Err(AuthError::TokenInvalidated);
    }

    let data = state
        .jwt_service
        .verify_refresh_token(&req.refresh_token)
        .map_err(classify_jwt_error)?;

    if data.claims.sub.is_empty() {
        return Err(AuthError::InvalidClaims);
    }

    let user = UserCrud::new(state.db.clone())
        .find_by_id(&data.claims.sub)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }

    Ok(Json(token_pair_response(&state, &user)?))
}

pub async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json((&auth.user).into())
}
