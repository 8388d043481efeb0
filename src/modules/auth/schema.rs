use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::model::User;

// =============================================================================
// SIGNUP
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be 2-50 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserResponse,
}

// =============================================================================
// LOGIN (OAuth2-style form credentials)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

// =============================================================================
// SOCIAL LOGIN
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SocialLoginRequest {
    pub provider: String,
    pub provider_user_id: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCodeRequest {
    pub code: String,
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub message: &'static str,
    pub success: bool,
}

// =============================================================================
// EMAIL VERIFICATION
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationStatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResendVerificationResponse {
    pub success: bool,
    pub message: &'static str,
}

// =============================================================================
// LOGOUT / REFRESH
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// =============================================================================
// USER RESPONSE (sanitized; never carries the password hash)
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub plan_id: String,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub subscription: Option<SubscriptionInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let subscription = user.subscription_plan.as_ref().map(|plan_id| SubscriptionInfo {
            plan_id: plan_id.clone(),
            status: user
                .subscription_status
                .clone()
                .unwrap_or_else(|| "pending".to_string()),
            start_date: user.subscription_start,
            end_date: user.subscription_end,
            auto_renew: user.subscription_auto_renew,
            payment_id: user.subscription_payment_id.clone(),
        });

        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            is_verified: user.is_verified,
            subscription,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}
