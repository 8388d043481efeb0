use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::schema::ErrorResponse;
use crate::services::revocation::RevocationError;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy shared by the request handlers. Expected failures are
/// variants here; only genuinely unexpected conditions land in `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Token has been invalidated")]
    TokenInvalidated,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token format")]
    TokenMalformed,

    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Please login with your social account")]
    SocialOnlyAccount,

    #[error("User not found")]
    UserNotFound,

    #[error("Plan not found")]
    PlanNotFound,

    #[error("Please verify your email address to access this feature")]
    EmailNotVerified,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Invalid or expired token")]
    InvalidOneTimeToken,

    #[error("Request already being processed")]
    DuplicateRequest,

    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Failed to send email")]
    EmailDelivery(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken
            | Self::TokenInvalidated
            | Self::TokenExpired
            | Self::TokenMalformed
            | Self::InvalidClaims
            | Self::InvalidCredentials
            | Self::AccountDisabled
            | Self::SocialOnlyAccount => StatusCode::UNAUTHORIZED,
            Self::UserNotFound | Self::PlanNotFound => StatusCode::NOT_FOUND,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::EmailAlreadyExists | Self::UsernameAlreadyExists | Self::DuplicateRequest => {
                StatusCode::CONFLICT
            }
            Self::InvalidOneTimeToken | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::EmailDelivery(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the client. Server-side failures are logged
    /// with full detail but answered generically.
    fn public_message(&self) -> String {
        match self {
            Self::EmailDelivery(what) => format!("Failed to send {}", what),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RevocationError> for AuthError {
    fn from(e: RevocationError) -> Self {
        match e {
            RevocationError::Database(e) => AuthError::Database(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}
