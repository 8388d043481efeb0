use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::modules::auth::schema::ErrorResponse;
use crate::services::payments::PaymentError;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("{0} payments are not configured")]
    NotConfigured(&'static str),

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConfigured(_) => StatusCode::NOT_IMPLEMENTED,
            Self::MissingSignature
            | Self::InvalidSignature
            | Self::InvalidPayload(_)
            | Self::PaymentVerification(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PaymentError> for WebhookError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotConfigured(provider) => Self::NotConfigured(provider),
            PaymentError::MissingSignature => Self::MissingSignature,
            PaymentError::InvalidSignature | PaymentError::TimestampTooOld => {
                Self::InvalidSignature
            }
            PaymentError::Provider(msg) | PaymentError::Response(msg) => {
                Self::PaymentVerification(msg)
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "webhook processing failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
