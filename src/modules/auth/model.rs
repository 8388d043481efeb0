use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub verification_sent_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub subscription_auto_renew: bool,
    pub subscription_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether any credential can authenticate this account.
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Receipt of a consumed verification token, kept so a replayed request can
/// be answered "already verified" after the token was cleared from the user.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationReceipt {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
