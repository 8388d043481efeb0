pub mod dedup;
pub mod google;
pub mod linkedin;

pub use dedup::CodeTracker;
pub use google::GoogleOAuth;
pub use linkedin::LinkedInOAuth;

/// Normalized profile returned by every provider exchange.
#[derive(Debug, Clone)]
pub struct SocialUserInfo {
    pub provider: &'static str,
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0} login is not configured")]
    NotConfigured(&'static str),
    #[error("Failed to exchange code for tokens: {0}")]
    Exchange(String),
    #[error("Failed to get user information: {0}")]
    UserInfo(String),
    #[error("Email not found in user info")]
    MissingEmail,
}
