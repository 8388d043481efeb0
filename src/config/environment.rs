use std::env;

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub revoked_token_ttl_hours: i64,
    pub frontend_url: String,

    // SMTP (empty host disables outbound email)
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,

    // OAuth providers
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub linkedin_client_id: String,
    pub linkedin_client_secret: String,
    pub linkedin_redirect_uri: String,

    // Payment providers
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set".to_string())?;

        let access_token_expire_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let refresh_token_expire_days = env::var("REFRESH_TOKEN_EXPIRE_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        let revoked_token_ttl_hours = env::var("REVOKED_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let smtp_port = env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(587);

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_expire_minutes,
            refresh_token_expire_days,
            revoked_token_ttl_hours,
            frontend_url,
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Platform <no-reply@localhost>".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:5173/auth/callback".to_string()),
            linkedin_client_id: env::var("LINKEDIN_CLIENT_ID").unwrap_or_default(),
            linkedin_client_secret: env::var("LINKEDIN_CLIENT_SECRET").unwrap_or_default(),
            linkedin_redirect_uri: env::var("LINKEDIN_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:5173/auth/linkedin/callback".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            razorpay_webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
        })
    }
}
