use axum_test::TestServer;
use platform_api::config::environment::Config;
use serde_json::json;
use sqlx::{MySql, Pool};

#[allow(dead_code)]
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test_secret";
#[allow(dead_code)]
pub const RAZORPAY_WEBHOOK_SECRET: &str = "razorpay_webhook_test_secret";

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub server: TestServer,
    pub db: Pool<MySql>,
}

#[allow(dead_code)]
impl TestContext {
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

        let db = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("Failed to run migrations");

        let config = test_config(database_url);
        let app = platform_api::create_app(db.clone(), config).await;
        let server = TestServer::new(app).expect("Failed to create test server");

        Self { server, db }
    }

    pub async fn cleanup(&self) {
        // Clean up test data after each test; plans/features seed data stays.
        sqlx::query("DELETE FROM verification_receipts")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM subscriptions")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM social_accounts")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM revoked_tokens")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM users")
            .execute(&self.db)
            .await
            .ok();
    }

    /// Register a user and log them in, returning
    /// (email, access_token, refresh_token).
    pub async fn create_and_login(&self) -> (String, String, String) {
        let email = test_email();

        self.server
            .post("/api/auth/signup")
            .json(&json!({
                "name": "Test User",
                "email": &email,
                "password": test_password()
            }))
            .await;

        let response = self
            .server
            .post("/api/auth/login")
            .form(&json!({
                "username": &email,
                "password": test_password()
            }))
            .await;

        let body: serde_json::Value = response.json();
        let access_token = body["access_token"].as_str().unwrap().to_string();
        let refresh_token = body["refresh_token"].as_str().unwrap().to_string();

        (email, access_token, refresh_token)
    }

    pub async fn user_id_for(&self, email: &str) -> String {
        sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .unwrap()
    }

    pub async fn verification_token_for(&self, email: &str) -> String {
        sqlx::query_scalar::<_, String>(
            "SELECT verification_token FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_one(&self.db)
        .await
        .unwrap()
    }

    pub async fn reset_token_for(&self, email: &str) -> String {
        sqlx::query_scalar::<_, String>(
            "SELECT password_reset_token FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_one(&self.db)
        .await
        .unwrap()
    }
}

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "test-secret-key-for-testing-only".to_string()),
        access_token_expire_minutes: 30,
        refresh_token_expire_days: 7,
        revoked_token_ttl_hours: 24,
        frontend_url: "http://localhost:5173".to_string(),
        smtp_host: String::new(), // no-op email mode
        smtp_port: 587,
        smtp_username: String::new(),
        smtp_password: String::new(),
        email_from: "Platform <no-reply@localhost>".to_string(),
        google_client_id: String::new(),
        google_client_secret: String::new(),
        google_redirect_uri: "http://localhost:5173/auth/callback".to_string(),
        linkedin_client_id: String::new(),
        linkedin_client_secret: String::new(),
        linkedin_redirect_uri: "http://localhost:5173/auth/linkedin/callback".to_string(),
        stripe_secret_key: String::new(),
        stripe_webhook_secret: STRIPE_WEBHOOK_SECRET.to_string(),
        razorpay_key_id: String::new(),
        razorpay_key_secret: String::new(),
        razorpay_webhook_secret: RAZORPAY_WEBHOOK_SECRET.to_string(),
    }
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4())
}

// Helper to generate test password
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "TestPassword123!"
}
