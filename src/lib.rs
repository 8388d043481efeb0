pub mod config;
pub mod modules;
pub mod services;

use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::{Config, DbPool};
use modules::auth::auth_routes;
use modules::auth::crud::UserCrud;
use modules::profile::profile_routes;
use modules::subscription::{feature_routes, plan_routes, subscription_routes};
use modules::webhook::webhook_routes;
use services::email::EmailService;
use services::jwt::JwtService;
use services::oauth::{CodeTracker, GoogleOAuth, LinkedInOAuth};
use services::payments::{RazorpayClient, StripeClient};
use services::rate_limit::{create_rate_limiter, RateLimitLayer, SlidingWindowLimiter};
use services::revocation::{MySqlRevocationStore, RevocationStore};
use services::security::security_headers;

/// Sliding window on credential endpoints: 5 attempts per client per minute.
const LOGIN_WINDOW: Duration = Duration::from_secs(60);
const LOGIN_MAX_ATTEMPTS: usize = 5;

/// OAuth authorization codes are tracked for 5 minutes.
const CODE_TRACKER_TTL: Duration = Duration::from_secs(300);

pub struct AppState {
    pub db: DbPool,
    pub http_client: reqwest::Client,
    pub jwt_service: JwtService,
    pub email: EmailService,
    pub revocation: Arc<dyn RevocationStore>,
    pub code_tracker: Arc<CodeTracker>,
    pub google_oauth: GoogleOAuth,
    pub linkedin_oauth: LinkedInOAuth,
    pub stripe: StripeClient,
    pub razorpay: RazorpayClient,
    pub config: Config,
}

pub async fn create_app(db: DbPool, config: Config) -> Router {
    let http_client = reqwest::Client::new();

    let jwt_service = JwtService::with_durations(
        config.jwt_secret.clone(),
        chrono::Duration::minutes(config.access_token_expire_minutes),
        chrono::Duration::days(config.refresh_token_expire_days),
    );

    let email = EmailService::new(&config).expect("EMAIL_FROM must be a valid mailbox");

    let revocation: Arc<dyn RevocationStore> = Arc::new(MySqlRevocationStore::new(
        db.clone(),
        config.revoked_token_ttl_hours,
    ));

    let code_tracker = Arc::new(CodeTracker::new(CODE_TRACKER_TTL));
    let login_limiter = Arc::new(SlidingWindowLimiter::new(LOGIN_WINDOW, LOGIN_MAX_ATTEMPTS));

    spawn_sweepers(
        db.clone(),
        revocation.clone(),
        code_tracker.clone(),
        login_limiter.clone(),
        config.revoked_token_ttl_hours,
    );

    let state = Arc::new(AppState {
        db,
        http_client: http_client.clone(),
        jwt_service,
        email,
        revocation,
        code_tracker,
        google_oauth: GoogleOAuth::new(&config, http_client.clone()),
        linkedin_oauth: LinkedInOAuth::new(&config, http_client.clone()),
        stripe: StripeClient::new(&config, http_client.clone()),
        razorpay: RazorpayClient::new(&config, http_client),
        config,
    });

    // Backstop burst of 100, then 1 per minute
    let rate_limiter = create_rate_limiter(100);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes(login_limiter))
        .nest("/api/profile", profile_routes())
        .nest("/api/subscription", subscription_routes())
        .nest("/api/plans", plan_routes())
        .nest("/api/features", feature_routes())
        .nest("/api/webhook", webhook_routes())
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 100)) // 100KB max body
        .layer(RateLimitLayer::new(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodic maintenance of process-local and TTL-bounded state. The mutex
/// sections inside are short and never held across an await.
fn spawn_sweepers(
    db: DbPool,
    revocation: Arc<dyn RevocationStore>,
    code_tracker: Arc<CodeTracker>,
    login_limiter: Arc<SlidingWindowLimiter>,
    receipt_ttl_hours: i64,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            code_tracker.sweep();
            login_limiter.sweep();
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            match revocation.purge_expired().await {
                Ok(purged) if purged > 0 => tracing::debug!(purged, "revocation entries purged"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "revocation purge failed"),
            }
            if let Err(e) = UserCrud::new(db.clone())
                .purge_expired_receipts(receipt_ttl_hours)
                .await
            {
                tracing::warn!(error = %e, "verification receipt purge failed");
            }
        }
    });
}

async fn root() -> &'static str {
    "Platform API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
