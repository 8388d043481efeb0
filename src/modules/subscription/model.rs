use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percentage: i32,
    pub billing_period: String,
    pub is_active: bool,
}

impl Plan {
    /// Days a paid period runs before renewal or expiry.
    pub fn duration_days(&self) -> i64 {
        match self.billing_period.as_str() {
            "yearly" => 365,
            _ => 30,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Feature {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    Pending,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Pending => "pending",
        }
    }
}
