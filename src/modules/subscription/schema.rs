use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Plan, Subscription};
use crate::modules::auth::schema::SubscriptionInfo;

#[derive(Debug, Deserialize)]
pub struct PlanFilter {
    pub billing_period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percentage: i32,
    pub billing_period: String,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_price: Option<f64>,
}

impl PlanResponse {
    pub fn new(plan: Plan, features: Vec<String>) -> Self {
        let savings = (plan.original_price > plan.price)
            .then(|| ((plan.original_price - plan.price) * 100.0).round() / 100.0);
        let monthly_price = (plan.billing_period == "yearly")
            .then(|| ((plan.price / 12.0) * 100.0).round() / 100.0);

        Self {
            id: plan.id,
            title: plan.title,
            description: plan.description,
            price: plan.price,
            original_price: plan.original_price,
            discount_percentage: plan.discount_percentage,
            billing_period: plan.billing_period,
            features,
            savings,
            monthly_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
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

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            plan_id: s.plan_id,
            status: s.status,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renew: s.auto_renew,
            payment_id: s.payment_id,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub success: bool,
    pub subscription: Option<SubscriptionResponse>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub subscription: Option<SubscriptionInfo>,
    pub is_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
    pub payment_method: String,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub provider: &'static str,
    pub payment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
