use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

use crate::config::Config;
use crate::services::payments::{constant_time_eq, PaymentError};
use crate::services::retry::RetryConfig;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Seconds a webhook timestamp may lag before it is rejected as replayed.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// HMAC-SHA256 over `"{timestamp}.{payload}"`, hex encoded — the scheme the
/// `Stripe-Signature` header carries in its `v1` entries.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> String {
    let message = format!("{}.{}", timestamp, payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());

    hex::encode(mac.finalize().into_bytes())
}

/// Verify a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the
/// raw request body before trusting the payload.
pub fn verify_webhook_signature(
    secret: &str,
    header: &str,
    payload: &str,
    tolerance_secs: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    if candidates.is_empty() {
        return Err(PaymentError::InvalidSignature);
    }

    let now = chrono::Utc::now().timestamp();
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::TimestampTooOld);
    }

    let expected = sign_payload(secret, timestamp, payload);
    if candidates
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone)]
pub struct StripeClient {
    secret_key: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl StripeClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            secret_key: config.stripe_secret_key.clone(),
            http,
            retry: RetryConfig::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    pub async fn create_payment_intent(
        &self,
        amount: f64,
        currency: &str,
        user_id: &str,
        plan_id: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        if !self.is_configured() {
            return Err(PaymentError::NotConfigured("Stripe"));
        }

        let amount_minor = (amount * 100.0).round() as i64;
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_lowercase()),
            ("payment_method_types[]", "card".to_string()),
            ("metadata[user_id]", user_id.to_string()),
            ("metadata[plan_id]", plan_id.to_string()),
        ];

        let response = self
            .request(|| {
                self.http
                    .post(format!("{}/payment_intents", API_BASE))
                    .basic_auth(&self.secret_key, None::<&str>)
                    .form(&params)
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        if !self.is_configured() {
            return Err(PaymentError::NotConfigured("Stripe"));
        }

        let response = self
            .request(|| {
                self.http
                    .get(format!("{}/payment_intents/{}", API_BASE, id))
                    .basic_auth(&self.secret_key, None::<&str>)
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))
    }

    async fn request<F>(&self, build: F) -> Result<reqwest::Response, PaymentError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().timeout(self.retry.timeout()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    return Err(PaymentError::Provider(format!(
                        "status {}",
                        resp.status()
                    )))
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    tracing::warn!(attempt, error = %e, "stripe request failed, retrying");
                    tokio::time::sleep(self.retry.calculate_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(PaymentError::Provider(e.to_string())),
            }
        }
    }
}
