use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::config::Config;
use crate::services::payments::{constant_time_eq, PaymentError};
use crate::services::retry::RetryConfig;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.razorpay.com/v1";

fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 hex over a webhook body — what `X-Razorpay-Signature` carries.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    hmac_hex(secret, payload)
}

/// Verify the `X-Razorpay-Signature` header: HMAC-SHA256 hex over the raw
/// request body, keyed with the webhook secret.
pub fn verify_webhook_signature(
    secret: &str,
    signature: &str,
    payload: &str,
) -> Result<(), PaymentError> {
    let expected = hmac_hex(secret, payload);
    if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Verify the signature Razorpay attaches to a captured payment:
/// HMAC-SHA256 over `"{order_id}|{payment_id}"`, keyed with the key secret.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    let expected = hmac_hex(key_secret, &format!("{}|{}", order_id, payment_id));
    if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Clone)]
pub struct RazorpayClient {
    key_id: String,
    key_secret: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl RazorpayClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            http,
            retry: RetryConfig::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }

    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    pub async fn create_order(
        &self,
        amount: f64,
        currency: &str,
        user_id: &str,
        plan_id: &str,
    ) -> Result<RazorpayOrder, PaymentError> {
        if !self.is_configured() {
            return Err(PaymentError::NotConfigured("Razorpay"));
        }

        let amount_minor = (amount * 100.0).round() as i64;
        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "payment_capture": 1,
            "notes": {
                "user_id": user_id,
                "plan_id": plan_id,
            }
        });

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(format!("{}/orders", API_BASE))
                .basic_auth(&self.key_id, Some(&self.key_secret))
                .json(&body)
                .timeout(self.retry.timeout())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => break resp,
                Ok(resp) => {
                    return Err(PaymentError::Provider(format!("status {}", resp.status())))
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    tracing::warn!(attempt, error = %e, "razorpay request failed, retrying");
                    tokio::time::sleep(self.retry.calculate_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(PaymentError::Provider(e.to_string())),
            }
        };

        response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))
    }
}
