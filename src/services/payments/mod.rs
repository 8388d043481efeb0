pub mod razorpay;
pub mod stripe;

pub use razorpay::RazorpayClient;
pub use stripe::StripeClient;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0} payments are not configured")]
    NotConfigured(&'static str),
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Signature timestamp outside tolerance")]
    TimestampTooOld,
    #[error("Provider request failed: {0}")]
    Provider(String),
    #[error("Unexpected provider response: {0}")]
    Response(String),
}

/// Constant-time comparison to prevent timing attacks on signatures
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
