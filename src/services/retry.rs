use rand::Rng;
use std::time::Duration;

/// Retry policy for outbound SMTP and provider HTTP calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub jitter_factor: f64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            max_attempts: 3,
            jitter_factor: 0.1, // ±10%
            timeout_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Delay before retrying `attempt` (0-based), exponential with jitter:
    /// delay = min(base × 2^attempt × (1 ± jitter), max)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64;
        let exponential = base * 2_f64.powi(attempt as i32);

        let mut rng = rand::rng();
        let jitter = 1.0 + (rng.random::<f64>() * 2.0 - 1.0) * self.jitter_factor;
        let with_jitter = exponential * jitter;

        let capped = with_jitter.min(self.max_delay_ms as f64);

        Duration::from_millis(capped as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Timeout applied to each individual request
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
