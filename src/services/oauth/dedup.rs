use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Claims an external authorization code for exactly one in-flight exchange.
///
/// Authorization codes are single-use upstream; a duplicate exchange attempt
/// would fail at the provider and can invalidate the legitimate in-flight
/// one. Tracking is process-local and best-effort: it collapses accidental
/// client retries, nothing more.
pub struct CodeTracker {
    ttl: Duration,
    codes: Mutex<HashMap<String, Instant>>,
}

impl CodeTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Returns false if the code is already being processed.
    pub fn try_claim(&self, code: &str) -> bool {
        let mut codes = self.codes.lock().unwrap();
        if codes.contains_key(code) {
            return false;
        }
        codes.insert(code.to_string(), Instant::now());
        true
    }

    /// Drop entries older than the TTL. Runs on a periodic task.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut codes = self.codes.lock().unwrap();
        codes.retain(|_, seen| now.duration_since(*seen) < self.ttl);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}
