use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{config::AppConfig, store::ObjectStore};

/// Shared application state cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    store: ObjectStore,
    config: Arc<AppConfig>,
    http: reqwest::Client,
    unlock_limiter: Arc<Mutex<AttemptTracker>>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::from_env().context("failed to read configuration")?;
        let store = ObjectStore::new(&config.store);

        store
            .ensure_bucket()
            .await
            .context("failed to ensure object-store bucket")?;

        Ok(Self {
            store,
            config: Arc::new(config),
            http: reqwest::Client::new(),
            unlock_limiter: Arc::new(Mutex::new(AttemptTracker::default())),
        })
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Records a failed wall-unlock attempt for the client and reports
    /// whether the client is currently locked out.
    pub async fn unlock_throttled(&self, client_ip: &str) -> bool {
        let mut tracker = self.unlock_limiter.lock().await;
        tracker.is_throttled(client_ip, Utc::now().timestamp_millis())
    }

    pub async fn record_unlock_failure(&self, client_ip: &str) {
        let mut tracker = self.unlock_limiter.lock().await;
        tracker.record_failure(client_ip, Utc::now().timestamp_millis());
    }

    pub async fn clear_unlock_failures(&self, client_ip: &str) {
        let mut tracker = self.unlock_limiter.lock().await;
        tracker.clear(client_ip);
    }
}

const MAX_ATTEMPTS: u32 = 5;
const ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// In-memory per-IP failure counter for password-protected walls:
/// 5 failures lock the client out for 15 minutes. State is process-local
/// and resets on restart, which is acceptable for this endpoint.
#[derive(Default)]
struct AttemptTracker {
    attempts: HashMap<String, Attempt>,
}

struct Attempt {
    count: u32,
    last_attempt: i64,
}

impl AttemptTracker {
    fn is_throttled(&mut self, client_ip: &str, now: i64) -> bool {
        self.prune(now);
        match self.attempts.get(client_ip) {
            Some(attempt) => {
                attempt.count >= MAX_ATTEMPTS
                    && now - attempt.last_attempt < ATTEMPT_WINDOW.as_millis() as i64
            }
            None => false,
        }
    }

    fn record_failure(&mut self, client_ip: &str, now: i64) {
        let attempt = self.attempts.entry(client_ip.to_string()).or_insert(Attempt {
            count: 0,
            last_attempt: now,
        });
        attempt.count += 1;
        attempt.last_attempt = now;
    }

    fn clear(&mut self, client_ip: &str) {
        self.attempts.remove(client_ip);
    }

    fn prune(&mut self, now: i64) {
        let window = ATTEMPT_WINDOW.as_millis() as i64;
        self.attempts
            .retain(|_, attempt| now - attempt.last_attempt < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60 * 1000;

    #[test]
    fn throttles_after_five_failures() {
        let mut tracker = AttemptTracker::default();
        let now = 1_000_000;

        for _ in 0..4 {
            tracker.record_failure("1.2.3.4", now);
        }
        assert!(!tracker.is_throttled("1.2.3.4", now));

        tracker.record_failure("1.2.3.4", now);
        assert!(tracker.is_throttled("1.2.3.4", now));
        // Other clients are unaffected.
        assert!(!tracker.is_throttled("5.6.7.8", now));
    }

    #[test]
    fn throttle_expires_after_window() {
        let mut tracker = AttemptTracker::default();
        let now = 1_000_000;

        for _ in 0..5 {
            tracker.record_failure("1.2.3.4", now);
        }
        assert!(tracker.is_throttled("1.2.3.4", now + 14 * MINUTE));
        assert!(!tracker.is_throttled("1.2.3.4", now + 16 * MINUTE));
    }

    #[test]
    fn successful_unlock_clears_counter() {
        let mut tracker = AttemptTracker::default();
        let now = 1_000_000;

        for _ in 0..5 {
            tracker.record_failure("1.2.3.4", now);
        }
        tracker.clear("1.2.3.4");
        assert!(!tracker.is_throttled("1.2.3.4", now));
    }
}
