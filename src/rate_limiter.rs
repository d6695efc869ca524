use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{GatewayError, Result};

/// Limit and window length applied to every key of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub limit: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            limit: 40,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Validate rule parameters
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(GatewayError::ValidationError(
                "Request rate must be greater than 0".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(GatewayError::ValidationError(
                "Rate window must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, limit: u32 },
    Denied { retry_after: Duration, limit: u32 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Snapshot of a key's window, reported without consuming a slot.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub key: String,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after_secs: u64,
    pub rule: RateLimitRule,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.started) >= window
    }
}

/// Fixed-window request counter keyed by route.
///
/// Each key owns one window. A check for a key locks only that key's map
/// shard, so unrelated keys never wait on each other.
#[derive(Clone)]
pub struct RateLimiter {
    rule: RateLimitRule,
    windows: Arc<DashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Consume one slot for `key` if the current window has room.
    pub fn check_and_consume(&self, key: &str) -> Decision {
        self.check_and_consume_at(key, Instant::now())
    }

    pub(crate) fn check_and_consume_at(&self, key: &str, now: Instant) -> Decision {
        let limit = self.rule.limit;

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut window = self
            .windows
            .entry(key.to_string())
            .or_insert(Window { started: now, count: 0 });

        if window.is_expired(now, self.rule.window) {
            window.started = now;
            window.count = 0;
        }

        if window.count >= limit {
            let elapsed = now.saturating_duration_since(window.started);
            let retry_after = self.rule.window.saturating_sub(elapsed);
            tracing::warn!(
                key = %key,
                limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Decision::Denied { retry_after, limit };
        }

        window.count += 1;
        let remaining = limit - window.count;
        tracing::debug!(key = %key, count = window.count, remaining, "Request admitted");

        Decision::Allowed { remaining, limit }
    }

    /// Current window state for `key`
    pub fn status(&self, key: &str) -> RateLimitStatus {
        self.status_at(key, Instant::now())
    }

    pub(crate) fn status_at(&self, key: &str, now: Instant) -> RateLimitStatus {
        let (remaining, reset_after) = match self.windows.get(key) {
            Some(window) if !window.is_expired(now, self.rule.window) => {
                let elapsed = now.saturating_duration_since(window.started);
                (
                    self.rule.limit.saturating_sub(window.count),
                    self.rule.window.saturating_sub(elapsed),
                )
            }
            _ => (self.rule.limit, Duration::ZERO),
        };

        RateLimitStatus {
            key: key.to_string(),
            limit: self.rule.limit,
            remaining,
            reset_after_secs: reset_after.as_secs_f64().ceil() as u64,
            rule: self.rule,
        }
    }

    /// Drop the window for a key. Returns whether one existed.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.windows.remove(key).is_some();
        if removed {
            tracing::info!(key = %key, "Rate limit window reset");
        }
        removed
    }

    /// Remove windows that have run their full duration
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    pub(crate) fn cleanup_expired_at(&self, now: Instant) -> usize {
        let initial_count = self.windows.len();
        let window = self.rule.window;
        self.windows.retain(|_, w| !w.is_expired(now, window));
        initial_count.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimitRule::new(limit, Duration::from_secs(60)))
    }

    #[test]
    fn test_admits_up_to_limit_then_denies() {
        let limiter = limiter(3);
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check_and_consume_at("movie:detail", now),
                Decision::Allowed { remaining: expected_remaining, limit: 3 }
            );
        }

        match limiter.check_and_consume_at("movie:detail", now + Duration::from_secs(10)) {
            Decision::Denied { retry_after, limit } => {
                assert_eq!(limit, 3);
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn test_denial_does_not_consume() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.check_and_consume_at("k", now).is_allowed());
        for _ in 0..5 {
            assert!(!limiter.check_and_consume_at("k", now).is_allowed());
        }
        assert_eq!(limiter.status_at("k", now).remaining, 0);
    }

    #[test]
    fn test_window_expiry_starts_fresh_window() {
        let limiter = limiter(2);
        let now = Instant::now();

        assert!(limiter.check_and_consume_at("k", now).is_allowed());
        assert!(limiter.check_and_consume_at("k", now).is_allowed());
        assert!(!limiter.check_and_consume_at("k", now + Duration::from_secs(59)).is_allowed());

        let later = now + Duration::from_secs(70);
        assert_eq!(
            limiter.check_and_consume_at("k", later),
            Decision::Allowed { remaining: 1, limit: 2 }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.check_and_consume_at("movie:list", now).is_allowed());
        assert!(limiter.check_and_consume_at("movie:detail", now).is_allowed());
        assert!(!limiter.check_and_consume_at("movie:list", now).is_allowed());
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_status_and_reset() {
        let limiter = limiter(5);
        let now = Instant::now();

        let status = limiter.status_at("k", now);
        assert_eq!(status.remaining, 5);
        assert_eq!(status.reset_after_secs, 0);

        limiter.check_and_consume_at("k", now);
        limiter.check_and_consume_at("k", now);
        let status = limiter.status_at("k", now + Duration::from_millis(500));
        assert_eq!(status.remaining, 3);
        assert_eq!(status.reset_after_secs, 60);

        assert!(limiter.reset("k"));
        assert!(!limiter.reset("k"));
        assert_eq!(limiter.status_at("k", now).remaining, 5);
    }

    #[test]
    fn test_cleanup_expired_windows() {
        let limiter = limiter(5);
        let now = Instant::now();

        limiter.check_and_consume_at("old", now);
        limiter.check_and_consume_at("fresh", now + Duration::from_secs(30));

        let removed = limiter.cleanup_expired_at(now + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let limiter = limiter(25);
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        if limiter.check_and_consume("shared").is_allowed() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn test_rule_validation() {
        assert!(RateLimitRule::new(1, Duration::from_secs(60)).validate().is_ok());
        assert!(RateLimitRule::new(0, Duration::from_secs(60)).validate().is_err());
        assert!(RateLimitRule::new(10, Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_rule_serializes_window_as_human_duration() {
        let json = serde_json::to_value(RateLimitRule::default()).unwrap();
        assert_eq!(json["limit"], 40);
        assert_eq!(json["window"], "1m");
    }
}
