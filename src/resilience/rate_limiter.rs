//! # Rate Limiter
//!
//! Per-(platform, operation) request budgets over a fixed window that restarts
//! on the first call after it expires.
//!
//! Window state lives in a `DashMap` keyed by `"{platform}:{operation}"`, so
//! the check-and-increment for one key happens under that key's shard lock
//! and independent keys do not contend. State is process-local; several
//! worker processes each enforce their own copy of the budget.

use super::clock::{to_chrono, Clock};
use crate::constants::rate_limits;
use crate::models::Platform;
use crate::orchestration::errors::PublishingError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request budget for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBudget {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimitBudget {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_seconds: window.as_secs(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Built-in budget for `platform`
    pub fn default_for(platform: Platform) -> Self {
        let (max_requests, window_seconds) = match platform {
            Platform::YouTube => rate_limits::YOUTUBE,
            Platform::Facebook => rate_limits::FACEBOOK,
            Platform::Instagram => rate_limits::INSTAGRAM,
            Platform::TikTok => rate_limits::TIKTOK,
        };
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Built-in budgets for every platform
    pub fn defaults() -> HashMap<Platform, RateLimitBudget> {
        Platform::ALL
            .into_iter()
            .map(|platform| (platform, Self::default_for(platform)))
            .collect()
    }
}

/// Counter for one (platform, operation) key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
    pub max_requests: u32,
    pub window_duration: Duration,
}

impl RateLimitWindow {
    fn new(now: DateTime<Utc>, budget: RateLimitBudget) -> Self {
        Self {
            window_start: now,
            count: 0,
            max_requests: budget.max_requests,
            window_duration: budget.window(),
        }
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window_duration.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.window_start).num_milliseconds() >= self.window_millis()
    }

    fn reset_time(&self) -> DateTime<Utc> {
        self.window_start + to_chrono(self.window_duration)
    }

    /// Whole seconds until the window resets, never less than one
    fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let remaining_ms = (self.reset_time() - now).num_milliseconds().max(0);
        let secs = (remaining_ms + 999) / 1000;
        u64::try_from(secs).unwrap_or(0).max(1)
    }
}

/// Snapshot of one key's budget consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitUsage {
    pub current: u32,
    pub max: u32,
    pub window_reset: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitWindow>,
    budgets: HashMap<Platform, RateLimitBudget>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter with the built-in platform budgets
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_budgets(HashMap::new(), clock)
    }

    /// Create a limiter where `overrides` replace the built-in budgets
    pub fn with_budgets(
        overrides: HashMap<Platform, RateLimitBudget>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut budgets = RateLimitBudget::defaults();
        budgets.extend(overrides);

        for (platform, budget) in &budgets {
            debug!(
                platform = %platform,
                max_requests = budget.max_requests,
                window_seconds = budget.window_seconds,
                "⏱️ Rate limit budget configured"
            );
        }

        Self {
            windows: DashMap::new(),
            budgets,
            clock,
        }
    }

    fn key(platform: Platform, operation: &str) -> String {
        format!("{platform}:{operation}")
    }

    pub fn budget(&self, platform: Platform) -> RateLimitBudget {
        self.budgets
            .get(&platform)
            .copied()
            .unwrap_or_else(|| RateLimitBudget::default_for(platform))
    }

    /// Count one request against the budget, or deny it.
    ///
    /// A denial leaves the window untouched and reports the seconds until it
    /// resets as `retry_after`.
    pub fn check_and_consume(
        &self,
        platform: Platform,
        operation: &str,
    ) -> Result<(), PublishingError> {
        let now = self.clock.now();
        let key = Self::key(platform, operation);
        let budget = self.budget(platform);

        let mut entry = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| RateLimitWindow::new(now, budget));
        let window = entry.value_mut();

        if window.is_expired(now) {
            window.window_start = now;
            window.count = 1;
            return Ok(());
        }

        if window.count >= window.max_requests {
            let retry_after = window.retry_after_secs(now);
            warn!(
                platform = %platform,
                operation = %operation,
                count = window.count,
                max_requests = window.max_requests,
                retry_after = retry_after,
                "⏰ Rate limit hit"
            );
            return Err(PublishingError::rate_limit(
                platform,
                format!(
                    "Rate limit exceeded for {key}: {}/{} requests in window, \
                     retry after {retry_after}s",
                    window.count, window.max_requests
                ),
                Some(retry_after),
            ));
        }

        window.count += 1;
        Ok(())
    }

    /// Like [`check_and_consume`](Self::check_and_consume), but on denial
    /// sleeps for `retry_after` and re-checks exactly once.
    pub async fn wait_and_consume(
        &self,
        platform: Platform,
        operation: &str,
    ) -> Result<(), PublishingError> {
        let err = match self.check_and_consume(platform, operation) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let wait = Duration::from_secs(err.retry_after().unwrap_or(1));
        info!(
            platform = %platform,
            operation = %operation,
            wait_seconds = wait.as_secs(),
            "⏰ Waiting for rate limit window"
        );
        self.clock.sleep(wait).await;

        self.check_and_consume(platform, operation)
    }

    /// Current consumption for a key; an unused key reports zero
    pub fn usage(&self, platform: Platform, operation: &str) -> RateLimitUsage {
        let now = self.clock.now();
        let budget = self.budget(platform);

        match self.windows.get(&Self::key(platform, operation)) {
            Some(window) if !window.is_expired(now) => RateLimitUsage {
                current: window.count,
                max: window.max_requests,
                window_reset: window.reset_time(),
            },
            _ => RateLimitUsage {
                current: 0,
                max: budget.max_requests,
                window_reset: now + to_chrono(budget.window()),
            },
        }
    }

    pub fn reset(&self, platform: Platform, operation: &str) {
        self.windows.remove(&Self::key(platform, operation));
    }

    pub fn reset_all(&self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn limiter_with(
        platform: Platform,
        max_requests: u32,
        window: Duration,
    ) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let budgets = HashMap::from([(platform, RateLimitBudget::new(max_requests, window))]);
        (RateLimiter::with_budgets(budgets, clock.clone()), clock)
    }

    #[test]
    fn test_default_budgets() {
        let limiter = RateLimiter::new(Arc::new(ManualClock::default()));
        let hour = Duration::from_secs(3_600);
        assert_eq!(
            limiter.budget(Platform::YouTube),
            RateLimitBudget::new(10_000, Duration::from_secs(86_400))
        );
        assert_eq!(limiter.budget(Platform::Facebook), RateLimitBudget::new(200, hour));
        assert_eq!(limiter.budget(Platform::Instagram), RateLimitBudget::new(200, hour));
        assert_eq!(limiter.budget(Platform::TikTok), RateLimitBudget::new(100, hour));
    }

    #[test]
    fn test_budget_exhaustion_and_reset() {
        let (limiter, clock) = limiter_with(Platform::TikTok, 3, Duration::from_secs(60));

        for _ in 0..3 {
            limiter.check_and_consume(Platform::TikTok, "upload").unwrap();
        }

        let err = limiter.check_and_consume(Platform::TikTok, "upload").unwrap_err();
        assert!(err.is_rate_limit());
        assert!(err.retry_after().unwrap() > 0);

        clock.advance(Duration::from_secs(60));
        limiter.check_and_consume(Platform::TikTok, "upload").unwrap();
        assert_eq!(limiter.usage(Platform::TikTok, "upload").current, 1);
    }

    #[test]
    fn test_retry_after_rounds_up_remaining_window() {
        let (limiter, clock) = limiter_with(Platform::Facebook, 1, Duration::from_secs(10));
        limiter.check_and_consume(Platform::Facebook, "default").unwrap();

        clock.advance(Duration::from_millis(2_500));
        let err = limiter.check_and_consume(Platform::Facebook, "default").unwrap_err();
        assert_eq!(err.retry_after(), Some(8));
    }

    #[test]
    fn test_denial_does_not_consume() {
        let (limiter, _clock) = limiter_with(Platform::YouTube, 2, Duration::from_secs(60));
        limiter.check_and_consume(Platform::YouTube, "upload").unwrap();
        limiter.check_and_consume(Platform::YouTube, "upload").unwrap();

        for _ in 0..5 {
            assert!(limiter.check_and_consume(Platform::YouTube, "upload").is_err());
        }
        assert_eq!(limiter.usage(Platform::YouTube, "upload").current, 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter_with(Platform::Instagram, 1, Duration::from_secs(60));
        limiter.check_and_consume(Platform::Instagram, "upload").unwrap();
        limiter.check_and_consume(Platform::Instagram, "publish").unwrap();
        assert!(limiter.check_and_consume(Platform::Instagram, "upload").is_err());
    }

    #[tokio::test]
    async fn test_wait_and_consume_waits_once() {
        let (limiter, clock) = limiter_with(Platform::TikTok, 1, Duration::from_secs(30));
        limiter.check_and_consume(Platform::TikTok, "upload").unwrap();

        limiter.wait_and_consume(Platform::TikTok, "upload").await.unwrap();
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn test_usage_for_unused_key() {
        let limiter = RateLimiter::new(Arc::new(ManualClock::default()));
        let usage = limiter.usage(Platform::Facebook, "upload");
        assert_eq!(usage.current, 0);
        assert_eq!(usage.max, 200);
    }

    #[test]
    fn test_reset_clears_window() {
        let (limiter, _clock) = limiter_with(Platform::YouTube, 1, Duration::from_secs(60));
        limiter.check_and_consume(Platform::YouTube, "upload").unwrap();
        limiter.reset(Platform::YouTube, "upload");
        limiter.check_and_consume(Platform::YouTube, "upload").unwrap();

        limiter.reset_all();
        assert_eq!(limiter.usage(Platform::YouTube, "upload").current, 0);
    }
}
