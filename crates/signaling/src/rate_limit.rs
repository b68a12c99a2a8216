//! Fixed-window rate limiter keyed by ad platform, backed by DashMap.

use attribution_core::config::RateLimitConfig;
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::signals::AdPlatform;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Per-platform window counter.
#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Result returned by `check`.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub struct PlatformRateLimiter {
    entries: DashMap<AdPlatform, RateLimitEntry>,
    configs: DashMap<AdPlatform, RateLimitConfig>,
}

impl PlatformRateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            configs: DashMap::new(),
        }
    }

    pub fn set_limit(&self, platform: AdPlatform, config: RateLimitConfig) {
        self.configs.insert(platform, config);
    }

    /// Check (and consume) one call for `platform`. Platforms without a
    /// configured limit are always allowed.
    pub fn check(&self, platform: AdPlatform) -> RateLimitResult {
        let now = Utc::now();
        let Some(config) = self.configs.get(&platform).map(|c| c.clone()) else {
            return RateLimitResult {
                allowed: true,
                remaining: u32::MAX,
                reset_at: now,
            };
        };

        let window = Duration::seconds(i64::try_from(config.window_secs).unwrap_or(i64::MAX));
        let mut entry = self.entries.entry(platform).or_insert_with(|| RateLimitEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired.
        if now.signed_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        let reset_at = entry.window_start + window;
        if entry.count < config.max_calls {
            entry.count += 1;
            RateLimitResult {
                allowed: true,
                remaining: config.max_calls - entry.count,
                reset_at,
            }
        } else {
            RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at,
            }
        }
    }

    /// Like [`check`](Self::check) but as a typed error.
    pub fn acquire(&self, platform: AdPlatform) -> AttributionResult<()> {
        let result = self.check(platform);
        if result.allowed {
            return Ok(());
        }
        let wait = result.reset_at.signed_duration_since(Utc::now()).num_seconds().max(0);
        Err(AttributionError::RateLimit {
            service: platform.display_name().to_string(),
            retry_after_secs: Some(wait as u64),
        })
    }
}

impl Default for PlatformRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_basic() {
        let limiter = PlatformRateLimiter::new();
        limiter.set_limit(AdPlatform::GoogleAds, RateLimitConfig { max_calls: 3, window_secs: 60 });

        for i in 0..3 {
            let result = limiter.check(AdPlatform::GoogleAds);
            assert!(result.allowed, "call {i} should be allowed");
            assert_eq!(result.remaining, 2 - i);
        }

        let result = limiter.check(AdPlatform::GoogleAds);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_platforms_are_independent() {
        let limiter = PlatformRateLimiter::new();
        limiter.set_limit(AdPlatform::GoogleAds, RateLimitConfig { max_calls: 1, window_secs: 60 });
        limiter.set_limit(AdPlatform::FacebookAds, RateLimitConfig { max_calls: 1, window_secs: 60 });

        assert!(limiter.acquire(AdPlatform::GoogleAds).is_ok());
        assert!(limiter.acquire(AdPlatform::FacebookAds).is_ok());
        let err = limiter.acquire(AdPlatform::GoogleAds).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, AttributionError::RateLimit { retry_after_secs: Some(s), .. } if s <= 60));
    }

    #[test]
    fn test_unconfigured_platform_unlimited() {
        let limiter = PlatformRateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check(AdPlatform::LinkedinAds).allowed);
        }
    }

    #[test]
    fn test_window_resets() {
        let limiter = PlatformRateLimiter::new();
        limiter.set_limit(AdPlatform::LinkedinAds, RateLimitConfig { max_calls: 1, window_secs: 0 });
        assert!(limiter.check(AdPlatform::LinkedinAds).allowed);
        // Zero-length window expires immediately.
        assert!(limiter.check(AdPlatform::LinkedinAds).allowed);
    }
}
