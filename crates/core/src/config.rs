use serde::Deserialize;

use crate::error::{AttributionError, AttributionResult};
use crate::signals::AdPlatform;
use crate::types::AttributionModelKind;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ATTRIBUTION__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub google_ads: GoogleAdsConfig,
    #[serde(default)]
    pub facebook_ads: FacebookAdsConfig,
    #[serde(default)]
    pub linkedin_ads: LinkedInAdsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Relative tolerance for the credits-sum-to-total check.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Deadline for each touchpoint read and aggregate write-back.
    #[serde(default = "default_crm_timeout_ms")]
    pub crm_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalingConfig {
    #[serde(default = "default_platform_timeout_ms")]
    pub platform_timeout_ms: u64,
    /// Deadline for the contact identity lookup that precedes a sync.
    #[serde(default = "default_crm_timeout_ms")]
    pub identity_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_platforms")]
    pub max_concurrent_platforms: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Log payloads instead of posting them.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Calls allowed per fixed window.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_calls: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleAdsConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub developer_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default = "default_google_rate_limit")]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookAdsConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub ad_account_id: String,
    #[serde(default = "default_facebook_api_version")]
    pub api_version: String,
    #[serde(default = "default_facebook_rate_limit")]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkedInAdsConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub ad_account_id: String,
    #[serde(default = "default_linkedin_rate_limit")]
    pub rate_limit: RateLimitConfig,
}

impl GoogleAdsConfig {
    pub fn enabled(&self) -> bool {
        !self.client_id.is_empty() && !self.developer_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl FacebookAdsConfig {
    pub fn enabled(&self) -> bool {
        !self.access_token.is_empty() && !self.ad_account_id.is_empty()
    }

    /// Pixel id is the ad account id without its `act_` prefix.
    pub fn pixel_id(&self) -> &str {
        self.ad_account_id.strip_prefix("act_").unwrap_or(&self.ad_account_id)
    }
}

impl LinkedInAdsConfig {
    pub fn enabled(&self) -> bool {
        !self.access_token.is_empty()
    }
}

// Default functions
fn default_model() -> String {
    AttributionModelKind::WShaped.as_str().to_string()
}
fn default_lookback_days() -> u32 {
    90
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_crm_timeout_ms() -> u64 {
    10_000
}
fn default_platform_timeout_ms() -> u64 {
    30_000
}
fn default_max_concurrent_platforms() -> usize {
    4
}
fn default_dry_run() -> bool {
    true
}
fn default_currency() -> String {
    "EUR".to_string()
}
fn default_max_attempts() -> usize {
    3
}
fn default_initial_delay_ms() -> u64 {
    2_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_facebook_api_version() -> String {
    "v18.0".to_string()
}
fn default_google_rate_limit() -> RateLimitConfig {
    RateLimitConfig { max_calls: 10, window_secs: 60 }
}
fn default_facebook_rate_limit() -> RateLimitConfig {
    RateLimitConfig { max_calls: 200, window_secs: 3_600 }
}
fn default_linkedin_rate_limit() -> RateLimitConfig {
    RateLimitConfig { max_calls: 100, window_secs: 86_400 }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            lookback_days: default_lookback_days(),
            tolerance: default_tolerance(),
            crm_timeout_ms: default_crm_timeout_ms(),
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            platform_timeout_ms: default_platform_timeout_ms(),
            identity_timeout_ms: default_crm_timeout_ms(),
            max_concurrent_platforms: default_max_concurrent_platforms(),
            retry: RetryConfig::default(),
            dry_run: default_dry_run(),
            currency: default_currency(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            developer_token: String::new(),
            refresh_token: String::new(),
            customer_id: String::new(),
            rate_limit: default_google_rate_limit(),
        }
    }
}

impl Default for FacebookAdsConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            ad_account_id: String::new(),
            api_version: default_facebook_api_version(),
            rate_limit: default_facebook_rate_limit(),
        }
    }
}

impl Default for LinkedInAdsConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            ad_account_id: String::new(),
            rate_limit: default_linkedin_rate_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            attribution: AttributionConfig::default(),
            signaling: SignalingConfig::default(),
            google_ads: GoogleAdsConfig::default(),
            facebook_ads: FacebookAdsConfig::default(),
            linkedin_ads: LinkedInAdsConfig::default(),
        }
    }
}

impl AttributionConfig {
    pub fn default_model(&self) -> AttributionResult<AttributionModelKind> {
        self.default_model.parse()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ATTRIBUTION")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> AttributionResult<()> {
        self.attribution.default_model()?;
        if !(1..=365).contains(&self.attribution.lookback_days) {
            return Err(AttributionError::Configuration(format!(
                "attribution.lookback_days must be within 1..=365, got {}",
                self.attribution.lookback_days
            )));
        }
        if !(self.attribution.tolerance > 0.0) {
            return Err(AttributionError::Configuration(
                "attribution.tolerance must be positive".to_string(),
            ));
        }
        if self.attribution.crm_timeout_ms == 0 {
            return Err(AttributionError::Configuration(
                "attribution.crm_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.signaling.platform_timeout_ms == 0 || self.signaling.identity_timeout_ms == 0 {
            return Err(AttributionError::Configuration(
                "signaling timeouts must be at least 1ms".to_string(),
            ));
        }
        if self.signaling.max_concurrent_platforms == 0 {
            return Err(AttributionError::Configuration(
                "signaling.max_concurrent_platforms must be at least 1".to_string(),
            ));
        }
        if self.signaling.retry.max_attempts == 0 {
            return Err(AttributionError::Configuration(
                "signaling.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit(&self, platform: AdPlatform) -> &RateLimitConfig {
        match platform {
            AdPlatform::GoogleAds => &self.google_ads.rate_limit,
            AdPlatform::FacebookAds => &self.facebook_ads.rate_limit,
            AdPlatform::LinkedinAds => &self.linkedin_ads.rate_limit,
        }
    }
}
