//! Per-platform conversion senders.
//!
//! Each sender turns a [`ConversionRequest`] into the platform's upload
//! payload and hands it to a [`ConversionTransport`]. Person data is
//! normalized (trimmed, lowercased) and SHA-256 hashed before it leaves the
//! process; click ids are sent as-is.
//!
//! Batch uploads wrap up to [`MAX_BATCH_SIZE`] entries in the same envelope
//! the single upload uses.

use std::sync::Arc;

use async_trait::async_trait;
use attribution_core::config::{FacebookAdsConfig, GoogleAdsConfig, LinkedInAdsConfig};
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::signals::AdPlatform;
use attribution_core::types::ContactIdentity;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::taxonomy;
use crate::transport::ConversionTransport;

/// One conversion to upload to one platform.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub identity: ContactIdentity,
    /// Platform-specific action name from the taxonomy.
    pub action: String,
    pub value: Option<f64>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct PlatformReceipt {
    pub platform: AdPlatform,
    pub response: Value,
}

/// Entries accepted in one batch upload, on every platform.
pub const MAX_BATCH_SIZE: usize = 1000;

#[async_trait]
pub trait PlatformSender: Send + Sync {
    fn platform(&self) -> AdPlatform;

    async fn send_conversion(&self, request: &ConversionRequest) -> AttributionResult<PlatformReceipt>;

    /// Upload several conversions in one call. Empty batches and batches
    /// over [`MAX_BATCH_SIZE`] are rejected before anything is sent.
    async fn send_conversions_batch(&self, requests: &[ConversionRequest]) -> AttributionResult<PlatformReceipt>;
}

pub(crate) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

fn not_configured(platform: AdPlatform) -> AttributionError {
    AttributionError::Configuration(format!("{} credentials are not configured", platform.display_name()))
}

fn missing_click_id(platform: AdPlatform) -> AttributionError {
    AttributionError::validation("click_ids", format!("{} requires a click id", platform.display_name()))
}

fn check_batch(requests: &[ConversionRequest]) -> AttributionResult<()> {
    if requests.is_empty() {
        return Err(AttributionError::validation("conversions", "Conversion list cannot be empty"));
    }
    if requests.len() > MAX_BATCH_SIZE {
        return Err(AttributionError::validation(
            "conversions",
            format!("Batch size cannot exceed {MAX_BATCH_SIZE}"),
        ));
    }
    Ok(())
}

fn entries<F>(requests: &[ConversionRequest], build: F) -> AttributionResult<Vec<Value>>
where
    F: Fn(&ConversionRequest) -> AttributionResult<Value>,
{
    check_batch(requests)?;
    requests.iter().map(build).collect()
}

fn hashed_person_data(identity: &ContactIdentity) -> Map<String, Value> {
    let mut data = Map::new();
    let fields = [
        ("em", identity.email.as_deref()),
        ("fn", identity.first_name.as_deref()),
        ("ln", identity.last_name.as_deref()),
        ("ph", identity.phone.as_deref()),
    ];
    for (key, value) in fields {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            data.insert(key.to_string(), Value::String(sha256_hex(value)));
        }
    }
    data
}

// --- Google Ads ---

pub struct GoogleAdsSender {
    config: GoogleAdsConfig,
    transport: Arc<dyn ConversionTransport>,
}

impl GoogleAdsSender {
    pub fn new(config: GoogleAdsConfig, transport: Arc<dyn ConversionTransport>) -> Self {
        Self { config, transport }
    }

    pub fn build_payload(&self, request: &ConversionRequest) -> AttributionResult<Value> {
        self.build_batch_payload(std::slice::from_ref(request))
    }

    pub fn build_batch_payload(&self, requests: &[ConversionRequest]) -> AttributionResult<Value> {
        let conversions = entries(requests, |r| self.conversion(r))?;
        Ok(json!({
            "conversions": conversions,
            "partial_failure": true,
        }))
    }

    fn conversion(&self, request: &ConversionRequest) -> AttributionResult<Value> {
        let gclid = taxonomy::click_id(AdPlatform::GoogleAds, &request.identity)
            .ok_or_else(|| missing_click_id(AdPlatform::GoogleAds))?;

        let mut conversion = json!({
            "gclid": gclid,
            "conversion_action": format!(
                "customers/{}/conversionActions/{}",
                self.config.customer_id, request.action
            ),
            "conversion_date_time": request.timestamp.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
        });
        if let Some(value) = request.value {
            conversion["conversion_value"] = json!(value);
            conversion["currency_code"] = json!(request.currency);
        }
        Ok(conversion)
    }

    async fn upload(&self, payload: Value) -> AttributionResult<PlatformReceipt> {
        let endpoint = format!(
            "https://googleads.googleapis.com/v15/customers/{}:uploadClickConversions",
            self.config.customer_id
        );
        let response = self.transport.post(AdPlatform::GoogleAds, &endpoint, payload).await?;
        Ok(PlatformReceipt {
            platform: AdPlatform::GoogleAds,
            response,
        })
    }
}

#[async_trait]
impl PlatformSender for GoogleAdsSender {
    fn platform(&self) -> AdPlatform {
        AdPlatform::GoogleAds
    }

    async fn send_conversion(&self, request: &ConversionRequest) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_payload(request)?).await
    }

    async fn send_conversions_batch(&self, requests: &[ConversionRequest]) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_batch_payload(requests)?).await
    }
}

// --- Facebook Conversions API ---

pub struct FacebookAdsSender {
    config: FacebookAdsConfig,
    transport: Arc<dyn ConversionTransport>,
}

impl FacebookAdsSender {
    pub fn new(config: FacebookAdsConfig, transport: Arc<dyn ConversionTransport>) -> Self {
        Self { config, transport }
    }

    /// The access token is attached by the transport, never embedded here.
    pub fn build_payload(&self, request: &ConversionRequest) -> AttributionResult<Value> {
        self.build_batch_payload(std::slice::from_ref(request))
    }

    pub fn build_batch_payload(&self, requests: &[ConversionRequest]) -> AttributionResult<Value> {
        let events = entries(requests, Self::event)?;
        Ok(json!({ "data": events }))
    }

    fn event(request: &ConversionRequest) -> AttributionResult<Value> {
        let fbclid = taxonomy::click_id(AdPlatform::FacebookAds, &request.identity)
            .ok_or_else(|| missing_click_id(AdPlatform::FacebookAds))?;
        let ts = request.timestamp.timestamp();

        let mut user_data = hashed_person_data(&request.identity);
        user_data.insert("fbc".to_string(), Value::String(format!("fb.1.{ts}.{fbclid}")));

        let mut event = json!({
            "event_name": request.action,
            "event_time": ts,
            "event_id": format!("{}_{}", request.action, ts),
            "action_source": "website",
            "user_data": user_data,
        });
        if let Some(value) = request.value {
            event["custom_data"] = json!({ "value": value, "currency": request.currency });
        }
        Ok(event)
    }

    async fn upload(&self, payload: Value) -> AttributionResult<PlatformReceipt> {
        let endpoint = format!(
            "https://graph.facebook.com/{}/{}/events",
            self.config.api_version,
            self.config.pixel_id()
        );
        let response = self.transport.post(AdPlatform::FacebookAds, &endpoint, payload).await?;
        Ok(PlatformReceipt {
            platform: AdPlatform::FacebookAds,
            response,
        })
    }
}

#[async_trait]
impl PlatformSender for FacebookAdsSender {
    fn platform(&self) -> AdPlatform {
        AdPlatform::FacebookAds
    }

    async fn send_conversion(&self, request: &ConversionRequest) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_payload(request)?).await
    }

    async fn send_conversions_batch(&self, requests: &[ConversionRequest]) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_batch_payload(requests)?).await
    }
}

// --- LinkedIn Conversions API ---

pub struct LinkedInAdsSender {
    config: LinkedInAdsConfig,
    transport: Arc<dyn ConversionTransport>,
}

impl LinkedInAdsSender {
    pub fn new(config: LinkedInAdsConfig, transport: Arc<dyn ConversionTransport>) -> Self {
        Self { config, transport }
    }

    pub fn build_payload(&self, request: &ConversionRequest) -> AttributionResult<Value> {
        self.build_batch_payload(std::slice::from_ref(request))
    }

    pub fn build_batch_payload(&self, requests: &[ConversionRequest]) -> AttributionResult<Value> {
        let elements = entries(requests, Self::conversion)?;
        Ok(json!({ "elements": elements }))
    }

    /// LinkedIn matches on hashed email, so a contact without one cannot be
    /// uploaded.
    fn conversion(request: &ConversionRequest) -> AttributionResult<Value> {
        let email = request
            .identity
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AttributionError::validation("email", "LinkedIn conversions require an email"))?;

        let mut user_ids = vec![json!({ "idType": "SHA256_EMAIL", "idValue": sha256_hex(email) })];
        if let Some(li_fat_id) = request.identity.click_ids.li_fat_id.as_deref() {
            user_ids.push(json!({
                "idType": "LINKEDIN_FIRST_PARTY_ADS_TRACKING_UUID",
                "idValue": li_fat_id,
            }));
        }

        let mut conversion = json!({
            "conversion": request.action,
            "conversionHappenedAt": request.timestamp.timestamp_millis(),
            "eventId": format!("{}_{}", request.action, request.timestamp.timestamp()),
            "user": { "userIds": user_ids },
        });
        if let Some(value) = request.value {
            conversion["conversionValue"] = json!({
                "amount": value.to_string(),
                "currencyCode": request.currency,
            });
        }
        Ok(conversion)
    }

    async fn upload(&self, payload: Value) -> AttributionResult<PlatformReceipt> {
        let response = self
            .transport
            .post(AdPlatform::LinkedinAds, "https://api.linkedin.com/rest/conversionEvents", payload)
            .await?;
        Ok(PlatformReceipt {
            platform: AdPlatform::LinkedinAds,
            response,
        })
    }
}

#[async_trait]
impl PlatformSender for LinkedInAdsSender {
    fn platform(&self) -> AdPlatform {
        AdPlatform::LinkedinAds
    }

    async fn send_conversion(&self, request: &ConversionRequest) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_payload(request)?).await
    }

    async fn send_conversions_batch(&self, requests: &[ConversionRequest]) -> AttributionResult<PlatformReceipt> {
        if !self.config.enabled() && !self.transport.is_dry_run() {
            return Err(not_configured(self.platform()));
        }
        self.upload(self.build_batch_payload(requests)?).await
    }
}
