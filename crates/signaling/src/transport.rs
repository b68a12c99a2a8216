//! Outbound transport seam. Senders build payloads; a transport delivers
//! them. The HTTP client lives behind this trait so the dispatch path can
//! be exercised without the network.

use async_trait::async_trait;
use attribution_core::error::AttributionResult;
use attribution_core::signals::AdPlatform;
use serde_json::{json, Value};
use tracing::info;

#[async_trait]
pub trait ConversionTransport: Send + Sync {
    /// Deliver `payload` to `endpoint` and return the platform's response body.
    async fn post(&self, platform: AdPlatform, endpoint: &str, payload: Value) -> AttributionResult<Value>;

    /// A dry-run transport never reaches the platform, so senders accept
    /// missing credentials.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Logs the payload and acknowledges it.
#[derive(Debug, Default, Clone)]
pub struct DryRunTransport;

#[async_trait]
impl ConversionTransport for DryRunTransport {
    async fn post(&self, platform: AdPlatform, endpoint: &str, payload: Value) -> AttributionResult<Value> {
        info!(
            platform = %platform,
            endpoint,
            payload = %payload,
            "Dry run: conversion not sent"
        );
        Ok(json!({ "dry_run": true }))
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
