//! Sync dispatcher: fans a lifecycle conversion out to every eligible ad
//! platform and aggregates the per-platform outcomes.

use std::sync::Arc;
use std::time::Duration;

use attribution_core::config::{AppConfig, SignalingConfig};
use attribution_core::crm::IdentitySource;
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::signals::{ConversionEvent, PlatformOutcome, PlatformStatus, SyncState};
use attribution_core::signals::AdPlatform;
use attribution_core::types::{AttributionRecord, ContactIdentity, LifecycleStage, RequestContext};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::rate_limit::PlatformRateLimiter;
use crate::retry::with_retry;
use crate::senders::{
    ConversionRequest, FacebookAdsSender, GoogleAdsSender, LinkedInAdsSender, PlatformReceipt,
    PlatformSender,
};
use crate::taxonomy;
use crate::transport::ConversionTransport;

pub struct SyncDispatcher {
    identities: Arc<dyn IdentitySource>,
    senders: Vec<Arc<dyn PlatformSender>>,
    limiter: Arc<PlatformRateLimiter>,
    config: SignalingConfig,
}

impl SyncDispatcher {
    pub fn new(
        identities: Arc<dyn IdentitySource>,
        senders: Vec<Arc<dyn PlatformSender>>,
        limiter: Arc<PlatformRateLimiter>,
        config: &SignalingConfig,
    ) -> Self {
        info!(
            platform_count = senders.len(),
            max_concurrent = config.max_concurrent_platforms,
            "Sync dispatcher initialized"
        );
        Self {
            identities,
            senders,
            limiter,
            config: config.clone(),
        }
    }

    /// Wire the three platform senders and their rate limits from
    /// application config.
    pub fn from_config(
        identities: Arc<dyn IdentitySource>,
        config: &AppConfig,
        transport: Arc<dyn ConversionTransport>,
    ) -> Self {
        let senders: Vec<Arc<dyn PlatformSender>> = vec![
            Arc::new(GoogleAdsSender::new(config.google_ads.clone(), transport.clone())),
            Arc::new(FacebookAdsSender::new(config.facebook_ads.clone(), transport.clone())),
            Arc::new(LinkedInAdsSender::new(config.linkedin_ads.clone(), transport)),
        ];

        let limiter = PlatformRateLimiter::new();
        for sender in &senders {
            let platform = sender.platform();
            limiter.set_limit(platform, config.rate_limit(platform).clone());
        }

        Self::new(identities, senders, Arc::new(limiter), &config.signaling)
    }

    pub async fn sync(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
        from_stage: LifecycleStage,
        to_stage: LifecycleStage,
        value: Option<f64>,
    ) -> AttributionResult<ConversionEvent> {
        self.sync_with_cancel(ctx, contact_id, from_stage, to_stage, value, None, &CancellationToken::new())
            .await
    }

    /// Like [`sync`](Self::sync), recording the touchpoints `attribution`
    /// credited on the event. The record must belong to `contact_id`.
    pub async fn sync_attributed(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
        from_stage: LifecycleStage,
        to_stage: LifecycleStage,
        value: Option<f64>,
        attribution: &AttributionRecord,
    ) -> AttributionResult<ConversionEvent> {
        self.sync_with_cancel(
            ctx,
            contact_id,
            from_stage,
            to_stage,
            value,
            Some(attribution),
            &CancellationToken::new(),
        )
        .await
    }

    /// Platform calls that have not started when `cancel` fires are recorded
    /// as skipped; calls already in flight finish or time out.
    #[allow(clippy::too_many_arguments)]
    pub async fn sync_with_cancel(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
        from_stage: LifecycleStage,
        to_stage: LifecycleStage,
        value: Option<f64>,
        attribution: Option<&AttributionRecord>,
        cancel: &CancellationToken,
    ) -> AttributionResult<ConversionEvent> {
        let mut event = ConversionEvent::new(contact_id, from_stage, to_stage, value, ctx.started_at)?;
        if let Some(record) = attribution {
            event.attach_attribution(record)?;
        }
        let identity = self.fetch_identity(contact_id).await?;

        let mut plan = Vec::new();
        for sender in &self.senders {
            let platform = sender.platform();
            if !taxonomy::is_eligible(platform, &identity) {
                debug!(contact_id, platform = %platform, "No click id, platform not eligible");
                continue;
            }
            match taxonomy::conversion_action(platform, to_stage) {
                Some(action) => plan.push((sender.clone(), action)),
                None => {
                    debug!(
                        contact_id,
                        platform = %platform,
                        stage = %to_stage,
                        "No conversion action mapped, skipping"
                    );
                    metrics::counter!("signaling.skipped_unmapped", "platform" => platform.key())
                        .increment(1);
                }
            }
        }

        event.state = SyncState::Dispatching;
        let semaphore = Semaphore::new(self.config.max_concurrent_platforms.max(1));
        let mut pending = FuturesUnordered::new();

        for (sender, action) in plan {
            let request = ConversionRequest {
                identity: identity.clone(),
                action: action.to_string(),
                value,
                currency: self.config.currency.clone(),
                timestamp: event.timestamp,
                correlation_id: ctx.correlation_id,
            };
            let semaphore = &semaphore;
            pending.push(async move {
                let status = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PlatformStatus::Skipped,
                    permit = semaphore.acquire() => match permit {
                        Ok(_permit) if !cancel.is_cancelled() => {
                            self.dispatch_one(sender.as_ref(), &request).await
                        }
                        _ => PlatformStatus::Skipped,
                    },
                };
                PlatformOutcome {
                    platform: sender.platform(),
                    action: request.action,
                    status,
                }
            });
        }

        while let Some(outcome) = pending.next().await {
            event.record(outcome);
        }

        event.outcomes.sort_by_key(|o| o.platform);
        event.state = SyncState::Completed;

        let failures: Vec<String> = event
            .outcomes
            .iter()
            .filter_map(|o| match &o.status {
                PlatformStatus::Failed { error } => Some(error.clone()),
                _ => None,
            })
            .collect();

        if event.synced_platforms().is_empty() && !failures.is_empty() {
            warn!(
                correlation_id = %ctx.correlation_id,
                contact_id,
                failed = failures.len(),
                "Conversion sync failed on every platform"
            );
            return Err(AttributionError::AllPlatformsFailed {
                contact_id: contact_id.to_string(),
                failures,
            });
        }

        info!(
            correlation_id = %ctx.correlation_id,
            contact_id,
            from_stage = %from_stage,
            to_stage = %to_stage,
            synced = event.synced_platforms().len(),
            failed = failures.len(),
            "Conversion sync completed"
        );
        Ok(event)
    }

    /// Upload a batch of conversions to one platform under the same rate
    /// limit, retry and timeout as a single sync.
    pub async fn send_batch(
        &self,
        ctx: &RequestContext,
        platform: AdPlatform,
        requests: &[ConversionRequest],
    ) -> AttributionResult<PlatformReceipt> {
        let sender = self
            .senders
            .iter()
            .find(|s| s.platform() == platform)
            .ok_or_else(|| AttributionError::Configuration(format!("no sender registered for {platform}")))?;
        let timeout_ms = self.config.platform_timeout_ms;

        let attempt = with_retry(&self.config.retry, || async {
            self.limiter.acquire(platform)?;
            sender.send_conversions_batch(requests).await
        });

        let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), attempt).await {
            Ok(result) => result,
            Err(_) => Err(AttributionError::Timeout {
                platform: platform.to_string(),
                timeout_ms,
            }),
        };
        match &result {
            Ok(_) => {
                metrics::counter!("signaling.sent", "platform" => platform.key()).increment(requests.len() as u64);
                info!(
                    correlation_id = %ctx.correlation_id,
                    platform = %platform,
                    count = requests.len(),
                    "Conversion batch uploaded"
                );
            }
            Err(e) => {
                metrics::counter!("signaling.failed", "platform" => platform.key()).increment(1);
                warn!(
                    correlation_id = %ctx.correlation_id,
                    platform = %platform,
                    count = requests.len(),
                    error = %e,
                    "Conversion batch upload failed"
                );
            }
        }
        result
    }

    async fn fetch_identity(&self, contact_id: &str) -> AttributionResult<ContactIdentity> {
        let timeout_ms = self.config.identity_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.identities.get_identity(contact_id))
            .await
            .map_err(|_| AttributionError::CrmTimeout {
                contact_id: contact_id.to_string(),
                timeout_ms,
            })?
    }

    async fn dispatch_one(&self, sender: &dyn PlatformSender, request: &ConversionRequest) -> PlatformStatus {
        let platform = sender.platform();
        let timeout_ms = self.config.platform_timeout_ms;

        let attempt = with_retry(&self.config.retry, || async {
            self.limiter.acquire(platform)?;
            sender.send_conversion(request).await
        });

        let error = match tokio::time::timeout(Duration::from_millis(timeout_ms), attempt).await {
            Ok(Ok(_receipt)) => {
                metrics::counter!("signaling.sent", "platform" => platform.key()).increment(1);
                debug!(platform = %platform, action = %request.action, "Conversion accepted");
                return PlatformStatus::Synced;
            }
            Ok(Err(e)) => AttributionError::Sync {
                platform: platform.to_string(),
                message: e.to_string(),
            },
            Err(_) => AttributionError::Timeout {
                platform: platform.to_string(),
                timeout_ms,
            },
        };

        metrics::counter!("signaling.failed", "platform" => platform.key()).increment(1);
        warn!(
            correlation_id = %request.correlation_id,
            platform = %platform,
            error = %error,
            "Conversion sync failed"
        );
        PlatformStatus::Failed {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::PlatformReceipt;
    use crate::transport::DryRunTransport;
    use async_trait::async_trait;
    use attribution_core::config::RetryConfig;
    use attribution_core::types::{AttributionModelKind, ClickIds, Touchpoint};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedIdentity(ContactIdentity);

    #[async_trait]
    impl IdentitySource for FixedIdentity {
        async fn get_identity(&self, _contact_id: &str) -> AttributionResult<ContactIdentity> {
            Ok(self.0.clone())
        }
    }

    struct StalledIdentity;

    #[async_trait]
    impl IdentitySource for StalledIdentity {
        async fn get_identity(&self, _contact_id: &str) -> AttributionResult<ContactIdentity> {
            std::future::pending().await
        }
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Hang,
        CancelThenSucceed,
    }

    struct FakeSender {
        platform: AdPlatform,
        behavior: Behavior,
        calls: AtomicUsize,
        cancel: CancellationToken,
    }

    impl FakeSender {
        fn new(platform: AdPlatform, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                platform,
                behavior,
                calls: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
            })
        }
    }

    #[async_trait]
    impl PlatformSender for FakeSender {
        fn platform(&self) -> AdPlatform {
            self.platform
        }

        async fn send_conversion(&self, _request: &ConversionRequest) -> AttributionResult<PlatformReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => {}
                Behavior::Fail => {
                    return Err(AttributionError::Authentication {
                        service: self.platform.display_name().to_string(),
                        message: "invalid token".to_string(),
                    })
                }
                Behavior::Hang => tokio::time::sleep(Duration::from_secs(5)).await,
                Behavior::CancelThenSucceed => self.cancel.cancel(),
            }
            Ok(PlatformReceipt {
                platform: self.platform,
                response: json!({ "ok": true }),
            })
        }

        async fn send_conversions_batch(&self, requests: &[ConversionRequest]) -> AttributionResult<PlatformReceipt> {
            let mut receipt = self.send_conversion(&requests[0]).await?;
            receipt.response["count"] = json!(requests.len());
            Ok(receipt)
        }
    }

    fn identity(gclid: bool, fbclid: bool) -> ContactIdentity {
        let mut identity = ContactIdentity::new("c-1");
        identity.email = Some("ana@example.com".to_string());
        identity.click_ids = ClickIds {
            gclid: gclid.then(|| "gclid-1".to_string()),
            fbclid: fbclid.then(|| "fbclid-1".to_string()),
            ..Default::default()
        };
        identity
    }

    fn config() -> SignalingConfig {
        SignalingConfig {
            platform_timeout_ms: 200,
            retry: RetryConfig {
                max_attempts: 1,
                initial_delay_ms: 1,
                max_delay_ms: 1,
            },
            ..SignalingConfig::default()
        }
    }

    fn dispatcher(identity: ContactIdentity, senders: Vec<Arc<dyn PlatformSender>>, config: SignalingConfig) -> SyncDispatcher {
        SyncDispatcher::new(
            Arc::new(FixedIdentity(identity)),
            senders,
            Arc::new(PlatformRateLimiter::new()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_facebook_only_contact() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::Succeed);
        let facebook = FakeSender::new(AdPlatform::FacebookAds, Behavior::Succeed);
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(
            identity(false, true),
            vec![google.clone(), facebook.clone(), linkedin.clone()],
            config(),
        );

        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Opportunity, LifecycleStage::Customer, Some(900.0))
            .await
            .unwrap();

        assert_eq!(event.state, SyncState::Completed);
        assert_eq!(event.synced_platforms(), vec![AdPlatform::FacebookAds, AdPlatform::LinkedinAds]);
        assert_eq!(google.calls.load(Ordering::SeqCst), 0);
        assert_eq!(event.outcomes[0].action, "Purchase");
        assert_eq!(event.outcomes[1].action, "purchase_conversion");
    }

    #[tokio::test]
    async fn test_equal_stages_never_contact_platforms() {
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(identity(true, true), vec![linkedin.clone()], config());

        let err = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::Lead, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AttributionError::Validation { .. }));
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_success_is_ok() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::Fail);
        let facebook = FakeSender::new(AdPlatform::FacebookAds, Behavior::Succeed);
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(identity(true, true), vec![google, facebook, linkedin], config());

        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::MarketingQualifiedLead, None)
            .await
            .unwrap();

        assert_eq!(event.synced_platforms().len(), 2);
        assert!(event.outcomes[0].is_failed());
        match &event.outcomes[0].status {
            PlatformStatus::Failed { error } => assert!(error.contains("google_ads"), "{error}"),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_platform_failure() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::Hang);
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(identity(true, false), vec![google, linkedin], config());

        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::Opportunity, None)
            .await
            .unwrap();

        assert_eq!(event.synced_platforms(), vec![AdPlatform::LinkedinAds]);
        match &event.outcomes[0].status {
            PlatformStatus::Failed { error } => assert!(error.contains("200ms"), "{error}"),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_platforms_failed() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::Fail);
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Fail);
        let d = dispatcher(identity(true, false), vec![google, linkedin], config());

        let err = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::Customer, None)
            .await
            .unwrap_err();
        match err {
            AttributionError::AllPlatformsFailed { contact_id, failures } => {
                assert_eq!(contact_id, "c-1");
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmapped_stage_is_not_an_error() {
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(identity(true, true), vec![linkedin.clone()], config());

        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Customer, LifecycleStage::Evangelist, None)
            .await
            .unwrap();
        assert!(event.outcomes.is_empty());
        assert!(event.synced_platforms().is_empty());
        assert_eq!(event.state, SyncState::Completed);
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_skips_unstarted_calls() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::CancelThenSucceed);
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let cancel = google.cancel.clone();
        let d = dispatcher(
            identity(true, false),
            vec![google, linkedin.clone()],
            SignalingConfig {
                max_concurrent_platforms: 1,
                ..config()
            },
        );

        let event = d
            .sync_with_cancel(
                &RequestContext::new(),
                "c-1",
                LifecycleStage::Lead,
                LifecycleStage::Customer,
                None,
                None,
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(event.synced_platforms(), vec![AdPlatform::GoogleAds]);
        assert_eq!(event.outcomes[1].status, PlatformStatus::Skipped);
        assert_eq!(event.attempted(), 1);
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_platform_fails_alone() {
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let facebook = FakeSender::new(AdPlatform::FacebookAds, Behavior::Succeed);
        let limiter = PlatformRateLimiter::new();
        limiter.set_limit(
            AdPlatform::LinkedinAds,
            attribution_core::config::RateLimitConfig { max_calls: 0, window_secs: 60 },
        );
        let d = SyncDispatcher::new(
            Arc::new(FixedIdentity(identity(false, true))),
            vec![facebook, linkedin.clone()],
            Arc::new(limiter),
            &config(),
        );

        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::Customer, None)
            .await
            .unwrap();
        assert_eq!(event.synced_platforms(), vec![AdPlatform::FacebookAds]);
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stalled_identity_lookup_times_out() {
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = SyncDispatcher::new(
            Arc::new(StalledIdentity),
            vec![linkedin.clone()],
            Arc::new(PlatformRateLimiter::new()),
            &SignalingConfig {
                identity_timeout_ms: 50,
                ..config()
            },
        );

        let err = d
            .sync(&RequestContext::new(), "c-slow", LifecycleStage::Lead, LifecycleStage::Customer, None)
            .await
            .unwrap_err();
        match err {
            AttributionError::CrmTimeout { contact_id, timeout_ms } => {
                assert_eq!(contact_id, "c-slow");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 0);
    }

    fn attribution(contact_id: &str) -> AttributionRecord {
        let now = Utc::now();
        let tps = vec![
            Touchpoint::new("tp-1", now - chrono::Duration::days(3)),
            Touchpoint::new("tp-2", now - chrono::Duration::days(1)),
        ];
        let credits = BTreeMap::from([("tp-1".to_string(), 0.0), ("tp-2".to_string(), 500.0)]);
        AttributionRecord::new(contact_id, AttributionModelKind::LastTouch, 500.0, credits, &tps, 90, 1e-6)
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_records_attributed_touchpoints() {
        let linkedin = FakeSender::new(AdPlatform::LinkedinAds, Behavior::Succeed);
        let d = dispatcher(identity(false, false), vec![linkedin.clone()], config());

        let event = d
            .sync_attributed(
                &RequestContext::new(),
                "c-1",
                LifecycleStage::Opportunity,
                LifecycleStage::Customer,
                Some(500.0),
                &attribution("c-1"),
            )
            .await
            .unwrap();
        assert_eq!(event.attributed_touchpoints, vec!["tp-2".to_string()]);
        assert_eq!(event.synced_platforms(), vec![AdPlatform::LinkedinAds]);

        let err = d
            .sync_attributed(
                &RequestContext::new(),
                "c-1",
                LifecycleStage::Opportunity,
                LifecycleStage::Customer,
                None,
                &attribution("c-2"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AttributionError::Validation { .. }));
        assert_eq!(linkedin.calls.load(Ordering::SeqCst), 1);
    }

    fn batch_request(correlation_id: uuid::Uuid) -> ConversionRequest {
        ConversionRequest {
            identity: identity(true, true),
            action: "purchase".to_string(),
            value: Some(10.0),
            currency: "EUR".to_string(),
            timestamp: Utc::now(),
            correlation_id,
        }
    }

    #[tokio::test]
    async fn test_send_batch_routes_to_platform_sender() {
        let google = FakeSender::new(AdPlatform::GoogleAds, Behavior::Succeed);
        let d = dispatcher(identity(true, true), vec![google.clone()], config());
        let ctx = RequestContext::new();
        let batch = vec![batch_request(ctx.correlation_id), batch_request(ctx.correlation_id)];

        let receipt = d.send_batch(&ctx, AdPlatform::GoogleAds, &batch).await.unwrap();
        assert_eq!(receipt.response["count"], 2);
        assert_eq!(google.calls.load(Ordering::SeqCst), 1);

        let err = d.send_batch(&ctx, AdPlatform::FacebookAds, &batch).await.unwrap_err();
        assert!(matches!(err, AttributionError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_send_batch_dry_run_rejects_oversized() {
        let d = SyncDispatcher::from_config(
            Arc::new(FixedIdentity(identity(true, true))),
            &AppConfig::default(),
            Arc::new(DryRunTransport),
        );
        let ctx = RequestContext::new();
        let ok = vec![batch_request(ctx.correlation_id); 3];
        assert!(d.send_batch(&ctx, AdPlatform::FacebookAds, &ok).await.is_ok());

        let over = vec![batch_request(ctx.correlation_id); crate::senders::MAX_BATCH_SIZE + 1];
        let err = d.send_batch(&ctx, AdPlatform::FacebookAds, &over).await.unwrap_err();
        assert!(matches!(err, AttributionError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_from_config_dry_run() {
        let d = SyncDispatcher::from_config(
            Arc::new(FixedIdentity(identity(true, true))),
            &AppConfig::default(),
            Arc::new(DryRunTransport),
        );
        let event = d
            .sync(&RequestContext::new(), "c-1", LifecycleStage::Lead, LifecycleStage::SalesQualifiedLead, Some(10.0))
            .await
            .unwrap();
        assert_eq!(event.synced_platforms(), AdPlatform::ALL.to_vec());
    }
}
