//! Attribution orchestrator: resolves the model, fetches the contact's
//! touchpoints, runs the calculator and packages the result.
//!
//! Calculation and CRM write-back are two separate steps: a failed
//! write-back is logged and counted but the computed record is still
//! returned. Calculating again over the same snapshot is always safe.
//!
//! Both CRM calls run under `crm_timeout_ms`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use attribution_core::config::AttributionConfig;
use attribution_core::crm::{AggregateWriter, TouchpointSource};
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::types::{
    validate_total_value, AttributionModelKind, AttributionRecord, RequestContext, Touchpoint,
};
use chrono::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::calculator;

pub struct AttributionOrchestrator {
    source: Arc<dyn TouchpointSource>,
    writer: Arc<dyn AggregateWriter>,
    config: AttributionConfig,
}

impl AttributionOrchestrator {
    pub fn new(
        source: Arc<dyn TouchpointSource>,
        writer: Arc<dyn AggregateWriter>,
        config: &AttributionConfig,
    ) -> Self {
        Self {
            source,
            writer,
            config: config.clone(),
        }
    }

    /// Calculate attribution using a model given by its wire name. Unknown
    /// names fail before the CRM is touched.
    pub async fn calculate(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
        total_value: f64,
        model_name: &str,
    ) -> AttributionResult<AttributionRecord> {
        let model: AttributionModelKind = model_name.parse()?;
        self.calculate_with(ctx, contact_id, total_value, model).await
    }

    pub async fn calculate_with(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
        total_value: f64,
        model: AttributionModelKind,
    ) -> AttributionResult<AttributionRecord> {
        if contact_id.trim().is_empty() {
            return Err(AttributionError::validation("contact_id", "Contact ID cannot be empty"));
        }
        validate_total_value(total_value)?;

        let touchpoints = self.load_sequence(ctx, contact_id).await?;
        let credits = calculator::allocate(model, &touchpoints, total_value);
        let record = AttributionRecord::new(
            contact_id,
            model,
            total_value,
            credits,
            &touchpoints,
            self.config.lookback_days,
            self.config.tolerance,
        )?;

        metrics::counter!("attribution.calculated", "model" => model.as_str()).increment(1);
        info!(
            correlation_id = %ctx.correlation_id,
            contact_id = %contact_id,
            model = %model,
            total_value = total_value,
            touchpoints = touchpoints.len(),
            "calculated attribution"
        );

        let write = timeout(
            self.crm_timeout(),
            self.writer.write_aggregate(contact_id, total_value, touchpoints.len()),
        )
        .await;
        let failure = match write {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {}ms", self.config.crm_timeout_ms)),
        };
        if let Some(error) = failure {
            metrics::counter!("attribution.writeback_failed").increment(1);
            warn!(
                correlation_id = %ctx.correlation_id,
                contact_id = %contact_id,
                error = %error,
                "attribution write-back failed; returning computed record"
            );
        }

        Ok(record)
    }

    /// Fetch, validate, sort ascending by timestamp and drop touchpoints
    /// outside the lookback window.
    async fn load_sequence(
        &self,
        ctx: &RequestContext,
        contact_id: &str,
    ) -> AttributionResult<Vec<Touchpoint>> {
        let fetched = timeout(self.crm_timeout(), self.source.get_touchpoints(contact_id))
            .await
            .map_err(|_| {
                AttributionError::calculation(
                    contact_id,
                    format!("touchpoint lookup timed out after {}ms", self.config.crm_timeout_ms),
                )
            })?
            .map_err(|e| match e {
                AttributionError::Calculation { .. } => e,
                other => AttributionError::calculation(contact_id, other.to_string()),
            })?;

        let mut touchpoints = fetched
            .into_iter()
            .map(Touchpoint::normalized)
            .collect::<AttributionResult<Vec<_>>>()
            .map_err(|e| AttributionError::calculation(contact_id, format!("malformed touchpoint: {e}")))?;

        // Ties broken by id so equal timestamps still order deterministically.
        touchpoints.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.touchpoint_id.cmp(&b.touchpoint_id))
        });
        if has_duplicate_ids(&touchpoints) {
            return Err(AttributionError::calculation(contact_id, "duplicate touchpoint ids"));
        }

        let cutoff = ctx.started_at - Duration::days(i64::from(self.config.lookback_days));
        let before = touchpoints.len();
        touchpoints.retain(|tp| tp.timestamp >= cutoff);
        if touchpoints.len() < before {
            debug!(
                correlation_id = %ctx.correlation_id,
                contact_id = %contact_id,
                dropped = before - touchpoints.len(),
                lookback_days = self.config.lookback_days,
                "dropped touchpoints outside lookback window"
            );
        }

        Ok(touchpoints)
    }

    fn crm_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.config.crm_timeout_ms)
    }
}

fn has_duplicate_ids(touchpoints: &[Touchpoint]) -> bool {
    let mut ids: Vec<&str> = touchpoints.iter().map(|t| t.touchpoint_id.as_str()).collect();
    ids.sort_unstable();
    ids.windows(2).any(|w| w[0] == w[1])
}
