//! Ad-platform conversion signaling types.
//!
//! Lifecycle transitions recorded in the CRM are forwarded as offline
//! conversions to the ad platforms that drove the contact:
//! - Google Ads (click conversions, matched by gclid)
//! - Facebook Ads (Conversions API, matched by fbclid)
//! - LinkedIn Ads (Conversions API, matched on hashed person data)
//!
//! A [`ConversionEvent`] is created once per transition and accumulates one
//! [`PlatformOutcome`] per eligible platform as the sends complete.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AttributionError, AttributionResult};
use crate::types::{AttributionRecord, LifecycleStage};

/// Supported ad platforms, in dispatch order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdPlatform {
    GoogleAds,
    FacebookAds,
    LinkedinAds,
}

impl AdPlatform {
    pub const ALL: [AdPlatform; 3] = [
        AdPlatform::GoogleAds,
        AdPlatform::FacebookAds,
        AdPlatform::LinkedinAds,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AdPlatform::GoogleAds => "Google Ads",
            AdPlatform::FacebookAds => "Facebook Ads",
            AdPlatform::LinkedinAds => "LinkedIn Ads",
        }
    }

    /// Metric label / wire name.
    pub fn key(&self) -> &'static str {
        match self {
            AdPlatform::GoogleAds => "google_ads",
            AdPlatform::FacebookAds => "facebook_ads",
            AdPlatform::LinkedinAds => "linkedin_ads",
        }
    }
}

impl fmt::Display for AdPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Progress of a single conversion event. `Completed` is terminal no matter
/// how many platforms succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Dispatching,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PlatformStatus {
    Synced,
    Failed { error: String },
    /// Abandoned before the call started (cancellation).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub platform: AdPlatform,
    /// Platform-specific conversion action the stage was mapped to.
    pub action: String,
    #[serde(flatten)]
    pub status: PlatformStatus,
}

impl PlatformOutcome {
    pub fn is_synced(&self) -> bool {
        self.status == PlatformStatus::Synced
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PlatformStatus::Failed { .. })
    }
}

/// A lifecycle-stage conversion and its per-platform sync outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionEvent {
    pub event_id: Uuid,
    pub contact_id: String,
    pub from_stage: LifecycleStage,
    pub to_stage: LifecycleStage,
    pub conversion_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// Touchpoints credited by the attribution the conversion was synced
    /// with, if any.
    #[serde(default)]
    pub attributed_touchpoints: Vec<String>,
    pub state: SyncState,
    pub outcomes: Vec<PlatformOutcome>,
}

impl ConversionEvent {
    /// Validates the transition; equal stages and negative values are rejected.
    pub fn new(
        contact_id: &str,
        from_stage: LifecycleStage,
        to_stage: LifecycleStage,
        conversion_value: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> AttributionResult<Self> {
        if contact_id.trim().is_empty() {
            return Err(AttributionError::validation("contact_id", "Contact ID cannot be empty"));
        }
        if from_stage == to_stage {
            return Err(AttributionError::validation(
                "to_stage",
                "from_stage and to_stage must be different",
            ));
        }
        if let Some(value) = conversion_value {
            crate::types::validate_total_value(value)?;
        }

        Ok(Self {
            event_id: Uuid::new_v4(),
            contact_id: contact_id.to_string(),
            from_stage,
            to_stage,
            conversion_value,
            timestamp,
            attributed_touchpoints: Vec::new(),
            state: SyncState::Pending,
            outcomes: Vec::new(),
        })
    }

    /// Copy the credited touchpoint ids from `record`, which must belong to
    /// the same contact.
    pub fn attach_attribution(&mut self, record: &AttributionRecord) -> AttributionResult<()> {
        if record.contact_id != self.contact_id {
            return Err(AttributionError::validation(
                "contact_id",
                format!(
                    "attribution for {} cannot be attached to a conversion of {}",
                    record.contact_id, self.contact_id
                ),
            ));
        }
        self.attributed_touchpoints = record.credited_touchpoints();
        Ok(())
    }

    pub fn record(&mut self, outcome: PlatformOutcome) {
        self.outcomes.push(outcome);
    }

    /// Platforms that accepted the conversion, in platform order.
    pub fn synced_platforms(&self) -> Vec<AdPlatform> {
        let mut synced: Vec<AdPlatform> = self
            .outcomes
            .iter()
            .filter(|o| o.is_synced())
            .map(|o| o.platform)
            .collect();
        synced.sort();
        synced
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status != PlatformStatus::Skipped).count()
    }
}
