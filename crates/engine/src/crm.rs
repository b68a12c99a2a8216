//! In-memory CRM: contact records with their touchpoint history and the
//! attribution aggregates written back after each calculation.

use async_trait::async_trait;
use attribution_core::crm::{AggregateWriter, IdentitySource, TouchpointSource};
use attribution_core::error::{AttributionError, AttributionResult};
use attribution_core::types::{ContactIdentity, LifecycleStage, Touchpoint};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// UTM source/campaign of a first or last touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchSummary {
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
}

impl From<&Touchpoint> for TouchSummary {
    fn from(tp: &Touchpoint) -> Self {
        Self {
            utm_source: tp.utm_parameters.utm_source.clone(),
            utm_campaign: tp.utm_parameters.utm_campaign.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub identity: ContactIdentity,
    pub lifecycle_stage: LifecycleStage,
    #[serde(default)]
    pub touchpoints: Vec<Touchpoint>,
    #[serde(default)]
    pub first_touch: Option<TouchSummary>,
    #[serde(default)]
    pub last_touch: Option<TouchSummary>,
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub attributed_revenue: Option<f64>,
    #[serde(default)]
    pub attributed_touchpoint_count: Option<usize>,
    #[serde(default)]
    pub attributed_at: Option<DateTime<Utc>>,
}

impl ContactRecord {
    pub fn new(identity: ContactIdentity, lifecycle_stage: LifecycleStage) -> Self {
        Self {
            identity,
            lifecycle_stage,
            touchpoints: Vec::new(),
            first_touch: None,
            last_touch: None,
            partner_id: None,
            attributed_revenue: None,
            attributed_touchpoint_count: None,
            attributed_at: None,
        }
    }
}

pub struct InMemoryCrm {
    contacts: DashMap<String, ContactRecord>,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self {
            contacts: DashMap::new(),
        }
    }

    /// Insert or replace a contact. Touchpoints already on the record are
    /// replayed in timestamp order so the derived first/last touch and click
    /// ids are consistent. Nothing is stored if any touchpoint is rejected.
    pub fn upsert_contact(&self, mut record: ContactRecord) -> AttributionResult<()> {
        let contact_id = record.identity.contact_id.trim().to_string();
        if contact_id.is_empty() {
            return Err(AttributionError::validation("contact_id", "Contact ID cannot be empty"));
        }
        record.identity.contact_id = contact_id.clone();

        let mut touchpoints = std::mem::take(&mut record.touchpoints);
        touchpoints.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        for tp in touchpoints {
            apply_touchpoint(&mut record, tp)?;
        }
        self.contacts.insert(contact_id, record);
        Ok(())
    }

    /// Append a touchpoint to a contact's history and refresh the derived
    /// first/last touch, click ids and partner id.
    pub fn capture_touchpoint(&self, contact_id: &str, touchpoint: Touchpoint) -> AttributionResult<()> {
        let mut contact = self
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| AttributionError::validation("contact_id", format!("unknown contact {contact_id}")))?;
        apply_touchpoint(&mut contact, touchpoint)
    }

    /// Returns the previous stage.
    pub fn set_lifecycle_stage(&self, contact_id: &str, stage: LifecycleStage) -> Option<LifecycleStage> {
        self.contacts
            .get_mut(contact_id)
            .map(|mut c| std::mem::replace(&mut c.lifecycle_stage, stage))
    }

    pub fn get_contact(&self, contact_id: &str) -> Option<ContactRecord> {
        self.contacts.get(contact_id).map(|c| c.value().clone())
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }
}

impl Default for InMemoryCrm {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(contact_id: &str) -> AttributionError {
    AttributionError::calculation(contact_id, "contact not found")
}

/// Validates before touching `contact`, so a rejected touchpoint leaves it
/// unchanged.
fn apply_touchpoint(contact: &mut ContactRecord, touchpoint: Touchpoint) -> AttributionResult<()> {
    let touchpoint = touchpoint.normalized()?;
    let contact_id = contact.identity.contact_id.clone();

    if contact
        .touchpoints
        .iter()
        .any(|t| t.touchpoint_id == touchpoint.touchpoint_id)
    {
        return Err(AttributionError::validation(
            "touchpoint_id",
            format!("{} already recorded for contact {contact_id}", touchpoint.touchpoint_id),
        ));
    }

    // Touchpoints may arrive out of order; compare against the history.
    let is_earliest = contact.touchpoints.iter().all(|t| touchpoint.timestamp < t.timestamp);
    let is_latest = contact.touchpoints.iter().all(|t| touchpoint.timestamp >= t.timestamp);

    if is_earliest {
        contact.first_touch = Some(TouchSummary::from(&touchpoint));
    }
    if is_latest {
        contact.last_touch = Some(TouchSummary::from(&touchpoint));
        contact.identity.click_ids.merge_from(&touchpoint.click_ids);
        if touchpoint.partner_id.is_some() {
            contact.partner_id.clone_from(&touchpoint.partner_id);
        }
    } else {
        // Older touch only fills gaps.
        let mut click_ids = touchpoint.click_ids.clone();
        click_ids.merge_from(&contact.identity.click_ids);
        contact.identity.click_ids = click_ids;
        if contact.partner_id.is_none() {
            contact.partner_id.clone_from(&touchpoint.partner_id);
        }
    }

    info!(
        contact_id = %contact_id,
        touchpoint_id = %touchpoint.touchpoint_id,
        "captured touchpoint"
    );
    contact.touchpoints.push(touchpoint);
    Ok(())
}

#[async_trait]
impl TouchpointSource for InMemoryCrm {
    async fn get_touchpoints(&self, contact_id: &str) -> AttributionResult<Vec<Touchpoint>> {
        self.contacts
            .get(contact_id)
            .map(|c| c.touchpoints.clone())
            .ok_or_else(|| not_found(contact_id))
    }
}

#[async_trait]
impl AggregateWriter for InMemoryCrm {
    async fn write_aggregate(
        &self,
        contact_id: &str,
        total_value: f64,
        touchpoint_count: usize,
    ) -> AttributionResult<()> {
        let mut contact = self.contacts.get_mut(contact_id).ok_or_else(|| not_found(contact_id))?;
        contact.attributed_revenue = Some(total_value);
        contact.attributed_touchpoint_count = Some(touchpoint_count);
        contact.attributed_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl IdentitySource for InMemoryCrm {
    async fn get_identity(&self, contact_id: &str) -> AttributionResult<ContactIdentity> {
        self.contacts
            .get(contact_id)
            .map(|c| c.identity.clone())
            .ok_or_else(|| AttributionError::validation("contact_id", format!("unknown contact {contact_id}")))
    }
}
