//! Per-contact attribution report.

use std::collections::BTreeMap;

use attribution_core::types::{AttributionModelKind, AttributionRecord, LifecycleStage};
use serde::{Deserialize, Serialize};

use crate::crm::{ContactRecord, TouchSummary};
use crate::ledger::AttributionLedger;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactAttributionReport {
    pub contact_id: String,
    pub email: Option<String>,
    pub lifecycle_stage: LifecycleStage,
    pub total_touchpoints: usize,
    pub first_touch: Option<TouchSummary>,
    pub last_touch: Option<TouchSummary>,
    pub partner_id: Option<String>,
    /// Value from the last CRM write-back.
    pub attributed_revenue: Option<f64>,
    /// Omitted when nothing has been calculated for the contact.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub latest_by_model: BTreeMap<AttributionModelKind, AttributionRecord>,
}

impl ContactAttributionReport {
    pub fn build(contact: &ContactRecord, ledger: &AttributionLedger) -> Self {
        let contact_id = contact.identity.contact_id.clone();
        Self {
            latest_by_model: ledger.latest_by_model(&contact_id),
            contact_id,
            email: contact.identity.email.clone(),
            lifecycle_stage: contact.lifecycle_stage,
            total_touchpoints: contact.touchpoints.len(),
            first_touch: contact.first_touch.clone(),
            last_touch: contact.last_touch.clone(),
            partner_id: contact.partner_id.clone(),
            attributed_revenue: contact.attributed_revenue,
        }
    }
}
