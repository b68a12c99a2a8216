use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AttributionError, AttributionResult};

const UTM_MAX_LEN: usize = 255;
const CLICK_ID_MAX_LEN: usize = 500;

/// CRM lifecycle stages a contact moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Subscriber,
    Lead,
    MarketingQualifiedLead,
    SalesQualifiedLead,
    Opportunity,
    Customer,
    Evangelist,
    Other,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 8] = [
        LifecycleStage::Subscriber,
        LifecycleStage::Lead,
        LifecycleStage::MarketingQualifiedLead,
        LifecycleStage::SalesQualifiedLead,
        LifecycleStage::Opportunity,
        LifecycleStage::Customer,
        LifecycleStage::Evangelist,
        LifecycleStage::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Subscriber => "subscriber",
            LifecycleStage::Lead => "lead",
            LifecycleStage::MarketingQualifiedLead => "marketingqualifiedlead",
            LifecycleStage::SalesQualifiedLead => "salesqualifiedlead",
            LifecycleStage::Opportunity => "opportunity",
            LifecycleStage::Customer => "customer",
            LifecycleStage::Evangelist => "evangelist",
            LifecycleStage::Other => "other",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStage {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == needle)
            .ok_or_else(|| {
                AttributionError::validation("lifecycle_stage", format!("unknown stage '{s}'"))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchpointType {
    OrganicSearch,
    PaidSearch,
    SocialMedia,
    PaidSocial,
    Email,
    Direct,
    Referral,
    Affiliate,
    Display,
    #[default]
    Other,
}

/// The five credit-splitting models. Wire names are the snake_case forms
/// (`first_touch`, `last_touch`, `linear`, `w_shaped`, `full_path`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModelKind {
    FirstTouch,
    LastTouch,
    Linear,
    WShaped,
    FullPath,
}

impl AttributionModelKind {
    pub const ALL: [AttributionModelKind; 5] = [
        AttributionModelKind::FirstTouch,
        AttributionModelKind::LastTouch,
        AttributionModelKind::Linear,
        AttributionModelKind::WShaped,
        AttributionModelKind::FullPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionModelKind::FirstTouch => "first_touch",
            AttributionModelKind::LastTouch => "last_touch",
            AttributionModelKind::Linear => "linear",
            AttributionModelKind::WShaped => "w_shaped",
            AttributionModelKind::FullPath => "full_path",
        }
    }
}

impl fmt::Display for AttributionModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributionModelKind {
    type Err = AttributionError;

    /// Exact match only; anything else is a client error, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AttributionError::UnknownModel(s.to_string()))
    }
}

/// UTM tracking parameters. Stored trimmed and lowercased; blank values are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
}

impl UtmParameters {
    pub fn normalized(self) -> AttributionResult<Self> {
        let utm = |field: &str, value: Option<String>| {
            normalize_token(field, value, UTM_MAX_LEN, &['_', '-']).map(|v| v.map(|s| s.to_lowercase()))
        };
        Ok(Self {
            utm_source: utm("utm_source", self.utm_source)?,
            utm_medium: utm("utm_medium", self.utm_medium)?,
            utm_campaign: utm("utm_campaign", self.utm_campaign)?,
            utm_term: utm("utm_term", self.utm_term)?,
            utm_content: utm("utm_content", self.utm_content)?,
        })
    }
}

/// Ad-platform click identifiers captured from landing URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickIds {
    /// Google Ads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    /// Facebook Ads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    /// Microsoft Ads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msclkid: Option<String>,
    /// LinkedIn Ads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub li_fat_id: Option<String>,
}

impl ClickIds {
    pub fn normalized(self) -> AttributionResult<Self> {
        let click = |field: &str, value: Option<String>| {
            normalize_token(field, value, CLICK_ID_MAX_LEN, &['_', '-', '.'])
        };
        Ok(Self {
            gclid: click("gclid", self.gclid)?,
            fbclid: click("fbclid", self.fbclid)?,
            msclkid: click("msclkid", self.msclkid)?,
            li_fat_id: click("li_fat_id", self.li_fat_id)?,
        })
    }

    /// Overlay any ids present in `newer` on top of these.
    pub fn merge_from(&mut self, newer: &ClickIds) {
        if newer.gclid.is_some() {
            self.gclid.clone_from(&newer.gclid);
        }
        if newer.fbclid.is_some() {
            self.fbclid.clone_from(&newer.fbclid);
        }
        if newer.msclkid.is_some() {
            self.msclkid.clone_from(&newer.msclkid);
        }
        if newer.li_fat_id.is_some() {
            self.li_fat_id.clone_from(&newer.li_fat_id);
        }
    }
}

fn normalize_token(
    field: &str,
    value: Option<String>,
    max_len: usize,
    extra: &[char],
) -> AttributionResult<Option<String>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > max_len {
        return Err(AttributionError::validation(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || extra.contains(&c))
    {
        return Err(AttributionError::validation(
            field,
            format!("contains characters outside [A-Za-z0-9{}]", extra.iter().collect::<String>()),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

/// A single recorded marketing interaction. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub touchpoint_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub touchpoint_type: TouchpointType,
    #[serde(default)]
    pub utm_parameters: UtmParameters,
    #[serde(default)]
    pub click_ids: ClickIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_stage_at_touch: Option<LifecycleStage>,
}

impl Touchpoint {
    pub fn new(touchpoint_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            touchpoint_id: touchpoint_id.into(),
            timestamp,
            touchpoint_type: TouchpointType::default(),
            utm_parameters: UtmParameters::default(),
            click_ids: ClickIds::default(),
            partner_id: None,
            session_id: None,
            page_url: None,
            referrer_url: None,
            lifecycle_stage_at_touch: None,
        }
    }

    /// Validate identifiers and normalize UTM and click-id values.
    pub fn normalized(mut self) -> AttributionResult<Self> {
        if self.touchpoint_id.trim().is_empty() {
            return Err(AttributionError::validation(
                "touchpoint_id",
                "Touchpoint ID cannot be empty",
            ));
        }
        self.utm_parameters = self.utm_parameters.normalized()?;
        self.click_ids = self.click_ids.normalized()?;
        self.partner_id = self
            .partner_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Ok(self)
    }
}

/// Person-level data used for ad-platform matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactIdentity {
    pub contact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Most recent non-empty click id of each kind.
    #[serde(default)]
    pub click_ids: ClickIds,
}

impl ContactIdentity {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            ..Default::default()
        }
    }
}

/// Per-call context threaded explicitly through `calculate` and `sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub correlation_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one attribution calculation. Build it through
/// [`AttributionRecord::new`], which checks the allocation; the fields are
/// public for serialization and reporting, and the invariant only holds for
/// records that are not modified afterwards.
///
/// Credits are keyed by touchpoint id in a sorted map so that two
/// calculations over the same snapshot serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub contact_id: String,
    pub model: AttributionModelKind,
    pub total_value: f64,
    pub touchpoint_credits: BTreeMap<String, f64>,
    /// Value that could not be attributed because no touchpoints were in range.
    pub unattributed_value: f64,
    pub calculated_at: DateTime<Utc>,
    pub lookback_days: u32,
}

impl AttributionRecord {
    /// Build a record, checking the allocation against the touchpoints it
    /// was computed from. Credits must be non-negative, cover exactly the
    /// input ids, and sum to `total_value` within `tolerance` (relative).
    pub fn new(
        contact_id: &str,
        model: AttributionModelKind,
        total_value: f64,
        touchpoint_credits: BTreeMap<String, f64>,
        touchpoints: &[Touchpoint],
        lookback_days: u32,
        tolerance: f64,
    ) -> AttributionResult<Self> {
        if contact_id.trim().is_empty() {
            return Err(AttributionError::validation("contact_id", "Contact ID cannot be empty"));
        }
        validate_total_value(total_value)?;

        let input_ids: HashSet<&str> = touchpoints.iter().map(|t| t.touchpoint_id.as_str()).collect();
        if input_ids.len() != touchpoints.len() {
            return Err(AttributionError::calculation(contact_id, "duplicate touchpoint ids"));
        }
        if let Some((id, credit)) = touchpoint_credits.iter().find(|(_, c)| !(**c >= 0.0)) {
            return Err(AttributionError::calculation(
                contact_id,
                format!("credit for {id} is negative ({credit})"),
            ));
        }
        if touchpoint_credits.len() != input_ids.len()
            || !touchpoint_credits.keys().all(|id| input_ids.contains(id.as_str()))
        {
            return Err(AttributionError::calculation(
                contact_id,
                "credited touchpoints do not match the input sequence",
            ));
        }

        let allocated: f64 = touchpoint_credits.values().sum();
        let unattributed_value = if touchpoints.is_empty() { total_value } else { 0.0 };
        let expected = total_value - unattributed_value;
        if (allocated - expected).abs() > tolerance * expected.abs().max(1.0) {
            return Err(AttributionError::calculation(
                contact_id,
                format!("allocated {allocated} but expected {expected}"),
            ));
        }

        Ok(Self {
            contact_id: contact_id.to_string(),
            model,
            total_value,
            touchpoint_credits,
            unattributed_value,
            calculated_at: Utc::now(),
            lookback_days,
        })
    }

    pub fn allocated_value(&self) -> f64 {
        self.touchpoint_credits.values().sum()
    }

    /// Ids of touchpoints that received a positive share, in id order.
    pub fn credited_touchpoints(&self) -> Vec<String> {
        self.touchpoint_credits
            .iter()
            .filter(|(_, credit)| **credit > 0.0)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

pub fn validate_total_value(total_value: f64) -> AttributionResult<()> {
    if !total_value.is_finite() || total_value < 0.0 {
        return Err(AttributionError::validation(
            "total_value",
            "Conversion value must be a non-negative number",
        ));
    }
    Ok(())
}
