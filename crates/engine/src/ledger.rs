//! Attribution ledger: keeps every computed record per contact. Records
//! are never merged; readers pick the most recent one for a model.

use std::collections::BTreeMap;

use attribution_core::types::{AttributionModelKind, AttributionRecord};
use dashmap::DashMap;

pub struct AttributionLedger {
    records: DashMap<String, Vec<AttributionRecord>>,
}

impl AttributionLedger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn record(&self, record: AttributionRecord) {
        self.records
            .entry(record.contact_id.clone())
            .or_default()
            .push(record);
    }

    pub fn records_for(&self, contact_id: &str) -> Vec<AttributionRecord> {
        self.records
            .get(contact_id)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Most recent record for `model` by calculation time. Later insertions
    /// win ties.
    pub fn latest(&self, contact_id: &str, model: AttributionModelKind) -> Option<AttributionRecord> {
        self.records.get(contact_id).and_then(|records| {
            records
                .iter()
                .filter(|r| r.model == model)
                .max_by_key(|r| r.calculated_at)
                .cloned()
        })
    }

    pub fn latest_by_model(&self, contact_id: &str) -> BTreeMap<AttributionModelKind, AttributionRecord> {
        let mut latest = BTreeMap::new();
        for record in self.records_for(contact_id) {
            match latest.get(&record.model) {
                Some(existing) if existing_is_newer(existing, &record) => {}
                _ => {
                    latest.insert(record.model, record);
                }
            }
        }
        latest
    }
}

fn existing_is_newer(existing: &AttributionRecord, candidate: &AttributionRecord) -> bool {
    existing.calculated_at > candidate.calculated_at
}

impl Default for AttributionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(contact: &str, model: AttributionModelKind, value: f64, minutes_ago: i64) -> AttributionRecord {
        let mut r = AttributionRecord::new(
            contact,
            model,
            value,
            BTreeMap::new(),
            &[],
            90,
            1e-6,
        )
        .unwrap();
        r.calculated_at = Utc::now() - Duration::minutes(minutes_ago);
        r
    }

    #[test]
    fn test_latest_selects_most_recent_per_model() {
        let ledger = AttributionLedger::new();
        ledger.record(record("c-1", AttributionModelKind::Linear, 100.0, 30));
        ledger.record(record("c-1", AttributionModelKind::Linear, 200.0, 5));
        ledger.record(record("c-1", AttributionModelKind::Linear, 150.0, 10));
        ledger.record(record("c-1", AttributionModelKind::WShaped, 999.0, 1));

        let latest = ledger.latest("c-1", AttributionModelKind::Linear).unwrap();
        assert_eq!(latest.total_value, 200.0);
        assert!(ledger.latest("c-1", AttributionModelKind::FullPath).is_none());
        assert!(ledger.latest("c-2", AttributionModelKind::Linear).is_none());
        assert_eq!(ledger.records_for("c-1").len(), 4);
    }

    #[test]
    fn test_latest_by_model() {
        let ledger = AttributionLedger::new();
        ledger.record(record("c-1", AttributionModelKind::FirstTouch, 10.0, 20));
        ledger.record(record("c-1", AttributionModelKind::FirstTouch, 20.0, 2));
        ledger.record(record("c-1", AttributionModelKind::LastTouch, 30.0, 7));

        let latest = ledger.latest_by_model("c-1");
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&AttributionModelKind::FirstTouch].total_value, 20.0);
        assert_eq!(latest[&AttributionModelKind::LastTouch].total_value, 30.0);
    }
}
