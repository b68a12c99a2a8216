//! Contracts for the CRM collaborator. The engine reads touchpoints and
//! writes aggregates through these; signaling reads contact identity.

use async_trait::async_trait;

use crate::error::AttributionResult;
use crate::types::{ContactIdentity, Touchpoint};

/// Fetches a contact's recorded touchpoints (any order).
#[async_trait]
pub trait TouchpointSource: Send + Sync {
    async fn get_touchpoints(&self, contact_id: &str) -> AttributionResult<Vec<Touchpoint>>;
}

/// Persists the attributed value back onto the contact record.
#[async_trait]
pub trait AggregateWriter: Send + Sync {
    async fn write_aggregate(
        &self,
        contact_id: &str,
        total_value: f64,
        touchpoint_count: usize,
    ) -> AttributionResult<()>;
}

/// Person-level matching data and contact-level click ids.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn get_identity(&self, contact_id: &str) -> AttributionResult<ContactIdentity>;
}
