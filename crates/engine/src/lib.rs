//! Multi-touch attribution: credit allocation across a contact's
//! touchpoints, CRM write-back, and per-contact reporting.

pub mod calculator;
pub mod crm;
pub mod ledger;
pub mod orchestrator;
pub mod report;

pub use crm::InMemoryCrm;
pub use ledger::AttributionLedger;
pub use orchestrator::AttributionOrchestrator;
pub use report::ContactAttributionReport;
