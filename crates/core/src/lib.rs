pub mod config;
pub mod crm;
pub mod error;
pub mod signals;
pub mod types;

pub use config::AppConfig;
pub use error::{AttributionError, AttributionResult};
