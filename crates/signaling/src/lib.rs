pub mod dispatcher;
pub mod rate_limit;
pub mod retry;
pub mod senders;
pub mod taxonomy;
pub mod transport;

pub use dispatcher::SyncDispatcher;
pub use rate_limit::PlatformRateLimiter;
pub use senders::{ConversionRequest, PlatformReceipt, PlatformSender, MAX_BATCH_SIZE};
pub use transport::{ConversionTransport, DryRunTransport};
