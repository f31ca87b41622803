//! Submission of transfers from the funding wallet.

mod dispatcher;
pub use dispatcher::*;
mod metrics;
pub use self::metrics::DispatcherMetrics;
