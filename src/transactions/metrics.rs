use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Metrics for a [`ChainDispatcher`](crate::transactions::ChainDispatcher).
#[derive(Metrics)]
#[metrics(scope = "dispatcher")]
pub struct DispatcherMetrics {
    /// Number of sent transactions.
    pub sent: Counter,
    /// Number of failed transactions.
    pub failed: Counter,
    /// Number of transactions rejected because of a nonce conflict.
    pub nonce_conflicts: Counter,
    /// Number of transactions that timed out.
    pub timeouts: Counter,
    /// Time it takes to submit a transaction, in milliseconds.
    pub submission_time: Histogram,
}
