use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::Debug,
    time::{Duration, SystemTime},
};
use volley_macros::metric;

/// A `Metric` is a single observation produced by one dispatched request.
///
/// Metrics are the most granular data in a run. The executor produces one per tick
/// and moves it into an [`crate::Aggregate`], which folds it into running totals;
/// a [`crate::Report`] later derives the final statistics from those totals.
///
/// Metrics are handed over by value, so a given observation can be folded only
/// once by the aggregator that received it.
pub trait Metric
where
    Self: Serialize + DeserializeOwned + PartialEq + Send + Sync + Debug + Clone + 'static,
{
}

/// The outcome of one dispatched request.
///
/// `timestamp` is the instant the scheduler authorized the request, so results
/// line up with the pacing schedule even when dispatch itself was delayed.
/// `latency` covers the transport call alone. A request that never produced a
/// response has `code == 0` and carries the transport error.
#[metric]
pub struct AttackResult {
    /// Name of the attack this result belongs to.
    pub attack: String,
    /// Tick sequence number, unique within one attack.
    pub seq: u64,
    pub timestamp: SystemTime,
    pub latency: Duration,
    /// HTTP status code, `0` when no response was received.
    pub code: u16,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub error: Option<String>,
    pub method: String,
    pub url: String,
}

impl AttackResult {
    /// Instant the request completed.
    pub fn end(&self) -> SystemTime {
        self.timestamp + self.latency
    }
}
