use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    time::{Duration, SystemTime},
};
use tokio::sync::mpsc;
use volley_macros::aggregate;

use crate::metric::{AttackResult, Metric};

/// The `Aggregate` trait defines how raw [`Metric`] values are collected and combined
/// into an intermediate, mergeable representation that preserves the information
/// needed for later analysis.
///
/// Aggregates store raw data only (counts, sums, histograms, samples). Derived values
/// such as averages or percentiles belong in a [`crate::Report`], which is built by
/// consuming the aggregate once the run has drained.
///
/// # Implementor notes
/// - `consume` takes the metric by value: every observation is folded exactly once.
/// - `merge` must be **associative** and **commutative**, and folding must not depend
///   on arrival order, since responses race each other.
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialEq + Send + Sync + Debug + Clone + 'static,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Fold a batch of metrics into the current instance.
    fn aggregate<I>(&mut self, metrics: I)
    where
        I: IntoIterator<Item = Self::Metric>,
    {
        metrics.into_iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// The single intake point for results.
///
/// Folds everything received on `rx` into `agg`, draining whatever is already queued
/// (up to `batch_size`) after each wake-up. Returns once every sender has been
/// dropped, which is the drain condition of a run.
pub async fn aggregator_task<A: Aggregate>(
    mut rx: mpsc::Receiver<A::Metric>,
    mut agg: A,
    batch_size: usize,
) -> A {
    let batch_size = batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);

    // `recv_many` returns 0 only once the channel is closed and empty
    while rx.recv_many(&mut batch, batch_size).await > 0 {
        agg.aggregate(batch.drain(..));
    }
    tracing::debug!("Result channel closed, aggregation complete.");
    agg
}

/// Status codes counted as successful, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessCodes {
    pub min: u16,
    pub max: u16,
}

impl SuccessCodes {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, code: u16) -> bool {
        (self.min..=self.max).contains(&code)
    }
}

impl Default for SuccessCodes {
    fn default() -> Self {
        Self::new(200, 299)
    }
}

/// Running totals for an HTTP attack.
///
/// Every latency sample is retained so percentiles can be computed exactly at
/// finalization. Hundreds to low thousands of requests per second over minutes
/// fits comfortably in memory; very long runs would want a mergeable sketch
/// instead.
///
/// A result counts as a success when its status code is within `success_codes`
/// and it carries no error.
#[aggregate]
pub struct Metrics {
    pub requests: u64,
    pub successes: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub total_latency: Duration,
    /// Unsorted, in arrival order.
    pub latencies: Vec<Duration>,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
    /// Earliest authorization time.
    pub earliest: Option<SystemTime>,
    /// Latest authorization time.
    pub latest: Option<SystemTime>,
    /// Latest completion time.
    pub end: Option<SystemTime>,
    pub success_codes: SuccessCodes,
}

impl Metrics {
    pub fn with_success_codes(success_codes: SuccessCodes) -> Self {
        Self {
            success_codes,
            ..Self::new()
        }
    }

    pub fn is_success(&self, result: &AttackResult) -> bool {
        result.error.is_none() && self.success_codes.contains(result.code)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            requests: 0,
            successes: 0,
            bytes_in: 0,
            bytes_out: 0,
            total_latency: Duration::ZERO,
            latencies: Vec::new(),
            status_codes: BTreeMap::new(),
            errors: BTreeMap::new(),
            earliest: None,
            latest: None,
            end: None,
            success_codes: SuccessCodes::default(),
        }
    }
}

impl Aggregate for Metrics {
    type Metric = AttackResult;

    fn new() -> Self {
        Metrics::default()
    }

    fn consume(&mut self, result: AttackResult) {
        if self.is_success(&result) {
            self.successes += 1;
        }
        self.requests += 1;
        self.bytes_in += result.bytes_in;
        self.bytes_out += result.bytes_out;
        self.total_latency += result.latency;
        self.latencies.push(result.latency);
        *self.status_codes.entry(result.code).or_default() += 1;

        let end = result.end();
        self.earliest = min_time(self.earliest, Some(result.timestamp));
        self.latest = max_time(self.latest, Some(result.timestamp));
        self.end = max_time(self.end, Some(end));

        if let Some(error) = result.error {
            *self.errors.entry(error).or_default() += 1;
        }
    }

    fn merge(&mut self, other: Self) {
        self.requests += other.requests;
        self.successes += other.successes;
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
        self.total_latency += other.total_latency;
        self.latencies.extend(other.latencies);
        for (code, count) in other.status_codes {
            *self.status_codes.entry(code).or_default() += count;
        }
        for (error, count) in other.errors {
            *self.errors.entry(error).or_default() += count;
        }
        self.earliest = min_time(self.earliest, other.earliest);
        self.latest = max_time(self.latest, other.latest);
        self.end = max_time(self.end, other.end);
    }
}

fn min_time(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_time(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
