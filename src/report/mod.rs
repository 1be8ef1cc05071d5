//! Reports and reporters.
//!
//! A [`Report`] is the finalized form of an [`Aggregate`]: it consumes the aggregate
//! and derives averages, percentiles and ratios from it. Because the aggregate is
//! taken by value, and the executor only hands it out after the run has drained, no
//! result can be folded into a report after it was computed.
//!
//! A [`Reporter`] is the I/O boundary that sends a finished report somewhere.
mod reporters;

pub use reporters::{JsonReporter, LogReporter, TextReporter};

use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    future::Future,
    time::{Duration, SystemTime},
};
use volley_macros::report;

use crate::{aggregate::Metrics, error::Result, Aggregate};

/// The processed, immutable form of an [`Aggregate`].
///
/// Reports are pure data: constructing one performs no I/O.
pub trait Report<A>
where
    Self: Send + Sync + Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// Consumes a [`Report`] and performs side effects: displaying it, logging it, or
/// exporting it.
pub trait Reporter<A: Aggregate, R: Report<A>> {
    fn report(&self, report: &R) -> impl Future<Output = Result<()>>;
}

/// Summary of an HTTP attack.
///
/// - `duration` spans the earliest to the latest authorization time and `wait` is
///   the time from the latest authorization to the last completion.
/// - `rate` is the observed request rate over `duration`; `throughput` counts only
///   successful requests over `duration + wait`.
/// - `success` is a ratio in `[0, 1]`.
///
/// Every field is zero or empty when no request was made.
#[report]
pub struct AttackReport {
    pub requests: u64,
    pub rate: f64,
    pub throughput: f64,
    pub success: f64,
    #[serde(with = "nanos")]
    pub duration: Duration,
    #[serde(with = "nanos")]
    pub wait: Duration,
    pub latencies: LatencyMetrics,
    pub bytes_in: ByteMetrics,
    pub bytes_out: ByteMetrics,
    pub earliest: Option<SystemTime>,
    pub latest: Option<SystemTime>,
    pub end: Option<SystemTime>,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
}

impl Report<Metrics> for AttackReport {}

impl From<Metrics> for AttackReport {
    fn from(metrics: Metrics) -> Self {
        let duration = span(metrics.earliest, metrics.latest);
        let wait = span(metrics.latest, metrics.end);

        Self {
            requests: metrics.requests,
            rate: per_second(metrics.requests, duration),
            throughput: per_second(metrics.successes, duration + wait),
            success: ratio(metrics.successes, metrics.requests),
            duration,
            wait,
            latencies: LatencyMetrics::from_samples(metrics.latencies, metrics.total_latency),
            bytes_in: ByteMetrics::new(metrics.bytes_in, metrics.requests),
            bytes_out: ByteMetrics::new(metrics.bytes_out, metrics.requests),
            earliest: metrics.earliest,
            latest: metrics.latest,
            end: metrics.end,
            status_codes: metrics.status_codes,
            errors: metrics.errors,
        }
    }
}

/// Latency statistics over every sample of a run.
///
/// Percentiles use the nearest-rank method: for `n` sorted samples, the p-th
/// percentile is the sample at rank `ceil(p * n)`.
#[report]
#[derive(Default)]
pub struct LatencyMetrics {
    #[serde(with = "nanos")]
    pub total: Duration,
    #[serde(with = "nanos")]
    pub mean: Duration,
    #[serde(rename = "50th", with = "nanos")]
    pub p50: Duration,
    #[serde(rename = "90th", with = "nanos")]
    pub p90: Duration,
    #[serde(rename = "95th", with = "nanos")]
    pub p95: Duration,
    #[serde(rename = "99th", with = "nanos")]
    pub p99: Duration,
    #[serde(with = "nanos")]
    pub max: Duration,
    #[serde(with = "nanos")]
    pub min: Duration,
}

impl LatencyMetrics {
    pub fn from_samples(mut samples: Vec<Duration>, total: Duration) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();
        let mean = total.as_nanos() / samples.len() as u128;

        Self {
            total,
            mean: Duration::from_nanos(mean.min(u64::MAX as u128) as u64),
            p50: nearest_rank(&samples, 500),
            p90: nearest_rank(&samples, 900),
            p95: nearest_rank(&samples, 950),
            p99: nearest_rank(&samples, 990),
            max: samples[samples.len() - 1],
            min: samples[0],
        }
    }
}

/// Nearest-rank percentile of ascending `sorted` samples, with the percentile
/// given in per-mille (`990` is p99). Integer arithmetic keeps ranks exact.
pub fn nearest_rank(sorted: &[Duration], per_mille: u64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len() as u64;
    let rank = (n * per_mille.min(1000)).div_ceil(1000).clamp(1, n);
    sorted[(rank - 1) as usize]
}

#[report]
#[derive(Default)]
pub struct ByteMetrics {
    pub total: u64,
    pub mean: f64,
}

impl ByteMetrics {
    fn new(total: u64, requests: u64) -> Self {
        Self {
            total,
            mean: ratio(total, requests),
        }
    }
}

fn span(from: Option<SystemTime>, to: Option<SystemTime>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.duration_since(from).unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl fmt::Display for AttackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.latencies;
        writeln!(
            f,
            "Requests      [total, rate, throughput]         {}, {:.2}, {:.2}",
            self.requests, self.rate, self.throughput
        )?;
        writeln!(
            f,
            "Duration      [total, attack, wait]             {:?}, {:?}, {:?}",
            self.duration + self.wait,
            self.duration,
            self.wait
        )?;
        writeln!(
            f,
            "Latencies     [min, mean, 50, 90, 95, 99, max]  {:?}, {:?}, {:?}, {:?}, {:?}, {:?}, {:?}",
            l.min, l.mean, l.p50, l.p90, l.p95, l.p99, l.max
        )?;
        writeln!(
            f,
            "Bytes In      [total, mean]                     {}, {:.2}",
            self.bytes_in.total, self.bytes_in.mean
        )?;
        writeln!(
            f,
            "Bytes Out     [total, mean]                     {}, {:.2}",
            self.bytes_out.total, self.bytes_out.mean
        )?;
        writeln!(
            f,
            "Success       [ratio]                           {:.2}%",
            self.success * 100.0
        )?;
        let codes: Vec<String> = self
            .status_codes
            .iter()
            .map(|(code, count)| format!("{code}:{count}"))
            .collect();
        writeln!(
            f,
            "Status Codes  [code:count]                      {}",
            codes.join("  ")
        )?;
        writeln!(f, "Error Set:")?;
        for (error, count) in &self.errors {
            writeln!(f, "{error} ({count})")?;
        }
        Ok(())
    }
}

/// Durations as integer nanoseconds.
mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{failed, result};
    use std::time::UNIX_EPOCH;

    /// Ten successful results authorized 100ms apart with latencies 10ms..100ms.
    fn ten_results() -> Vec<crate::AttackResult> {
        (0..10).map(|i| result(i, (i + 1) * 10, 200)).collect()
    }

    fn fold(results: impl IntoIterator<Item = crate::AttackResult>) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.aggregate(results);
        metrics
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    mod nearest_rank {
        use super::*;

        #[test]
        fn known_samples() {
            let samples: Vec<_> = (1..=10).map(|i| ms(i * 10)).collect();
            assert_eq!(nearest_rank(&samples, 500), ms(50));
            assert_eq!(nearest_rank(&samples, 900), ms(90));
            assert_eq!(nearest_rank(&samples, 950), ms(100));
            assert_eq!(nearest_rank(&samples, 990), ms(100));
            assert_eq!(nearest_rank(&samples, 0), ms(10));
            assert_eq!(nearest_rank(&samples, 1000), ms(100));
        }

        #[test]
        fn hundred_samples_hit_exact_ranks() {
            let samples: Vec<_> = (1..=100).map(ms).collect();
            assert_eq!(nearest_rank(&samples, 500), ms(50));
            assert_eq!(nearest_rank(&samples, 950), ms(95));
            assert_eq!(nearest_rank(&samples, 990), ms(99));
        }

        #[test]
        fn single_sample() {
            assert_eq!(nearest_rank(&[ms(7)], 990), ms(7));
        }

        #[test]
        fn empty_is_zero() {
            assert_eq!(nearest_rank(&[], 500), Duration::ZERO);
        }
    }

    mod finalize {
        use super::*;

        #[test]
        fn latency_statistics() {
            let report = AttackReport::from(fold(ten_results()));
            let l = &report.latencies;
            assert_eq!(l.total, ms(550));
            assert_eq!(l.mean, ms(55));
            assert_eq!(l.p50, ms(50));
            assert_eq!(l.p90, ms(90));
            assert_eq!(l.p95, ms(100));
            assert_eq!(l.p99, ms(100));
            assert_eq!(l.min, ms(10));
            assert_eq!(l.max, ms(100));
        }

        #[test]
        fn rate_throughput_and_window() {
            let report = AttackReport::from(fold(ten_results()));
            assert_eq!(report.requests, 10);
            assert_eq!(report.duration, ms(900));
            assert_eq!(report.wait, ms(100));
            assert!((report.rate - 10.0 / 0.9).abs() < 1e-9);
            assert!((report.throughput - 10.0).abs() < 1e-9);
            assert_eq!(report.success, 1.0);
            assert_eq!(report.earliest, Some(UNIX_EPOCH));
            assert_eq!(report.end, Some(UNIX_EPOCH + ms(1000)));
            assert_eq!(report.bytes_in.total, 100);
            assert_eq!(report.bytes_in.mean, 10.0);
            assert_eq!(report.bytes_out.mean, 3.0);
        }

        #[test]
        fn failures_count_against_success_and_throughput() {
            let mut results = ten_results();
            results.push(failed(10, "connection refused"));
            results.push(result(11, 10, 503));
            let report = AttackReport::from(fold(results));

            assert_eq!(report.requests, 12);
            assert!((report.success - 10.0 / 12.0).abs() < 1e-12);
            assert_eq!(report.status_codes[&200], 10);
            assert_eq!(report.status_codes[&503], 1);
            assert_eq!(report.status_codes[&0], 1);
            assert_eq!(report.errors["connection refused"], 1);
            // 11 * 100ms of attack, last completion at 1110ms
            assert_eq!(report.duration, ms(1100));
            assert!((report.throughput - 10.0 / 1.11).abs() < 1e-9);
        }

        #[test]
        fn zero_requests_yield_zeroed_report() {
            let report = AttackReport::from(Metrics::new());
            assert_eq!(report.requests, 0);
            assert_eq!(report.rate, 0.0);
            assert_eq!(report.throughput, 0.0);
            assert_eq!(report.success, 0.0);
            assert_eq!(report.duration, Duration::ZERO);
            assert_eq!(report.latencies, LatencyMetrics::default());
            assert_eq!(report.bytes_in.mean, 0.0);
            assert!(report.status_codes.is_empty());
            assert!(report.errors.is_empty());
            assert!(report.earliest.is_none());
        }

        #[test]
        fn single_request_has_no_observable_rate() {
            let report = AttackReport::from(fold([result(0, 20, 200)]));
            assert_eq!(report.rate, 0.0);
            assert_eq!(report.wait, ms(20));
            assert!((report.throughput - 50.0).abs() < 1e-9);
        }

        #[test]
        fn arrival_order_does_not_matter() {
            let forward = AttackReport::from(fold(ten_results()));
            let reverse = AttackReport::from(fold(ten_results().into_iter().rev()));
            assert_eq!(forward, reverse);

            let mut shuffled = ten_results();
            shuffled.swap(0, 7);
            shuffled.swap(3, 9);
            assert_eq!(forward, AttackReport::from(fold(shuffled)));
        }
    }

    mod render {
        use super::*;

        #[test]
        fn json_uses_nanoseconds_and_percentile_keys() {
            let report = AttackReport::from(fold(ten_results()));
            let value = serde_json::to_value(&report).unwrap();
            assert_eq!(value["requests"], 10);
            assert_eq!(value["latencies"]["50th"], 50_000_000);
            assert_eq!(value["latencies"]["99th"], 100_000_000);
            assert_eq!(value["duration"], 900_000_000);
            assert_eq!(value["status_codes"]["200"], 10);
        }

        #[test]
        fn text_table() {
            let mut results = ten_results();
            results.push(failed(10, "timeout"));
            let text = AttackReport::from(fold(results)).to_string();

            assert!(text.starts_with("Requests      [total, rate, throughput]         11, "));
            assert!(text.contains("Latencies     [min, mean, 50, 90, 95, 99, max]  5ms, "));
            assert!(text.contains("Status Codes  [code:count]                      0:1  200:10"));
            assert!(text.contains("Error Set:\ntimeout (1)\n"));
        }
    }
}
