use super::{AttackReport, Reporter};
use crate::{aggregate::Metrics, error::Result};

/// Emits the report as one structured `tracing` event.
///
/// Each latency statistic is its own `latencies.<stat>` field, rendered as a
/// human readable duration. `status_codes` and `errors` have keys only known at
/// runtime, so they are recorded as JSON object strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter<Metrics, AttackReport> for LogReporter {
    async fn report(&self, report: &AttackReport) -> Result<()> {
        let status_codes = serde_json::to_string(&report.status_codes)?;
        let errors = serde_json::to_string(&report.errors)?;
        let latencies = &report.latencies;

        tracing::info!(
            requests = report.requests,
            request_rate = report.rate,
            request_throughput = report.throughput,
            "success[%]" = report.success,
            latencies.mean = ?latencies.mean,
            latencies.p50 = ?latencies.p50,
            latencies.p90 = ?latencies.p90,
            latencies.p95 = ?latencies.p95,
            latencies.p99 = ?latencies.p99,
            latencies.max = ?latencies.max,
            latencies.min = ?latencies.min,
            status_codes = %status_codes,
            errors = %errors,
            "Finished attack"
        );
        Ok(())
    }
}

/// Prints the report as a single JSON document on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter<Metrics, AttackReport> for JsonReporter {
    async fn report(&self, report: &AttackReport) -> Result<()> {
        let value = serde_json::to_string(report)?;
        println!("{value}");
        Ok(())
    }
}

/// Prints the report as a text table on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReporter;

impl Reporter<Metrics, AttackReport> for TextReporter {
    async fn report(&self, report: &AttackReport) -> Result<()> {
        print!("{report}");
        Ok(())
    }
}
