//! Volley: a constant-rate HTTP load generator.
//!
//! Volley fires requests on a fixed schedule for a fixed duration, no matter how
//! slowly the target answers, and summarizes every outcome into one report. The
//! schedule is the point: because new requests never wait for earlier responses,
//! the measured latencies are not distorted by coordinated omission.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`Scenario`]: what to attack. Pairs a [`Targeter`] (which request to send)
//!   with a [`Transport`] (how to send it).
//! - [`Executor`]: how to run it. The built-in [`RateExecutor`] drives a [`Pacer`]
//!   such as [`Rate`] or [`LinearPacer`], spawns one task per tick, and returns
//!   once every request has resolved.
//! - [`Metric`]: the outcome of a single request ([`AttackResult`]).
//! - [`Aggregate`]: folds metrics into mergeable totals ([`Metrics`]).
//! - [`Report`]: derived statistics computed from a drained aggregate
//!   ([`AttackReport`]).
//! - [`Reporter`]: sends a report somewhere ([`LogReporter`], [`JsonReporter`],
//!   [`TextReporter`]).
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use volley::{
//!     AttackReport, HttpConfig, LogReporter, Metrics, Rate, RateExecutor, Reporter, Scenario,
//!     StaticTargeter, Target,
//! };
//!
//! # async fn run() -> Result<(), volley::Error> {
//! let scenario = Scenario::builder()
//!     .targeter(StaticTargeter::new(Target::builder().url("http://localhost:3000").build()))
//!     .transport(HttpConfig::builder().build().transport()?)
//!     .build();
//! let executor = RateExecutor::builder()
//!     .pacer(Rate::per_second(100))
//!     .duration(Duration::from_secs(30))
//!     .build();
//!
//! let metrics = scenario.run(&executor, Metrics::default()).await?;
//! LogReporter.report(&AttackReport::from(metrics)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//! - `macros` (default): re-export the `#[metric]`, `#[aggregate]` and `#[report]`
//!   attribute macros under [`macros`].
//! - `internals`: expose the executor's building blocks (ticker, dispatch). Unstable.

/// Metric aggregators
pub mod aggregate;
/// Binary configuration
pub mod config;
pub mod error;
/// Orchestrators that define how an attack actually runs
pub mod executor;
/// Single request outcomes
pub mod metric;
pub mod pacer;
/// Reports and Reporters
pub mod report;
/// Glue between what is attacked and how
pub mod scenario;
pub mod target;
pub mod transport;

pub use aggregate::{aggregator_task, Aggregate, Metrics, SuccessCodes};
pub use config::{Config, ReportFormat};
pub use error::{Error, Result, TransportError};
pub use executor::{Executor, RateExecutor, StopHandle, Tick};
pub use metric::{AttackResult, Metric};
pub use pacer::{LinearPacer, Pacer, Rate};
pub use report::{
    AttackReport, ByteMetrics, JsonReporter, LatencyMetrics, LogReporter, Report, Reporter,
    TextReporter,
};
pub use scenario::Scenario;
pub use target::{StaticTargeter, Target, Targeter};
pub use transport::{HttpConfig, HttpTransport, Response, Transport};

#[cfg(feature = "macros")]
pub mod macros {
    pub use volley_macros::*;
}
