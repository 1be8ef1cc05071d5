//! The `RateExecutor` and its components: fixed-schedule dispatch.
//!
//! The executor separates **timing** (one ticker task) from **work** (one task per
//! request) and **bookkeeping** (one aggregator task), connected by channels:
//!
//! ```text
//! ticker ──ticks──▶ dispatch loop ──spawn──▶ request task ─┐
//!                                            request task ─┼─results─▶ aggregator
//!                                            request task ─┘
//! ```
//!
//! # High-level flow
//! 1. The aggregator task is spawned with the caller's seed aggregate. It is the
//!    only place results are folded, so the aggregate never needs a lock.
//! 2. The ticker task is spawned. It sleeps until `start + pacer.due(n)` and emits
//!    tick `n`, for every `n` whose due offset falls within `duration`. Offsets come
//!    from the fixed start, so a late wake-up never shifts later ticks.
//! 3. The dispatch loop receives ticks and spawns one request task per tick
//!    without waiting for earlier requests. The tick's wall-clock timestamp becomes
//!    the result's timestamp, and latency is measured from the tick, so
//!    `timestamp + latency` is the instant the request completed.
//! 4. When the ticker is done (schedule exhausted or stop signal), its channel
//!    closes and the dispatch loop drops its result sender. Once the last request
//!    task finishes, the result channel closes and the aggregator returns.
//!
//! # Tuning knobs
//! - `max_in_flight`: optional cap on concurrent requests. Request tasks beyond
//!   the cap wait for a slot inside their own task, so neither the ticker nor the
//!   dispatch loop ever blocks. Time spent waiting counts toward latency. A stop
//!   signal resolves the requests still waiting as cancelled. Unbounded by default.
//! - `grace`: how long requests may run once ticking stopped, counted from the
//!   moment the ticker finishes. When it expires, every request still waiting or
//!   in flight resolves as cancelled, so each tick still yields exactly one
//!   result. Unbounded by default; the transport's own timeout then bounds the
//!   drain.
//! - `result_buffer` / `batch_size`: capacity of the result channel and the
//!   maximum number of results folded per aggregator wake-up.
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::Executor;
use crate::{
    aggregate::{aggregator_task, Aggregate},
    error::Error,
    metric::AttackResult,
    pacer::Pacer,
    scenario::Scenario,
    target::{Target, Targeter},
    transport::Transport,
};
use internals::*;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Error recorded for requests cut short by the grace period, or still waiting
/// for an in-flight slot when the attack is stopped.
pub const CANCELLED: &str = "attack cancelled";

/// One authorization to start a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Position in the schedule, starting at 0.
    pub seq: u64,
    /// Instant the tick fired, on the tokio clock.
    pub at: Instant,
    /// Wall-clock time the tick fired.
    pub timestamp: SystemTime,
}

/// Stops a running [`RateExecutor`] from emitting further ticks.
///
/// Requests already in flight drain as usual. Stopping is sticky: an executor
/// that was stopped stops any later run immediately.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Executor that fires one request per tick of a [`Pacer`] for `duration`.
///
/// ```rust
/// use std::time::Duration;
/// use volley::{Rate, RateExecutor};
///
/// let executor = RateExecutor::builder()
///     .pacer(Rate::per_second(100))
///     .duration(Duration::from_secs(30))
///     .grace(Duration::from_secs(5))
///     .build();
/// let stop = executor.stop_handle();
/// # let _ = stop;
/// ```
#[derive(TypedBuilder)]
pub struct RateExecutor<P> {
    /// The schedule of request authorizations.
    pub pacer: P,
    /// Only ticks due strictly before `duration` are emitted.
    pub duration: Duration,
    /// Maximum concurrent requests, unbounded when unset.
    #[builder(default, setter(strip_option(fallback = max_in_flight_opt)))]
    pub max_in_flight: Option<usize>,
    /// Time allowed for outstanding requests after ticking ends.
    #[builder(default, setter(strip_option(fallback = grace_opt)))]
    pub grace: Option<Duration>,
    #[builder(default = 1024)]
    pub result_buffer: usize,
    #[builder(default = 256)]
    pub batch_size: usize,
    #[builder(setter(skip), default = Arc::new(watch::channel(false).0))]
    stop: Arc<watch::Sender<bool>>,
}

impl<P: Pacer> RateExecutor<P> {
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop),
        }
    }
}

impl<P, A, T, X> Executor<A, T, X> for RateExecutor<P>
where
    P: Pacer,
    A: Aggregate<Metric = AttackResult>,
    T: Targeter,
    X: Transport,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<T, X>, aggregate: A) -> Result<A, Error> {
        let (ctx, cancel_tx) = ExecutionContext::new(&scenario.name, self.stop.subscribe());
        let (results_tx, results_rx) = mpsc::channel(self.result_buffer.max(1));
        let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();

        tracing::info!("Spawning aggregator task...");
        let aggregator = tokio::spawn(aggregator_task(results_rx, aggregate, self.batch_size));

        tracing::info!(
            rate = self.pacer.rate(Duration::ZERO),
            duration = ?self.duration,
            "Running attack: {}!",
            scenario.name
        );
        let ticker = tokio::spawn(ticker_task(
            ctx.clone(),
            self.pacer.clone(),
            self.duration,
            ticks_tx,
        ));

        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1))));
        while let Some(tick) = ticks_rx.recv().await {
            let target = scenario.targeter.next_target(tick.seq);
            tokio::spawn(dispatch(
                ctx.clone(),
                tick,
                target,
                scenario.transport.clone(),
                results_tx.clone(),
                limiter.clone(),
            ));
        }

        // The ticker closing its channel means every tick has a request task
        let ticks = ticker.await?;
        drop(results_tx);
        tracing::info!(ticks, "Ticker finished, draining outstanding requests...");

        let mut aggregator = aggregator;
        let aggregate = match self.grace {
            Some(grace) => tokio::select! {
                res = &mut aggregator => res?,
                _ = tokio::time::sleep(grace) => {
                    tracing::warn!(?grace, "Grace period elapsed, cancelling outstanding requests.");
                    cancel_tx.send_replace(true);
                    aggregator.await?
                }
            },
            None => aggregator.await?,
        };

        tracing::info!("Done running attack: {}!", scenario.name);
        Ok(aggregate)
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal components for the `RateExecutor`.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
mod internals {
    use super::*;
    use reqwest::StatusCode;

    /// Shared state for the ticker and every request task of one run.
    #[derive(Clone)]
    pub struct ExecutionContext {
        pub attack: Arc<str>,
        /// Set once ticking must stop.
        pub stop: watch::Receiver<bool>,
        /// Set once in-flight requests must give up.
        pub cancel: watch::Receiver<bool>,
    }

    impl ExecutionContext {
        pub fn new(attack: &str, stop: watch::Receiver<bool>) -> (Self, watch::Sender<bool>) {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            (
                Self {
                    attack: Arc::from(attack),
                    stop,
                    cancel: cancel_rx,
                },
                cancel_tx,
            )
        }
    }

    /// Resolves once `rx` reads `true`. Never resolves if the sender is dropped
    /// without setting it.
    pub async fn signalled(rx: &mut watch::Receiver<bool>) {
        let closed = rx.wait_for(|set| *set).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Emits one tick per due offset of `pacer` within `duration`.
    ///
    /// Completion is signalled by dropping `ticks`. Returns the number of ticks
    /// emitted.
    pub async fn ticker_task<P: Pacer>(
        mut ctx: ExecutionContext,
        pacer: P,
        duration: Duration,
        ticks: mpsc::UnboundedSender<Tick>,
    ) -> u64 {
        let began = Instant::now();
        let mut hits = 0u64;

        let main_task = async {
            while let Some(due) = pacer.due(hits).filter(|due| *due < duration) {
                tokio::time::sleep_until(began + due).await;
                let tick = Tick {
                    seq: hits,
                    at: Instant::now(),
                    timestamp: SystemTime::now(),
                };
                if ticks.send(tick).is_err() {
                    tracing::debug!("Tick receiver dropped.");
                    break;
                }
                hits += 1;
            }
        };

        tokio::select! {
            _ = main_task => {
                tracing::debug!("Ticker emitted every scheduled tick.");
            }
            _ = signalled(&mut ctx.stop) => {
                tracing::info!("Ticker received stop signal.");
            }
        };
        hits
    }

    /// Waits for a slot under `limiter` (if any), sends one request and publishes
    /// its result.
    ///
    /// Latency runs from the tick, so waiting for a slot counts. Transport
    /// failures and cancellation are recorded on the result, never propagated.
    pub async fn dispatch<X: Transport>(
        ctx: ExecutionContext,
        tick: Tick,
        target: Arc<Target>,
        transport: X,
        results: mpsc::Sender<AttackResult>,
        limiter: Option<Arc<Semaphore>>,
    ) {
        let ExecutionContext {
            attack,
            mut stop,
            mut cancel,
        } = ctx;

        let attempt = async {
            let _permit = match &limiter {
                Some(limiter) => tokio::select! {
                    // the limiter is never closed
                    permit = Arc::clone(limiter).acquire_owned() => permit.ok(),
                    _ = signalled(&mut stop) => return Err(CANCELLED.to_string()),
                },
                None => None,
            };
            transport.send(&target).await.map_err(|e| describe(&e))
        };
        let outcome = tokio::select! {
            res = attempt => res,
            _ = signalled(&mut cancel) => Err(CANCELLED.to_string()),
        };
        let latency = tick.at.elapsed();

        let (code, bytes_in, error) = match outcome {
            Ok(response) => (
                response.status,
                response.bytes_in,
                status_error(response.status),
            ),
            Err(error) => (0, 0, Some(error)),
        };

        let result = AttackResult {
            attack: attack.to_string(),
            seq: tick.seq,
            timestamp: tick.timestamp,
            latency,
            code,
            bytes_in,
            bytes_out: target.body.len() as u64,
            error,
            method: target.method.clone(),
            url: target.url.clone(),
        };
        if results.send(result).await.is_err() {
            tracing::warn!(seq = tick.seq, "Aggregator gone, dropping result.");
        }
    }

    /// `"<code> <reason>"` for statuses outside 200..=399.
    pub fn status_error(code: u16) -> Option<String> {
        if (200..400).contains(&code) {
            return None;
        }
        let reason = StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason());
        Some(match reason {
            Some(reason) => format!("{code} {reason}"),
            None => code.to_string(),
        })
    }

    /// An error message including its chain of sources.
    pub fn describe(err: &dyn std::error::Error) -> String {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let cause_msg = cause.to_string();
            if !message.contains(&cause_msg) {
                message.push_str(": ");
                message.push_str(&cause_msg);
            }
            source = cause.source();
        }
        message
    }
}
