//! Executor: orchestration of pacing, dispatch and aggregation.
//!
//! The [`Executor`] trait is the runtime that runs a [`Scenario`]. The built-in
//! [`RateExecutor`] fires requests on a fixed schedule given by a
//! [`crate::Pacer`], independent of how long individual requests take.
pub mod rate;
pub use rate::{RateExecutor, StopHandle, Tick};

use crate::{
    aggregate::Aggregate, metric::AttackResult, scenario::Scenario, target::Targeter,
    transport::Transport,
};
use std::future::Future;

/// The runtime hook that executes a [`Scenario`].
///
/// An executor owns the execution strategy: how requests are scheduled, how
/// many may be in flight, and when the run is over. It folds every
/// [`AttackResult`] into the supplied aggregate and returns it once no further
/// result can arrive.
pub trait Executor<A, T, X>
where
    Self: Send + Sync + Sized,
    A: Aggregate<Metric = AttackResult>,
    T: Targeter,
    X: Transport,
{
    type Error;

    /// Run the scenario, folding every result into `aggregate`.
    ///
    /// Returns only after the run has drained, so the aggregate handed back is
    /// final and safe to turn into a [`crate::Report`].
    fn exec(
        &self,
        scenario: &Scenario<T, X>,
        aggregate: A,
    ) -> impl Future<Output = Result<A, Self::Error>> + Send;
}
