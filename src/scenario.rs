use typed_builder::TypedBuilder;

use crate::{
    aggregate::Aggregate, executor::Executor, metric::AttackResult, target::Targeter,
    transport::Transport,
};

/// What to attack and how to reach it.
///
/// A scenario pairs a [`Targeter`], which supplies the request for each tick,
/// with the [`Transport`] that sends it. Pacing belongs to the [`Executor`].
///
/// ```rust,no_run
/// use std::time::Duration;
/// use volley::{
///     AttackReport, HttpConfig, Metrics, Rate, RateExecutor, Scenario, StaticTargeter, Target,
/// };
///
/// # async fn run() -> Result<(), volley::Error> {
/// let target = Target::builder().url("http://localhost:3000").build();
/// let scenario = Scenario::builder()
///     .name("smoke")
///     .targeter(StaticTargeter::new(target))
///     .transport(HttpConfig::builder().build().transport()?)
///     .build();
///
/// let executor = RateExecutor::builder()
///     .pacer(Rate::per_second(50))
///     .duration(Duration::from_secs(10))
///     .build();
///
/// let metrics = scenario.run(&executor, Metrics::default()).await?;
/// let report = AttackReport::from(metrics);
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario<T, X> {
    #[builder(default = String::from("Attack"), setter(into))]
    pub name: String,
    pub targeter: T,
    pub transport: X,
}

impl<T, X> Scenario<T, X>
where
    T: Targeter,
    X: Transport,
{
    /// Run this scenario on `executor`, folding results into `aggregate`.
    pub async fn run<A, E>(&self, executor: &E, aggregate: A) -> Result<A, E::Error>
    where
        A: Aggregate<Metric = AttackResult>,
        E: Executor<A, T, X>,
    {
        executor.exec(self, aggregate).await
    }
}
