use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use volley::{
    AttackReport, Config, HttpTransport, JsonReporter, LogReporter, Metrics, Pacer, RateExecutor,
    ReportFormat, Reporter, Scenario, StaticTargeter, TextReporter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::parse();

    let scenario = Scenario::builder()
        .name(config.attack_name.as_str())
        .targeter(StaticTargeter::new(config.target().await?))
        .transport(config.http().transport()?)
        .build();

    let metrics = match config.linear_pacer()? {
        Some(pacer) => attack(&config, &scenario, pacer).await?,
        None => {
            let rate = config.rate()?;
            info!(
                expected_requests = rate.hits_within(config.duration()),
                "Constant rate schedule"
            );
            attack(&config, &scenario, rate).await?
        }
    };

    let report = AttackReport::from(metrics);
    match config.report_format {
        ReportFormat::Log => LogReporter.report(&report).await?,
        ReportFormat::Json => JsonReporter.report(&report).await?,
        ReportFormat::Text => TextReporter.report(&report).await?,
    }
    Ok(())
}

async fn attack<P: Pacer>(
    config: &Config,
    scenario: &Scenario<StaticTargeter, HttpTransport>,
    pacer: P,
) -> volley::Result<Metrics> {
    let executor = RateExecutor::builder()
        .pacer(pacer)
        .duration(config.duration())
        .max_in_flight_opt(config.max_in_flight)
        .grace_opt(config.grace())
        .build();

    let stop = executor.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping attack.");
            stop.stop();
        }
    });

    info!(
        rate = config.rate,
        duration = config.duration,
        "Starting attacker"
    );
    scenario.run(&executor, Metrics::default()).await
}
