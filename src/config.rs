use std::{path::PathBuf, time::Duration};

use bytes::Bytes;
use clap::{Parser, ValueEnum};

use crate::{
    error::{Error, Result},
    pacer::{LinearPacer, Rate},
    target::Target,
    transport::HttpConfig,
};

/// Command line and environment configuration of the `volley` binary.
///
/// Every option can be set through the environment, so the binary runs
/// unchanged as a container job.
#[derive(Parser, Debug, Clone)]
#[command(name = "volley")]
#[command(about = "Constant-rate HTTP load generator", long_about = None)]
#[command(version)]
pub struct Config {
    /// URL every request is sent to
    #[arg(long = "url", env = "TARGET_URL")]
    pub target_url: String,

    /// Requests per second
    #[arg(long = "rate", env = "REQUEST_RATE")]
    pub rate: u64,

    /// Length of the attack in seconds
    #[arg(long = "duration", env = "REQUEST_DURATION")]
    pub duration: u64,

    /// File whose contents are sent as the request body
    #[arg(long = "body", env = "REQUEST_BODY_FILE_PATH")]
    pub body_file: Option<PathBuf>,

    /// Bearer token for the Authorization header
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, env = "REQUEST_METHOD", default_value = "POST")]
    pub method: String,

    #[arg(long, env = "CONTENT_TYPE", default_value = "application/json")]
    pub content_type: String,

    /// Extra header as "Name: value", repeatable
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Requests per second gained every second, negative to ramp down
    #[arg(long, env = "RATE_SLOPE", default_value = "0", allow_hyphen_values = true)]
    pub rate_slope: f64,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", env = "REQUEST_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Maximum concurrent requests, unbounded when unset
    #[arg(long, env = "MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Seconds in-flight requests may run once the attack ends
    #[arg(long = "grace", env = "GRACE_PERIOD")]
    pub grace_period: Option<u64>,

    #[arg(long = "name", env = "ATTACK_NAME", default_value = "Attack")]
    pub attack_name: String,

    #[arg(long = "format", env = "REPORT_FORMAT", value_enum, default_value = "log")]
    pub report_format: ReportFormat,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,
}

/// Where the final report goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// One structured log event
    Log,
    /// A JSON document on stdout
    Json,
    /// A text table on stdout
    Text,
}

impl Config {
    /// Build the request replayed on every tick, reading the body file if set.
    pub async fn target(&self) -> Result<Target> {
        let body = match &self.body_file {
            Some(path) => Bytes::from(tokio::fs::read(path).await?),
            None => Bytes::new(),
        };

        let mut target = Target::builder()
            .method(self.method.to_uppercase())
            .url(self.target_url.as_str())
            .body(body)
            .build()
            .header("Content-Type", self.content_type.as_str());
        if let Some(token) = &self.token {
            target = target.bearer(token);
        }
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            target = target.header(name, value);
        }

        target.validate()?;
        Ok(target)
    }

    /// The constant rate at which the attack starts.
    pub fn rate(&self) -> Result<Rate> {
        if self.rate == 0 && self.rate_slope <= 0.0 {
            return Err(Error::InvalidRate(
                "rate must be positive unless ramping up".to_string(),
            ));
        }
        Ok(Rate::per_second(self.rate))
    }

    /// A ramping pacer, or `None` when the rate is constant.
    pub fn linear_pacer(&self) -> Result<Option<LinearPacer>> {
        if !self.rate_slope.is_finite() {
            return Err(Error::InvalidRate(format!(
                "slope must be finite, got {}",
                self.rate_slope
            )));
        }
        if self.rate_slope == 0.0 {
            return Ok(None);
        }
        Ok(Some(LinearPacer::new(self.rate()?, self.rate_slope)))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn grace(&self) -> Option<Duration> {
        self.grace_period.map(Duration::from_secs)
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig::builder()
            .timeout(Duration::from_secs(self.timeout))
            .insecure(self.insecure)
            .build()
    }
}

/// Split `"Name: value"` at the first colon.
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::Config(format!("header `{raw}` is not `Name: value`")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config(format!("header `{raw}` has no name")));
    }
    Ok((name, value.trim()))
}
