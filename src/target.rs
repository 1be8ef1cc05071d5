use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use typed_builder::TypedBuilder;

use crate::error::{Error, Result};

/// The request replayed on every tick.
///
/// A `Target` is built once before the run and then shared read-only by every
/// dispatched request through an [`Arc`]. Header names map to an ordered list of
/// values so repeated headers keep their order on the wire.
///
/// ```rust
/// use volley::Target;
///
/// let target = Target::builder()
///     .method("POST")
///     .url("http://localhost:8080/ingest")
///     .body(r#"{"id":1}"#)
///     .build()
///     .header("Content-Type", "application/json")
///     .bearer("s3cr3t");
///
/// assert!(target.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Target {
    #[builder(default = String::from("GET"), setter(into))]
    pub method: String,
    #[builder(setter(into))]
    pub url: String,
    #[builder(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[builder(default, setter(into))]
    pub body: Bytes,
}

impl Target {
    /// Append a value for `name`, keeping values already present.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous authorization.
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .insert("Authorization".to_string(), vec![format!("Bearer {token}")]);
        self
    }

    /// Check that the target can be turned into an HTTP request.
    ///
    /// The engine assumes a valid target, so this runs once at the boundary rather
    /// than on every dispatch.
    pub fn validate(&self) -> Result<()> {
        reqwest::Method::from_bytes(self.method.as_bytes())
            .map_err(|_| Error::InvalidTarget(format!("invalid method `{}`", self.method)))?;

        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| Error::InvalidTarget(format!("invalid url `{}`: {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidTarget(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }

        for (name, values) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidTarget(format!("invalid header name `{name}`")))?;
            for value in values {
                HeaderValue::from_str(value).map_err(|_| {
                    Error::InvalidTarget(format!("invalid value for header `{name}`"))
                })?;
            }
        }
        Ok(())
    }
}

/// Supplies the request definition for each tick.
pub trait Targeter: Send + Sync + 'static {
    /// The target for the tick with sequence number `seq`.
    fn next_target(&self, seq: u64) -> Arc<Target>;
}

/// A targeter that replays the same request on every tick.
#[derive(Debug, Clone)]
pub struct StaticTargeter {
    target: Arc<Target>,
}

impl StaticTargeter {
    pub fn new(target: Target) -> Self {
        Self {
            target: Arc::new(target),
        }
    }
}

impl Targeter for StaticTargeter {
    fn next_target(&self, _seq: u64) -> Arc<Target> {
        Arc::clone(&self.target)
    }
}
