use std::{future::Future, time::Duration};

use reqwest::{redirect, Client, Method};
use typed_builder::TypedBuilder;

use crate::{
    error::{Error, TransportError},
    target::Target,
};

/// What the dispatcher needs to know about a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub bytes_in: u64,
}

/// Sends one request described by a [`Target`].
///
/// Implementations are cloned into every dispatch task, so cloning should be
/// cheap (a handle to a shared connection pool, for instance).
pub trait Transport: Send + Sync + Clone + 'static {
    fn send(
        &self,
        target: &Target,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Settings for the HTTP client behind [`HttpTransport`].
///
/// ```rust
/// use std::time::Duration;
/// use volley::HttpConfig;
///
/// let transport = HttpConfig::builder()
///     .timeout(Duration::from_secs(5))
///     .redirects(0)
///     .build()
///     .transport()
///     .unwrap();
/// # let _ = transport;
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct HttpConfig {
    /// Per-request timeout, covering connect through reading the body.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    /// Maximum redirects to follow; `0` disables following.
    #[builder(default = 10)]
    pub redirects: usize,
    #[builder(default = true)]
    pub keepalive: bool,
    /// Accept invalid TLS certificates.
    #[builder(default = false)]
    pub insecure: bool,
    #[builder(default = String::from(concat!("volley/", env!("CARGO_PKG_VERSION"))), setter(into))]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn transport(&self) -> crate::error::Result<HttpTransport> {
        let redirect = if self.redirects == 0 {
            redirect::Policy::none()
        } else {
            redirect::Policy::limited(self.redirects)
        };
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(redirect)
            .user_agent(self.user_agent.as_str())
            .danger_accept_invalid_certs(self.insecure);
        if !self.keepalive {
            builder = builder.pool_max_idle_per_host(0);
        }
        let client = builder.build().map_err(Error::Client)?;
        Ok(HttpTransport { client })
    }
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, target: &Target) -> Result<Response, TransportError> {
        let method = Method::from_bytes(target.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(target.method.clone()))?;

        let mut request = self
            .client
            .request(method, target.url.as_str())
            .body(target.body.clone());
        for (name, values) in &target.headers {
            for value in values {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(Response {
            status,
            bytes_in: body.len() as u64,
        })
    }
}
