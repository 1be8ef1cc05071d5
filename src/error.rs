use thiserror::Error;

/// Errors that stop an attack from starting or from completing its drain.
///
/// Individual request failures never surface here; they are recorded on the
/// corresponding [`crate::AttackResult`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The target descriptor cannot be sent as an HTTP request.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The rate policy cannot produce a schedule.
    #[error("invalid rate: {0}")]
    InvalidRate(String),

    /// A configuration value could not be interpreted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The ticker or the aggregator task panicked or was aborted.
    #[error("attack task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single request at the transport level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
