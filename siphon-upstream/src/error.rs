use reqwest::StatusCode;
use siphon_config::ConfigError;

/// Errors raised while setting up the [`UpstreamClient`](crate::UpstreamClient).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Email or token are not configured.
    #[error("cannot deliver metrics without credentials")]
    NoCredentials(#[source] ConfigError),
    /// The metrics endpoint URL could not be built from the configured API origin.
    #[error("invalid metrics API url")]
    InvalidUrl(#[source] url::ParseError),
    /// The configured forward proxy is not a valid proxy URI.
    #[error("invalid proxy configuration")]
    InvalidProxy(#[source] reqwest::Error),
    /// The HTTP client could not be initialized.
    #[error("failed to build http client")]
    BuildClient(#[source] reqwest::Error),
    /// The client was created outside of a tokio runtime.
    #[error("upstream client requires a tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}

/// Errors of a single request to the metrics API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamRequestError {
    /// The batch could not be serialized.
    #[error("failed to serialize batch")]
    Serialize(#[from] serde_json::Error),
    /// The request failed before a response was received.
    #[error("could not send request to upstream")]
    Reqwest(#[source] reqwest::Error),
    /// The request did not complete within the configured timeout.
    #[error("request to upstream timed out")]
    Timeout,
    /// The metrics API answered with a client or server error.
    #[error("upstream request returned error {0}")]
    ResponseError(StatusCode, String),
}

impl UpstreamRequestError {
    /// Returns `true` if the error indicates a network downtime.
    ///
    /// These errors are retried once. Does not include timeouts.
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Reqwest(_) => true,
            Self::ResponseError(status, _) => status.is_server_error(),
            Self::Serialize(_) | Self::Timeout => false,
        }
    }

    /// Returns `true` if the metrics API has permanently rejected the batch.
    pub fn is_permanent_rejection(&self) -> bool {
        match self {
            Self::ResponseError(status, _) => status.is_client_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for UpstreamRequestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Reqwest(error)
        }
    }
}
