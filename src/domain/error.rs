use crate::clock::ClockError;
use crate::sender::TransmitError;
use thiserror::Error;

/// Errors surfaced to users of the client.
///
/// Construction problems come back from `Client::new`; `Closed` and
/// `Backlogged` come back synchronously from `Client::send`. Nothing that
/// happens on the dispatcher after construction is reported here.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connectivity check failed: {0}")]
    ConnectFailed(#[source] TransmitError),

    #[error("o11y client closed")]
    Closed,

    #[error("o11y client backlogged")]
    Backlogged,
}
