use super::stats::PipelineStats;
use crate::clock::Clock;
use crate::domain::CheckResponse;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// First retry waits this long; each later one doubles it.
pub const SLEEP_QUANTUM: Duration = Duration::from_millis(250);

/// Backoff stops growing after this many doublings.
pub const MAX_SLEEP_RETRIES: u32 = 6;

#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("o11y client send failed")]
    Rejected,
}

impl TransmitError {
    /// `Rejected` means the collector looked at the batch and refused it;
    /// sending it again would not help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Delay before attempt number `attempt` (the first attempt is 0).
pub fn backoff_delay(attempt: u32) -> Duration {
    SLEEP_QUANTUM * 2_u32.pow(attempt.min(MAX_SLEEP_RETRIES))
}

/// POSTs NDJSON batches to the collector, retrying with exponential backoff.
#[derive(Clone)]
pub struct Transmitter {
    client: reqwest::Client,
    url: Url,
    auth_token: String,
    n_retries: u32,
    clock: Arc<dyn Clock>,
    stats: Arc<PipelineStats>,
}

impl std::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmitter")
            .field("url", &self.url.as_str())
            .field("n_retries", &self.n_retries)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Transmitter {
    pub fn new(
        client: reqwest::Client,
        url: Url,
        auth_token: impl Into<String>,
        n_retries: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            url,
            auth_token: auth_token.into(),
            n_retries: n_retries.max(1),
            clock,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends `body` as-is. Retryable failures are attempted up to
    /// `n_retries` times in total; the last error is returned once they run
    /// out. A rejection is returned straight away.
    pub async fn send(&self, body: Bytes) -> Result<(), TransmitError> {
        let mut last_error = None;

        for attempt in 0..self.n_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, ?delay, "Backing off before retry");
                self.clock.sleep(delay).await;
            }

            match self.attempt(body.clone()).await {
                Ok(()) => {
                    debug!(
                        bytes = body.len(),
                        attempt,
                        "Batch accepted by collector"
                    );
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.n_retries,
                        error = %e,
                        "Batch transmission attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransmitError::InvalidResponse("no transmission attempt was made".to_string())
        }))
    }

    async fn attempt(&self, body: Bytes) -> Result<(), TransmitError> {
        self.stats.record_http_attempt();

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.auth_token)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.bytes().await?;
        let check: CheckResponse = serde_json::from_slice(&raw).map_err(|e| {
            TransmitError::InvalidResponse(format!("HTTP {status}: undecodable body: {e}"))
        })?;

        if check.is_rejection() {
            return Err(TransmitError::Rejected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_secs(1));
        assert_eq!(backoff_delay(6), Duration::from_secs(16));
        assert_eq!(backoff_delay(7), Duration::from_secs(16));
        assert_eq!(backoff_delay(10), Duration::from_secs(16));
    }

    #[test]
    fn test_only_rejection_is_terminal() {
        assert!(!TransmitError::Rejected.is_retryable());
        assert!(TransmitError::InvalidResponse("html".into()).is_retryable());
    }
}
