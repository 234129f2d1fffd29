use super::config::{ClientConfig, DEFAULT_HTTP_TIMEOUT};
use super::pipeline::{Dispatcher, DispatcherParams};
use crate::{
    buffer::{BacklogSender, EnqueueError, backlog},
    clock::{Clock, unix_nanos},
    domain::{Action, ClientError, Envelope, Event},
    sender::{PipelineStats, StatsSnapshot, Transmitter},
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Handle for sending observations to the collector.
///
/// Cheap to clone; every clone feeds the same background dispatcher. The
/// dispatcher stops when [`Client::close`] is called, when the cancellation
/// token passed to [`Client::with_cancellation`] fires, or when the last
/// handle is dropped. In every case it flushes what is queued and sends a
/// closing marker first.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    identifier: String,
    url: Url,
    verbosity: u32,
    queue: BacklogSender,
    stats: Arc<PipelineStats>,
    close: CancellationToken,
    finished: CancellationToken,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_cancellation(config, CancellationToken::new()).await
    }

    /// Like [`Client::new`], but the dispatcher also starts draining once
    /// `cancel` fires.
    pub async fn with_cancellation(
        config: ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let url = config.collector_url()?;
        let max_size = config.effective_max_size();
        let n_retries = config.effective_retries();
        let ClientConfig {
            auth_token,
            identifier,
            http_client,
            verbosity,
            interval,
            clock,
            check_connect,
            queue_capacity,
            ..
        } = config;
        let stats = Arc::new(PipelineStats::new());

        let http_client = match http_client {
            Some(client) => client,
            None => default_http_client()?,
        };
        let transmitter = Transmitter::new(
            http_client,
            url.clone(),
            auth_token,
            n_retries,
            Arc::clone(&clock),
        )
        .with_stats(Arc::clone(&stats));

        if check_connect {
            check_connection(&transmitter, clock.as_ref(), &identifier).await?;
        }

        let ticker = clock.new_ticker(interval)?;
        let (queue, receiver) = backlog(queue_capacity);

        let dispatcher = Dispatcher::new(DispatcherParams {
            identifier: identifier.clone(),
            max_size,
            queue: receiver,
            transmitter,
            clock: Arc::clone(&clock),
            stats: Arc::clone(&stats),
        });

        let close = CancellationToken::new();
        let finished = CancellationToken::new();
        let finished_guard = finished.clone().drop_guard();
        let dispatcher_close = close.clone();
        tokio::spawn(async move {
            let _finished = finished_guard;
            dispatcher.run(ticker, cancel, dispatcher_close).await;
        });

        info!(
            identifier = %identifier,
            url = %url,
            "o11y client started"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                identifier,
                url,
                verbosity,
                queue,
                stats,
                close,
                finished,
            }),
        })
    }

    /// Queues `payload` for the next batch without waiting.
    ///
    /// Payloads with `verbosity` above the configured threshold are dropped
    /// silently. A full queue returns [`ClientError::Backlogged`] and logs a
    /// warning the first time it happens after a successful send.
    pub fn send<T>(&self, verbosity: u32, payload: T) -> Result<(), ClientError>
    where
        T: Serialize + Send + 'static,
    {
        let inner = &self.inner;
        if verbosity > inner.verbosity {
            inner.stats.record_below_verbosity();
            return Ok(());
        }

        match inner.queue.try_enqueue(Event::new(payload)) {
            Ok(()) => {
                inner.stats.record_enqueued();
                Ok(())
            }
            Err(EnqueueError::Full { first }) => {
                inner.stats.record_shed();
                if first {
                    inner.stats.record_backlog_warning();
                    warn!(
                        identifier = %inner.identifier,
                        capacity = inner.queue.capacity(),
                        "o11y client is backlogged; dropping observations"
                    );
                }
                Err(ClientError::Backlogged)
            }
            Err(EnqueueError::Closed) => Err(ClientError::Closed),
        }
    }

    /// Drains the queue, sends the closing marker and waits for the
    /// dispatcher to finish. Any number of callers may close concurrently;
    /// all of them return once the dispatcher is gone.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.inner.close.cancel();
        self.inner.finished.cancelled().await;
        debug!(identifier = %self.inner.identifier, "o11y client closed");
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.is_cancelled()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// The collector URL after path normalization.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }
}

fn default_http_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .user_agent(format!("o11y-client/{}", crate::VERSION))
        .build()
        .map_err(ClientError::HttpClient)
}

/// Sends a lone `connect` marker so a bad URL or token fails construction
/// instead of every later batch.
async fn check_connection(
    transmitter: &Transmitter,
    clock: &dyn Clock,
    identifier: &str,
) -> Result<(), ClientError> {
    let connect = Envelope::marker(unix_nanos(clock.now()), identifier, Action::Connect);
    let mut body = serde_json::to_vec(&connect)?;
    body.push(b'\n');

    transmitter
        .send(Bytes::from(body))
        .await
        .map_err(ClientError::ConnectFailed)
}
