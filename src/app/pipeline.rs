use crate::{
    buffer::{BacklogReceiver, BatchBuffer, cut_point},
    clock::{Clock, Ticker, unix_nanos},
    domain::{Action, BadType, Envelope, Event},
    sender::{PipelineStats, Transmitter},
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Headroom kept below `max_size` so one more envelope rarely pushes a
/// batch over the limit.
pub const SIZE_MARGIN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    Draining,
    Stopped,
}

/// Bundled parameters for [`Dispatcher::new`].
pub struct DispatcherParams {
    pub identifier: String,
    pub max_size: usize,
    pub queue: BacklogReceiver,
    pub transmitter: Transmitter,
    pub clock: Arc<dyn Clock>,
    pub stats: Arc<PipelineStats>,
}

/// Owns the batch buffer and does all network I/O for one client.
pub struct Dispatcher {
    state: DispatchState,
    identifier: String,
    max_size: usize,
    buffer: BatchBuffer,
    queue: BacklogReceiver,
    transmitter: Transmitter,
    clock: Arc<dyn Clock>,
    stats: Arc<PipelineStats>,
    warned_kinds: HashSet<&'static str>,
}

impl Dispatcher {
    pub fn new(params: DispatcherParams) -> Self {
        let DispatcherParams {
            identifier,
            max_size,
            queue,
            transmitter,
            clock,
            stats,
        } = params;

        Self {
            state: DispatchState::Running,
            identifier,
            max_size,
            buffer: BatchBuffer::with_capacity(max_size),
            queue,
            transmitter,
            clock,
            stats,
            warned_kinds: HashSet::new(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Runs until the queue is closed and drained, then writes the closing
    /// marker and flushes one last time.
    ///
    /// `cancel` and `close` both move the loop into draining; neither
    /// interrupts a flush already in progress.
    pub async fn run(
        mut self,
        mut ticker: Box<dyn Ticker>,
        cancel: CancellationToken,
        close: CancellationToken,
    ) {
        info!(
            identifier = %self.identifier,
            url = %self.transmitter.url(),
            max_size = self.max_size,
            "Dispatcher started"
        );

        while self.state != DispatchState::Stopped {
            let running = self.state == DispatchState::Running;

            tokio::select! {
                () = cancel.cancelled(), if running => {
                    self.begin_drain("cancelled");
                }
                () = close.cancelled(), if running => {
                    self.begin_drain("close requested");
                }
                event = self.queue.recv() => match event {
                    Some(event) => self.write_one(event).await,
                    None => self.write_closing().await,
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        ticker.stop();
        info!("Dispatcher stopped");
    }

    /// Stops producers from enqueueing. Safe to call more than once.
    pub fn begin_drain(&mut self, reason: &str) {
        if self.state != DispatchState::Running {
            return;
        }
        self.state = DispatchState::Draining;
        if self.queue.close() {
            debug!(reason, "Draining backlog queue");
        }
    }

    pub async fn write_one(&mut self, event: Event) {
        let kind = event.kind();
        let timestamp = unix_nanos(self.clock.now());

        let data = match event.into_value() {
            Ok(value) => value,
            Err(e) => {
                self.stats.record_serialization_failure();
                if self.warned_kinds.insert(kind) {
                    warn!(
                        kind,
                        error = %e,
                        "Payload type cannot be serialized, sending its type name instead"
                    );
                }
                BadType::new(kind).into_value()
            }
        };

        let envelope = Envelope::data(timestamp, &self.identifier, data);
        self.append(&envelope);

        if self.buffer.len() >= self.max_size.saturating_sub(SIZE_MARGIN) {
            self.flush().await;
        }
    }

    /// Final step of draining: the closing marker always goes out, even
    /// when nothing else is buffered.
    pub async fn write_closing(&mut self) {
        let timestamp = unix_nanos(self.clock.now());
        let closing = Envelope::marker(timestamp, &self.identifier, Action::Closing);
        self.append(&closing);
        self.flush().await;
        self.state = DispatchState::Stopped;
    }

    /// Sends everything buffered. Oversized buffers go out in pieces cut at
    /// line boundaries; a piece that fails is dropped and the rest are still
    /// attempted.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let mut pending = self.buffer.take();
        while !pending.is_empty() {
            let head_len = cut_point(&pending, self.max_size).0.len();
            let piece = pending.split_to(head_len);
            let bytes = piece.len();

            match self.transmitter.send(piece).await {
                Ok(()) => self.stats.record_batch_sent(bytes as u64),
                Err(e) => {
                    self.stats.record_batch_failed();
                    error!(
                        bytes,
                        error = %e,
                        "Dropping batch after failed transmission"
                    );
                }
            }
        }
    }

    fn append(&mut self, envelope: &Envelope) {
        if let Err(e) = self.buffer.append(envelope) {
            self.stats.record_serialization_failure();
            error!(error = %e, "Failed to encode envelope");
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> &BatchBuffer {
        &self.buffer
    }
}
