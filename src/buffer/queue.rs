use crate::domain::Event;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity. `first` is set only for the first rejection
    /// since the last successful enqueue.
    #[error("Backlog queue is full")]
    Full { first: bool },
    #[error("Backlog queue is closed")]
    Closed,
}

#[derive(Debug)]
struct ProducerState {
    allow_write: bool,
    backlogged: bool,
}

/// Creates the bounded queue between producers and the dispatcher.
pub fn backlog(capacity: usize) -> (BacklogSender, BacklogReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let state = Arc::new(Mutex::new(ProducerState {
        allow_write: true,
        backlogged: false,
    }));

    (
        BacklogSender {
            tx,
            state: Arc::clone(&state),
        },
        BacklogReceiver { rx, state },
    )
}

/// Producer side. Never waits: a full queue is reported straight back.
#[derive(Debug, Clone)]
pub struct BacklogSender {
    tx: mpsc::Sender<Event>,
    state: Arc<Mutex<ProducerState>>,
}

impl BacklogSender {
    pub fn try_enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        let mut state = self.state.lock();
        if !state.allow_write {
            return Err(EnqueueError::Closed);
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                state.backlogged = false;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                let first = !state.backlogged;
                state.backlogged = true;
                Err(EnqueueError::Full { first })
            }
            Err(TrySendError::Closed(_)) => {
                state.allow_write = false;
                Err(EnqueueError::Closed)
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side, owned by the dispatcher.
#[derive(Debug)]
pub struct BacklogReceiver {
    rx: mpsc::Receiver<Event>,
    state: Arc<Mutex<ProducerState>>,
}

impl BacklogReceiver {
    /// Next queued event; `None` once the queue is closed and drained, or
    /// every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stops accepting new events. Returns `true` only for the call that
    /// actually closed the queue.
    pub fn close(&mut self) -> bool {
        let mut state = self.state.lock();
        if !state.allow_write {
            return false;
        }
        state.allow_write = false;
        self.rx.close();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_is_edge_triggered() {
        let (tx, mut rx) = backlog(2);

        assert!(tx.try_enqueue(Event::new(1)).is_ok());
        assert!(tx.try_enqueue(Event::new(2)).is_ok());
        assert_eq!(
            tx.try_enqueue(Event::new(3)),
            Err(EnqueueError::Full { first: true })
        );
        assert_eq!(
            tx.try_enqueue(Event::new(4)),
            Err(EnqueueError::Full { first: false })
        );

        assert!(rx.rx.try_recv().is_ok());
        assert!(tx.try_enqueue(Event::new(5)).is_ok());
        assert_eq!(
            tx.try_enqueue(Event::new(6)),
            Err(EnqueueError::Full { first: true })
        );
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (tx, mut rx) = backlog(4);
        tx.try_enqueue(Event::new("a")).unwrap();
        tx.try_enqueue(Event::new("b")).unwrap();

        assert!(rx.close());
        assert!(!rx.close());
        assert_eq!(tx.try_enqueue(Event::new("c")), Err(EnqueueError::Closed));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.into_value().unwrap(), "a");
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_all_senders_ends_stream() {
        let (tx, mut rx) = backlog(4);
        let second = tx.clone();
        drop(tx);
        drop(second);
        assert!(rx.recv().await.is_none());
    }
}
