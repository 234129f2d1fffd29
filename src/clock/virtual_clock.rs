use super::{Clock, ClockError, Ticker, Timestamp};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How far `now()` nudges simulated time, so polling loops still progress.
const POLL_STEP: Duration = Duration::from_millis(1);

/// Simulated time for deterministic tests.
///
/// Time only moves when someone calls [`VirtualClock::advance`] (or `sleep`,
/// or `now`, which steps one millisecond). While advancing, registered tickers
/// fire in due-time order; a ticker whose previous tick has not been consumed
/// simply misses the new one instead of stalling the clock.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    now: Timestamp,
    next_id: u64,
    tickers: Vec<Registration>,
}

#[derive(Debug)]
struct Registration {
    id: u64,
    period: Duration,
    next: Timestamp,
    tx: mpsc::Sender<Timestamp>,
}

impl VirtualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                now: start,
                next_id: 0,
                tickers: Vec::new(),
            })),
        }
    }

    /// Seeds the clock from an RFC 3339 timestamp such as `2023-04-20T23:20:00Z`.
    pub fn parse(seed: &str) -> Result<Self, ClockError> {
        let start = DateTime::parse_from_rfc3339(seed).map_err(|e| ClockError::InvalidSeed {
            seed: seed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(start.with_timezone(&Utc)))
    }

    /// Current simulated time, without the polling nudge `now()` applies.
    pub fn peek(&self) -> Timestamp {
        self.state.lock().now
    }

    pub fn ticker_count(&self) -> usize {
        self.state.lock().tickers.len()
    }

    /// Moves simulated time forward by `duration`, firing every ticker that
    /// comes due on the way.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        let target = state.now + duration;

        loop {
            let earliest = state
                .tickers
                .iter()
                .enumerate()
                .min_by_key(|(_, reg)| reg.next)
                .map(|(idx, reg)| (idx, reg.next));

            match earliest {
                Some((idx, due)) if due <= target => {
                    let reg = &mut state.tickers[idx];
                    reg.next = due + reg.period;
                    // Undrained tickers miss this tick
                    let _ = reg.tx.try_send(due);
                    state.now = due;
                }
                _ => {
                    state.now = target;
                    return;
                }
            }
        }
    }

    fn deregister(&self, id: u64) {
        self.state.lock().tickers.retain(|reg| reg.id != id);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Timestamp {
        self.advance(POLL_STEP);
        self.peek()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let clock = self.clone();
        Box::pin(async move {
            clock.advance(duration);
            // Let whoever just got a tick observe it
            tokio::task::yield_now().await;
        })
    }

    fn new_ticker(&self, interval: Duration) -> Result<Box<dyn Ticker>, ClockError> {
        if interval.is_zero() {
            return Err(ClockError::ZeroInterval);
        }

        let (tx, rx) = mpsc::channel(1);
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let next = state.now + interval;
        state.tickers.push(Registration {
            id,
            period: interval,
            next,
            tx,
        });

        Ok(Box::new(VirtualTicker {
            id,
            rx,
            clock: self.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct VirtualTicker {
    id: u64,
    rx: mpsc::Receiver<Timestamp>,
    clock: VirtualClock,
}

impl Ticker for VirtualTicker {
    fn tick(&mut self) -> BoxFuture<'_, Timestamp> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some(at) => at,
                // The sender lives until this ticker deregisters itself
                None => futures::future::pending().await,
            }
        })
    }

    fn stop(self: Box<Self>) {}
}

impl Drop for VirtualTicker {
    fn drop(&mut self) {
        self.clock.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    const SEED: &str = "2023-04-20T23:20:00Z";

    fn poll_tick(ticker: &mut Box<dyn Ticker>) -> Option<Timestamp> {
        ticker.tick().now_or_never()
    }

    #[test]
    fn test_parse_valid_seed() {
        let clock = VirtualClock::parse(SEED).unwrap();
        assert_eq!(clock.peek().to_rfc3339(), "2023-04-20T23:20:00+00:00");
    }

    #[test]
    fn test_parse_invalid_seed() {
        let err = VirtualClock::parse("yesterday at noon").unwrap_err();
        assert!(matches!(err, ClockError::InvalidSeed { .. }));
    }

    #[test]
    fn test_zero_interval_ticker_rejected() {
        let clock = VirtualClock::parse(SEED).unwrap();
        assert_eq!(
            clock.new_ticker(Duration::ZERO).err(),
            Some(ClockError::ZeroInterval)
        );
        assert_eq!(clock.ticker_count(), 0);
    }

    #[test]
    fn test_now_advances_time() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, chrono::TimeDelta::milliseconds(1));
    }

    #[test]
    fn test_advance_without_tickers_jumps_to_target() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let start = clock.peek();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.peek() - start, chrono::TimeDelta::seconds(90));
    }

    #[test]
    fn test_tickers_fire_in_due_order() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let start = clock.peek();
        let mut fast = clock.new_ticker(Duration::from_millis(10)).unwrap();
        let mut slow = clock.new_ticker(Duration::from_millis(15)).unwrap();

        let mut fired = Vec::new();
        for _ in 0..6 {
            clock.advance(Duration::from_millis(5));
            if let Some(at) = poll_tick(&mut fast) {
                fired.push(("fast", (at - start).num_milliseconds()));
            }
            if let Some(at) = poll_tick(&mut slow) {
                fired.push(("slow", (at - start).num_milliseconds()));
            }
        }

        assert_eq!(
            fired,
            vec![
                ("fast", 10),
                ("slow", 15),
                ("fast", 20),
                ("fast", 30),
                ("slow", 30),
            ]
        );
    }

    #[test]
    fn test_undrained_ticker_misses_ticks() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let start = clock.peek();
        let mut ticker = clock.new_ticker(Duration::from_millis(10)).unwrap();

        clock.advance(Duration::from_millis(35));

        assert_eq!(clock.peek() - start, chrono::TimeDelta::milliseconds(35));
        let at = poll_tick(&mut ticker).unwrap();
        assert_eq!(at - start, chrono::TimeDelta::milliseconds(10));
        assert!(poll_tick(&mut ticker).is_none());
    }

    #[test]
    fn test_stop_and_drop_deregister() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let stopped = clock.new_ticker(Duration::from_secs(1)).unwrap();
        let dropped = clock.new_ticker(Duration::from_secs(1)).unwrap();
        assert_eq!(clock.ticker_count(), 2);

        stopped.stop();
        assert_eq!(clock.ticker_count(), 1);

        drop(dropped);
        assert_eq!(clock.ticker_count(), 0);
    }

    #[tokio::test]
    async fn test_sleep_delivers_tick() {
        let clock = VirtualClock::parse(SEED).unwrap();
        let mut ticker = clock.new_ticker(Duration::from_millis(10)).unwrap();

        clock.sleep(Duration::from_millis(20)).await;

        let at = ticker.tick().await;
        assert!(at <= clock.peek());
    }
}
