use super::{Clock, ClockError, Ticker, Timestamp};
use chrono::Utc;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Wall-clock time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn new_ticker(&self, interval: Duration) -> Result<Box<dyn Ticker>, ClockError> {
        if interval.is_zero() {
            return Err(ClockError::ZeroInterval);
        }

        // First tick one full period from now, not immediately
        let mut inner = interval_at(Instant::now() + interval, interval);
        inner.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Box::new(RealTicker { inner }))
    }
}

#[derive(Debug)]
pub struct RealTicker {
    inner: Interval,
}

impl Ticker for RealTicker {
    fn tick(&mut self) -> BoxFuture<'_, Timestamp> {
        Box::pin(async move {
            self.inner.tick().await;
            Utc::now()
        })
    }

    fn stop(self: Box<Self>) {}
}
