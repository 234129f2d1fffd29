//! Time sources for the dispatch pipeline.
//!
//! Everything time-dependent in the client (flush ticks, retry backoff,
//! envelope timestamps) goes through a [`Clock`], so tests can swap the
//! wall clock for a [`VirtualClock`] and drive time by hand.

mod real;
mod virtual_clock;

pub use real::{RealClock, RealTicker};
pub use virtual_clock::{VirtualClock, VirtualTicker};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;

pub type Timestamp = DateTime<Utc>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Invalid clock seed '{seed}': {reason}")]
    InvalidSeed { seed: String, reason: String },
    #[error("Ticker interval must be greater than zero")]
    ZeroInterval,
}

/// A source of current time, sleeps and repeating tickers.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Zero intervals are rejected with [`ClockError::ZeroInterval`].
    fn new_ticker(&self, interval: Duration) -> Result<Box<dyn Ticker>, ClockError>;
}

/// Handle to a repeating timer created by [`Clock::new_ticker`].
pub trait Ticker: Send {
    /// Resolves at the next tick. Cancel-safe, so it can sit in `tokio::select!`.
    fn tick(&mut self) -> BoxFuture<'_, Timestamp>;

    /// Deregisters the ticker. Consumes the handle, so a ticker can only be
    /// stopped once; dropping it without calling `stop` deregisters it too.
    fn stop(self: Box<Self>);
}

/// Nanoseconds since the Unix epoch, saturating to zero outside the
/// representable range (years 1677..2262).
pub fn unix_nanos(at: Timestamp) -> i64 {
    at.timestamp_nanos_opt().unwrap_or_default()
}
