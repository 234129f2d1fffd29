pub mod stats;
pub mod transmission;

pub use stats::{PipelineStats, StatsSnapshot};
pub use transmission::{TransmitError, Transmitter, backoff_delay};
