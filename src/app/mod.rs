pub mod cli;
pub mod config;
pub mod forward;
pub mod logging_system;
pub mod pipeline;
pub mod service;

pub use cli::{Config, ConfigError, LogFormat, LogLevel};
pub use config::ClientConfig;
pub use forward::{ForwardOutcome, forward_lines};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging};
pub use pipeline::{DispatchState, Dispatcher, DispatcherParams, SIZE_MARGIN};
pub use service::Client;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
