use super::cli::{LogFormat, LogLevel};
use parking_lot::RwLock;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InstallFailed(String),
}

/// HTTP plumbing is chatty at debug level; keep it quiet unless asked.
const DEFAULT_DIRECTIVES: &[&str] = &["hyper=warn", "reqwest=warn", "h2=warn"];

/// Collects per-target filter directives and installs the global subscriber.
#[derive(Debug, Default)]
pub struct LoggingSystem {
    directives: RwLock<Vec<Directive>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directive(&self, directive: &str) -> Result<(), LoggingError> {
        let parsed = directive
            .parse::<Directive>()
            .map_err(|e| LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: e.to_string(),
            })?;
        self.directives.write().push(parsed);
        Ok(())
    }

    pub fn add_default_directives(&self) -> Result<(), LoggingError> {
        for directive in DEFAULT_DIRECTIVES {
            self.add_directive(directive)?;
        }
        Ok(())
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    /// Default level first, then each directive in insertion order.
    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        std::iter::once(default_level.as_str().to_string())
            .chain(directives.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `RUST_LOG` wins over the configured level when it is set and valid.
    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.build_filter_string(default_level))
                .map_err(|e| LoggingError::InstallFailed(e.to_string()))?,
        };

        let registry = tracing_subscriber::registry().with(filter);
        let result = match format {
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
        };

        result.map_err(|e| LoggingError::InstallFailed(e.to_string()))
    }
}

/// Installs the global subscriber once per process. Later calls report
/// whether the first one succeeded.
pub fn setup_logging(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    static INIT_SUCCESS: AtomicBool = AtomicBool::new(false);

    INIT.call_once(|| {
        let logging_system = LoggingSystem::new();
        let result = logging_system
            .add_default_directives()
            .and_then(|()| logging_system.initialize_tracing(level, format));

        match result {
            Ok(()) => INIT_SUCCESS.store(true, Ordering::Release),
            Err(e) => eprintln!("Warning: {e}"),
        }
    });

    if INIT_SUCCESS.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(LoggingError::InstallFailed(
            "tracing subscriber was not installed".to_string(),
        ))
    }
}
