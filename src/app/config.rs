use crate::clock::{Clock, RealClock};
use crate::domain::ClientError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const ENV_AUTH_TOKEN: &str = "OBSERVE_AUTHTOKEN";
pub const ENV_URL: &str = "OBSERVE_URL";

pub const DEFAULT_VERBOSITY: u32 = 5;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_SIZE: usize = 1024 * 1024;
pub const MIN_MAX_SIZE: usize = 4096;
pub const MAX_MAX_SIZE: usize = 4096 * 1000;
pub const DEFAULT_RETRIES: u32 = 5;
pub const MAX_NUM_RETRIES: u32 = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Collector paths that already carry this prefix are used verbatim.
const COLLECTOR_PREFIX: &str = "/v1/http/";
const DEFAULT_COLLECTOR_PATH: &str = "/v1/http/o11y-client";

/// Everything `Client::new` needs.
///
/// All fields are public. The `with_*` setters clamp `max_size` and
/// `n_retries` into their allowed ranges; values assigned directly are
/// clamped when the client is built.
#[derive(Clone)]
pub struct ClientConfig {
    pub auth_token: String,
    pub url: String,
    pub identifier: String,
    /// `None` builds a client with a 30s timeout and this crate's user agent.
    pub http_client: Option<reqwest::Client>,
    pub verbosity: u32,
    pub interval: Duration,
    pub max_size: usize,
    pub clock: Arc<dyn Clock>,
    pub check_connect: bool,
    pub n_retries: u32,
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            url: String::new(),
            identifier: program_name(),
            http_client: None,
            verbosity: DEFAULT_VERBOSITY,
            interval: DEFAULT_INTERVAL,
            max_size: DEFAULT_MAX_SIZE,
            clock: Arc::new(RealClock::new()),
            check_connect: true,
            n_retries: DEFAULT_RETRIES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.auth_token.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("ClientConfig")
            .field("auth_token", &token)
            .field("url", &self.url)
            .field("identifier", &self.identifier)
            .field("http_client", &self.http_client.is_some())
            .field("verbosity", &self.verbosity)
            .field("interval", &self.interval)
            .field("max_size", &self.max_size)
            .field("clock", &self.clock)
            .field("check_connect", &self.check_connect)
            .field("n_retries", &self.n_retries)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the token and URL taken from `OBSERVE_AUTHTOKEN` and
    /// `OBSERVE_URL` when they are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(token) = std::env::var(ENV_AUTH_TOKEN) {
            config.auth_token = token;
        }
        if let Ok(url) = std::env::var(ENV_URL) {
            config.url = url;
        }
        config
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.clamp(MIN_MAX_SIZE, MAX_MAX_SIZE);
        self
    }

    pub fn with_retries(mut self, n_retries: u32) -> Self {
        self.n_retries = n_retries.clamp(1, MAX_NUM_RETRIES);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn without_check_connect(mut self) -> Self {
        self.check_connect = false;
        self
    }

    pub fn effective_max_size(&self) -> usize {
        self.max_size.clamp(MIN_MAX_SIZE, MAX_MAX_SIZE)
    }

    pub fn effective_retries(&self) -> u32 {
        self.n_retries.clamp(1, MAX_NUM_RETRIES)
    }

    /// Parses `url` and maps its path into the collector's HTTP namespace:
    /// `/` becomes `/v1/http/o11y-client` and any other path `p` outside
    /// `/v1/http/` becomes `/v1/http` + `p`.
    pub fn collector_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.url).map_err(|source| ClientError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "Unsupported URL scheme '{}' in '{}'",
                url.scheme(),
                self.url
            )));
        }

        if !url.path().starts_with(COLLECTOR_PREFIX) {
            let path = if url.path() == "/" {
                DEFAULT_COLLECTOR_PATH.to_string()
            } else {
                format!("/v1/http{}", url.path())
            };
            url.set_path(&path);
        }

        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        self.collector_url()?;

        if self.interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "Flush interval must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ClientError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
