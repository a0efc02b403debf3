use crate::error::{Error, Result};
use langfuse_observer::DispatcherConfig;
use std::time::Duration;

/// Suggested period between application-driven flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Ingestion host used when `LANGFUSE_HOST` is not set.
pub const DEFAULT_HOST: &str = "https://cloud.langfuse.com";

/// HTTP request timeout used when `LANGFUSE_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the batch ingestion endpoint, relative to the host.
pub const INGESTION_PATH: &str = "/api/public/ingestion";

pub const HOST_ENV: &str = "LANGFUSE_HOST";
pub const TIMEOUT_ENV: &str = "LANGFUSE_TIMEOUT_SECS";

/// Configuration for the [`Langfuse`](crate::Langfuse) façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangfuseConfig {
    /// Exposed through [`Langfuse::flush_interval`](crate::Langfuse::flush_interval)
    /// for applications that drive their own flush timer. The dispatcher
    /// does not use it.
    pub flush_interval: Duration,
    /// Background dispatcher settings.
    pub dispatcher: DispatcherConfig,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl LangfuseConfig {
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the dispatcher timer period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_tick(tick);
        self
    }
}

/// Endpoint settings for [`HttpIngestionClient`](crate::HttpIngestionClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpConfig {
    /// Reads `LANGFUSE_HOST` and `LANGFUSE_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{TIMEOUT_ENV} must be whole seconds, got {raw:?}")))?;
            if secs == 0 {
                return Err(Error::Config(format!("{TIMEOUT_ENV} must be greater than zero")));
            }
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL batches are posted to.
    pub fn ingestion_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), INGESTION_PATH)
    }
}
