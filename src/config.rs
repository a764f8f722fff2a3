//! Configuration types for jobsai-client

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable naming the deployment environment
pub const ENV_ENVIRONMENT: &str = "JOBSAI_ENV";
/// Environment variable holding the backend base URL
pub const ENV_API_BASE_URL: &str = "JOBSAI_API_BASE_URL";
/// Environment variable overriding the poll interval in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "JOBSAI_POLL_INTERVAL_MS";
/// Environment variable overriding the network-error escalation threshold
pub const ENV_MAX_NETWORK_ERRORS: &str = "JOBSAI_MAX_NETWORK_ERRORS";
/// Environment variable overriding the not-found escalation threshold
pub const ENV_MAX_NOT_FOUND: &str = "JOBSAI_MAX_NOT_FOUND";
/// Environment variable overriding the download directory
pub const ENV_DOWNLOAD_DIR: &str = "JOBSAI_DOWNLOAD_DIR";
/// Environment variable overriding the per-request timeout in seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "JOBSAI_REQUEST_TIMEOUT_SECS";

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; a missing base URL falls back to localhost
    Development,
    /// Anything deployed; a missing base URL is fatal
    #[default]
    Production,
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" | "staging" => Ok(Environment::Production),
            other => Err(Error::Config {
                message: format!("unknown environment '{other}'"),
                key: Some(ENV_ENVIRONMENT.to_string()),
            }),
        }
    }
}

/// Backend connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `https://api.example.com` (default: "http://localhost:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Deployment environment (default: production)
    #[serde(default)]
    pub environment: Environment,

    /// Timeout for start, progress and cancel requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for a single document download (default: 120 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            environment: Environment::default(),
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Poll loop policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between the end of one poll and the start of the next (default: 1500 ms)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub interval: Duration,

    /// Consecutive network failures tolerated before the job is marked errored (default: 3)
    #[serde(default = "default_escalation_threshold")]
    pub max_consecutive_network_errors: u32,

    /// Consecutive 404 responses tolerated before the job is presumed lost (default: 3)
    #[serde(default = "default_escalation_threshold")]
    pub max_consecutive_not_found: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_consecutive_network_errors: default_escalation_threshold(),
            max_consecutive_not_found: default_escalation_threshold(),
        }
    }
}

/// Document delivery settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory downloaded documents are written to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// What to do when a document with the same name already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Retry policy for each individual document download
    #[serde(default = "default_download_retry")]
    pub retry: RetryConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            file_collision: FileCollisionAction::default(),
            retry: default_download_retry(),
        }
    }
}

/// Main configuration for the orchestrator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll loop policy
    #[serde(default)]
    pub polling: PollingConfig,

    /// Document delivery
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Build configuration from process environment variables
    ///
    /// Fails fast when `JOBSAI_API_BASE_URL` is missing outside development.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults, except the base URL which is required
    /// unless the environment is development.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config::default();

        if let Some(env) = get(ENV_ENVIRONMENT) {
            config.api.environment = env.parse()?;
        }

        match get(ENV_API_BASE_URL) {
            Some(url) => config.api.base_url = url.trim().to_string(),
            None if config.api.environment == Environment::Development => {
                tracing::debug!(base_url = %config.api.base_url, "using development backend");
            }
            None => {
                return Err(Error::Config {
                    message: "backend base URL is required outside development".to_string(),
                    key: Some(ENV_API_BASE_URL.to_string()),
                });
            }
        }

        if let Some(ms) = get(ENV_POLL_INTERVAL_MS) {
            config.polling.interval = Duration::from_millis(parse_number(ENV_POLL_INTERVAL_MS, &ms)?);
        }
        if let Some(n) = get(ENV_MAX_NETWORK_ERRORS) {
            config.polling.max_consecutive_network_errors = parse_number(ENV_MAX_NETWORK_ERRORS, &n)?;
        }
        if let Some(n) = get(ENV_MAX_NOT_FOUND) {
            config.polling.max_consecutive_not_found = parse_number(ENV_MAX_NOT_FOUND, &n)?;
        }
        if let Some(secs) = get(ENV_REQUEST_TIMEOUT_SECS) {
            config.api.request_timeout =
                Duration::from_secs(parse_number(ENV_REQUEST_TIMEOUT_SECS, &secs)?);
        }
        if let Some(dir) = get(ENV_DOWNLOAD_DIR) {
            config.delivery.download_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {e}", self.api.base_url),
            key: Some("api.base_url".to_string()),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("base URL must be http or https, got '{}'", url.scheme()),
                key: Some("api.base_url".to_string()),
            });
        }
        if self.polling.interval.is_zero() {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("polling.interval".to_string()),
            });
        }
        if self.polling.max_consecutive_network_errors == 0 {
            return Err(Error::Config {
                message: "network error threshold must be at least 1".to_string(),
                key: Some("polling.max_consecutive_network_errors".to_string()),
            });
        }
        if self.polling.max_consecutive_not_found == 0 {
            return Err(Error::Config {
                message: "not-found threshold must be at least 1".to_string(),
                key: Some("polling.max_consecutive_not_found".to_string()),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::Config {
        message: format!("expected a non-negative integer, got '{value}'"),
        key: Some(key.to_string()),
    })
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// File collision handling for downloaded documents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to the filename
    #[default]
    Rename,
    /// Overwrite the existing file
    Overwrite,
    /// Leave the existing file and report the document as failed
    Skip,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1500)
}

fn default_escalation_threshold() -> u32 {
    3
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_download_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        jitter: true,
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Serialize Duration as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Serialize Duration as whole milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
