//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// HTTP server section
    #[serde(default)]
    pub server: ServerSection,

    /// Persistence section
    #[serde(default)]
    pub storage: StorageSection,

    /// Webhook delivery section
    #[serde(default)]
    pub webhook: WebhookSection,

    /// Retry policy section
    #[serde(default)]
    pub retry: RetrySection,
}

/// HTTP server section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address, e.g. "0.0.0.0:8080"
    pub listen: Option<String>,
}

/// Persistence section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// JSON data file; absent means in-memory only
    pub data_file: Option<PathBuf>,
}

/// Webhook delivery section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSection {
    /// Target URL for `payment.succeeded` events
    pub target: Option<String>,

    /// Outbox polling interval in seconds
    pub poll_interval: Option<u64>,

    /// Per-delivery HTTP timeout in seconds
    pub timeout: Option<u64>,

    /// Maximum deliveries in flight
    pub max_concurrent: Option<usize>,

    /// Claim lease in seconds
    pub lease: Option<u64>,
}

/// Retry policy section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Maximum number of retries after the first attempt
    pub max_retries: Option<u32>,

    /// Initial retry delay in seconds
    pub initial_delay: Option<u64>,

    /// Maximum retry delay in seconds
    pub max_delay: Option<u64>,

    /// Backoff multiplier
    pub multiplier: Option<u32>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# minipay configuration file

[server]
# Address the HTTP API listens on (env: MINIPAY_LISTEN)
listen = "0.0.0.0:8080"

[storage]
# JSON data file. Leave unset to keep all data in memory.
# data_file = "minipay.json"

[webhook]
# Receiver of payment.succeeded events (env: WEBHOOK_TARGET)
target = "http://localhost:8081/webhook"

# Seconds between outbox scans (default: 1)
# poll_interval = 1

# Per-delivery HTTP timeout in seconds (default: 10)
# timeout = 10

# Maximum deliveries in flight at once (default: 32)
# max_concurrent = 32

# Seconds a claimed event stays hidden from other scans (default: 30)
# Must be longer than timeout.
# lease = 30

[retry]
# Retries after the first attempt before an event is failed (default: 5)
# max_retries = 5

# Initial retry delay in seconds (default: 1)
# initial_delay = 1

# Maximum retry delay in seconds (default: 30)
# max_delay = 30

# Backoff multiplier (default: 2)
# multiplier = 2
"#
    .to_string()
}
