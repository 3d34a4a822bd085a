//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::webhook::{BackoffPolicy, WorkerOptions};

use super::cli::Cli;
use super::defaults;
use super::error::ConfigError;
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Address the HTTP API binds to
    pub listen: SocketAddr,

    /// JSON data file. If `None`, all data lives in memory.
    pub data_file: Option<PathBuf>,

    /// Receiver of webhook events
    pub webhook_target: Url,

    /// Interval between outbox scans
    pub poll_interval: Duration,

    /// Timeout of a single delivery attempt
    pub request_timeout: Duration,

    /// Upper bound on deliveries in flight
    pub max_concurrent: usize,

    /// How long a claimed event stays hidden from other scans
    pub lease: Duration,

    /// Retry schedule for failed deliveries
    pub backoff: BackoffPolicy,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_file_str = self
            .data_file
            .as_ref()
            .map_or_else(|| "memory".to_string(), |p| p.display().to_string());

        write!(
            f,
            "Config {{ listen: {}, storage: {}, webhook_target: {}, poll_interval: {}s, \
             timeout: {}s, max_concurrent: {}, lease: {}s, retry: {}x/{}s..{}s }}",
            self.listen,
            data_file_str,
            self.webhook_target,
            self.poll_interval.as_secs(),
            self.request_timeout.as_secs(),
            self.max_concurrent,
            self.lease.as_secs(),
            self.backoff.max_retries,
            self.backoff.initial_delay.as_secs(),
            self.backoff.max_delay.as_secs(),
        )
    }
}

impl From<&ValidatedConfig> for WorkerOptions {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_concurrent: config.max_concurrent,
        }
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The listen address or webhook target does not parse
    /// - A duration or the concurrency bound is zero or too large
    /// - The lease is not longer than the request timeout
    /// - The retry settings are inconsistent
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let listen = Self::resolve_listen(cli, toml)?;
        let webhook_target = Self::resolve_webhook_target(cli, toml)?;

        let webhook = toml.map(|t| &t.webhook);
        let poll_interval = bounded_secs(
            "poll_interval",
            cli.poll_interval
                .or_else(|| webhook.and_then(|w| w.poll_interval))
                .unwrap_or(defaults::POLL_INTERVAL_SECS),
        )?;
        let request_timeout = bounded_secs(
            "timeout",
            cli.timeout
                .or_else(|| webhook.and_then(|w| w.timeout))
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
        )?;
        let lease = bounded_secs(
            "lease",
            webhook
                .and_then(|w| w.lease)
                .unwrap_or(defaults::LEASE_SECS),
        )?;
        if lease <= request_timeout {
            return Err(ConfigError::InvalidDuration {
                field: "lease",
                reason: format!(
                    "must be longer than the request timeout ({}s)",
                    request_timeout.as_secs()
                ),
            });
        }

        let max_concurrent = cli
            .max_concurrent
            .or_else(|| webhook.and_then(|w| w.max_concurrent))
            .unwrap_or(defaults::MAX_CONCURRENT);
        if max_concurrent == 0 || max_concurrent > defaults::MAX_CONCURRENT_LIMIT {
            return Err(ConfigError::InvalidConcurrency {
                value: max_concurrent,
                max: defaults::MAX_CONCURRENT_LIMIT,
            });
        }

        let backoff = Self::build_backoff(cli, toml)?;

        // CLI takes precedence
        let data_file = cli
            .data_file
            .clone()
            .or_else(|| toml.and_then(|t| t.storage.data_file.clone()));

        Ok(Self {
            listen,
            data_file,
            webhook_target,
            poll_interval,
            request_timeout,
            max_concurrent,
            lease,
            backoff,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_listen(cli: &Cli, toml: Option<&TomlConfig>) -> Result<SocketAddr, ConfigError> {
        // Priority: CLI explicit (or env) > TOML > default
        let value = cli
            .listen
            .as_deref()
            .or_else(|| toml.and_then(|t| t.server.listen.as_deref()))
            .unwrap_or(defaults::LISTEN);

        value
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidListen {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    fn resolve_webhook_target(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        let url_str = cli
            .webhook_target
            .as_deref()
            .or_else(|| toml.and_then(|t| t.webhook.target.as_deref()))
            .unwrap_or(defaults::WEBHOOK_TARGET);

        let url = Url::parse(url_str).map_err(|e| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidUrl {
                url: url_str.to_string(),
                reason: format!("unsupported scheme '{other}', expected http or https"),
            }),
        }
    }

    fn build_backoff(cli: &Cli, toml: Option<&TomlConfig>) -> Result<BackoffPolicy, ConfigError> {
        let retry = toml.map(|t| &t.retry);

        // Priority: CLI explicit > TOML > default
        let max_retries = cli
            .retry_max
            .or_else(|| retry.and_then(|r| r.max_retries))
            .unwrap_or(defaults::RETRY_MAX_RETRIES);

        let initial_delay_secs = cli
            .retry_delay
            .or_else(|| retry.and_then(|r| r.initial_delay))
            .unwrap_or(defaults::RETRY_INITIAL_DELAY_SECS);

        let max_delay_secs = retry
            .and_then(|r| r.max_delay)
            .unwrap_or(defaults::RETRY_MAX_DELAY_SECS);

        let multiplier = retry
            .and_then(|r| r.multiplier)
            .unwrap_or(defaults::RETRY_MULTIPLIER);

        if initial_delay_secs == 0 {
            return Err(ConfigError::InvalidRetry(
                "initial_delay must be greater than 0".to_string(),
            ));
        }

        if max_delay_secs > defaults::MAX_DURATION_SECS {
            return Err(ConfigError::InvalidRetry(format!(
                "max_delay ({max_delay_secs}s) must be at most {}s",
                defaults::MAX_DURATION_SECS
            )));
        }

        if multiplier == 0 {
            return Err(ConfigError::InvalidRetry(
                "multiplier must be at least 1".to_string(),
            ));
        }

        if max_delay_secs < initial_delay_secs {
            return Err(ConfigError::InvalidRetry(format!(
                "max_delay ({max_delay_secs}s) must be >= initial_delay ({initial_delay_secs}s)"
            )));
        }

        Ok(BackoffPolicy::new()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_secs(initial_delay_secs))
            .with_max_delay(Duration::from_secs(max_delay_secs))
            .with_multiplier(multiplier))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn bounded_secs(field: &'static str, seconds: u64) -> Result<Duration, ConfigError> {
    if seconds == 0 {
        return Err(ConfigError::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        });
    }
    if seconds > defaults::MAX_DURATION_SECS {
        return Err(ConfigError::InvalidDuration {
            field,
            reason: format!("must be at most {}s", defaults::MAX_DURATION_SECS),
        });
    }
    Ok(Duration::from_secs(seconds))
}
