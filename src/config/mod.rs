//! Configuration layer for minipay.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values passed on the command line, or through
//!    `MINIPAY_LISTEN` / `WEBHOOK_TARGET` in the environment
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! Every setting has a default, so minipay starts with no configuration at all,
//! keeping its data in memory.
//!
//! # TOML-Only Options
//!
//! Some options are not available via CLI:
//! - `webhook.lease` (default: 30s) - How long a claimed event stays hidden
//! - `retry.max_delay` (default: 30s) - Maximum retry delay
//! - `retry.multiplier` (default: 2) - Exponential backoff multiplier

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod cli_tests;
#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::ConfigError;
pub use toml::{TomlConfig, default_config_template};
pub use validated::{ValidatedConfig, write_default_config};
