//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// minipay: a minimal payment service
///
/// Accepts idempotent charges and refunds over HTTP and notifies a
/// webhook target of every successful charge.
#[derive(Debug, Parser)]
#[command(name = "minipay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address the HTTP API listens on
    #[arg(long, env = "MINIPAY_LISTEN", value_name = "ADDR")]
    pub listen: Option<String>,

    /// JSON data file (omit to keep everything in memory)
    #[arg(long = "data-file", value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// URL that receives `payment.succeeded` webhooks
    #[arg(long = "webhook-target", env = "WEBHOOK_TARGET", value_name = "URL")]
    pub webhook_target: Option<String>,

    /// Seconds between scans of the webhook outbox
    #[arg(long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Per-delivery HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum number of deliveries in flight at once
    #[arg(long = "max-concurrent")]
    pub max_concurrent: Option<usize>,

    /// Maximum number of retries after the first delivery attempt
    #[arg(long = "retry-max")]
    pub retry_max: Option<u32>,

    /// Initial retry delay in seconds
    #[arg(long = "retry-delay")]
    pub retry_delay: Option<u64>,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for minipay
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "minipay.toml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
