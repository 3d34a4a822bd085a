//! Tests for CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

use super::cli::{Cli, Command};

mod parsing {
    use super::*;

    #[test]
    fn parse_no_args() {
        let cli = Cli::parse_from_iter(["minipay"]);

        assert!(cli.command.is_none());
        assert!(cli.data_file.is_none());
        assert!(cli.poll_interval.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_server_options() {
        let cli = Cli::parse_from_iter([
            "minipay",
            "--listen",
            "127.0.0.1:9000",
            "--data-file",
            "/var/lib/minipay.json",
        ]);

        assert_eq!(cli.listen.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(cli.data_file, Some(PathBuf::from("/var/lib/minipay.json")));
    }

    #[test]
    fn parse_webhook_options() {
        let cli = Cli::parse_from_iter([
            "minipay",
            "--webhook-target",
            "https://hooks.example.com/pay",
            "--poll-interval",
            "5",
            "--timeout",
            "3",
            "--max-concurrent",
            "8",
        ]);

        assert_eq!(
            cli.webhook_target.as_deref(),
            Some("https://hooks.example.com/pay")
        );
        assert_eq!(cli.poll_interval, Some(5));
        assert_eq!(cli.timeout, Some(3));
        assert_eq!(cli.max_concurrent, Some(8));
    }

    #[test]
    fn parse_retry_options() {
        let cli = Cli::parse_from_iter(["minipay", "--retry-max", "2", "--retry-delay", "4"]);

        assert_eq!(cli.retry_max, Some(2));
        assert_eq!(cli.retry_delay, Some(4));
    }

    #[test]
    fn parse_short_flags() {
        let cli = Cli::parse_from_iter(["minipay", "-v", "-c", "minipay.toml"]);

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("minipay.toml")));
    }

    #[test]
    fn non_numeric_interval_is_rejected() {
        let result = Cli::try_parse_from(["minipay", "--poll-interval", "soon"]);

        assert!(result.is_err());
    }
}

mod init_command {
    use super::*;

    #[test]
    fn init_uses_default_output() {
        let cli = Cli::parse_from_iter(["minipay", "init"]);

        assert!(cli.is_init());
        match cli.command {
            Some(Command::Init { output }) => assert_eq!(output, PathBuf::from("minipay.toml")),
            None => panic!("expected init command"),
        }
    }

    #[test]
    fn init_accepts_custom_output() {
        let cli = Cli::parse_from_iter(["minipay", "init", "-o", "custom.toml"]);

        match cli.command {
            Some(Command::Init { output }) => assert_eq!(output, PathBuf::from("custom.toml")),
            None => panic!("expected init command"),
        }
    }

    #[test]
    fn run_mode_is_not_init() {
        let cli = Cli::parse_from_iter(["minipay", "--verbose"]);

        assert!(!cli.is_init());
    }
}
