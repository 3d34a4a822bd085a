//! Tests for validated configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::webhook::{BackoffPolicy, WorkerOptions};

use super::ConfigError;
use super::cli::Cli;
use super::toml::TomlConfig;
use super::validated::{ValidatedConfig, write_default_config};

/// Helper to create CLI args from a slice
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["minipay"];
    full_args.extend(args);
    Cli::parse_from_iter(full_args)
}

/// Helper to parse TOML config
fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}

mod defaults {
    use super::*;

    #[test]
    fn empty_input_uses_defaults() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert_eq!(config.listen.to_string(), "0.0.0.0:8080");
        assert!(config.data_file.is_none());
        assert_eq!(
            config.webhook_target.as_str(),
            "http://localhost:8081/webhook"
        );
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent, 32);
        assert_eq!(config.lease, Duration::from_secs(30));
        assert_eq!(config.backoff, BackoffPolicy::default());
        assert!(!config.verbose);
    }

    #[test]
    fn worker_options_follow_config() {
        let config =
            ValidatedConfig::from_raw(&cli(&["--poll-interval", "3", "--max-concurrent", "7"]), None)
                .unwrap();

        let options = WorkerOptions::from(&config);

        assert_eq!(options.poll_interval, Duration::from_secs(3));
        assert_eq!(options.max_concurrent, 7);
    }

    #[test]
    fn display_summarizes_settings() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        let text = config.to_string();

        assert!(text.contains("listen: 0.0.0.0:8080"));
        assert!(text.contains("storage: memory"));
        assert!(text.contains("retry: 5x/1s..30s"));
    }
}

mod precedence {
    use super::*;

    const FULL_TOML: &str = r#"
        [server]
        listen = "127.0.0.1:7000"

        [storage]
        data_file = "toml.json"

        [webhook]
        target = "https://toml.example.com/hook"
        poll_interval = 4
        timeout = 6
        max_concurrent = 9
        lease = 40

        [retry]
        max_retries = 2
        initial_delay = 3
        max_delay = 90
        multiplier = 4
    "#;

    #[test]
    fn toml_overrides_defaults() {
        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml(FULL_TOML))).unwrap();

        assert_eq!(config.listen.to_string(), "127.0.0.1:7000");
        assert_eq!(config.data_file, Some(PathBuf::from("toml.json")));
        assert_eq!(
            config.webhook_target.as_str(),
            "https://toml.example.com/hook"
        );
        assert_eq!(config.poll_interval, Duration::from_secs(4));
        assert_eq!(config.request_timeout, Duration::from_secs(6));
        assert_eq!(config.max_concurrent, 9);
        assert_eq!(config.lease, Duration::from_secs(40));
        assert_eq!(config.backoff.max_retries, 2);
        assert_eq!(config.backoff.initial_delay, Duration::from_secs(3));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(90));
        assert_eq!(config.backoff.multiplier, 4);
    }

    #[test]
    fn cli_overrides_toml() {
        let cli = cli(&[
            "--listen",
            "127.0.0.1:9999",
            "--data-file",
            "cli.json",
            "--webhook-target",
            "https://cli.example.com/hook",
            "--poll-interval",
            "2",
            "--timeout",
            "5",
            "--max-concurrent",
            "1",
            "--retry-max",
            "7",
            "--retry-delay",
            "1",
            "-v",
        ]);

        let config = ValidatedConfig::from_raw(&cli, Some(&toml(FULL_TOML))).unwrap();

        assert_eq!(config.listen.to_string(), "127.0.0.1:9999");
        assert_eq!(config.data_file, Some(PathBuf::from("cli.json")));
        assert_eq!(config.webhook_target.as_str(), "https://cli.example.com/hook");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.backoff.max_retries, 7);
        assert_eq!(config.backoff.initial_delay, Duration::from_secs(1));
        assert!(config.verbose);

        // TOML-only settings still come from the file.
        assert_eq!(config.lease, Duration::from_secs(40));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(90));
        assert_eq!(config.backoff.multiplier, 4);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml = toml("[retry]\nmax_retries = 1\n");

        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();

        assert_eq!(config.backoff.max_retries, 1);
        assert_eq!(config.backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_concurrent, 32);
    }
}

mod validation {
    use super::*;

    #[test]
    fn bad_listen_address() {
        let result = ValidatedConfig::from_raw(&cli(&["--listen", "localhost"]), None);

        assert!(matches!(result, Err(ConfigError::InvalidListen { .. })));
    }

    #[test]
    fn bad_webhook_url() {
        let result = ValidatedConfig::from_raw(&cli(&["--webhook-target", "not a url"]), None);

        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn non_http_webhook_scheme() {
        let result =
            ValidatedConfig::from_raw(&cli(&["--webhook-target", "ftp://example.com/x"]), None);

        match result {
            Err(ConfigError::InvalidUrl { reason, .. }) => assert!(reason.contains("ftp")),
            other => panic!("expected InvalidUrl, got {other:?}"),
        }
    }

    #[test]
    fn zero_poll_interval() {
        let result = ValidatedConfig::from_raw(&cli(&["--poll-interval", "0"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                ..
            })
        ));
    }

    #[test]
    fn zero_timeout() {
        let result = ValidatedConfig::from_raw(&cli(&["--timeout", "0"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "timeout",
                ..
            })
        ));
    }

    #[test]
    fn lease_must_outlast_timeout() {
        let toml = toml("[webhook]\ntimeout = 30\nlease = 30\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration { field: "lease", .. })
        ));
    }

    #[test]
    fn zero_concurrency() {
        let result = ValidatedConfig::from_raw(&cli(&["--max-concurrent", "0"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidConcurrency { value: 0, .. })
        ));
    }

    #[test]
    fn excessive_concurrency() {
        let result = ValidatedConfig::from_raw(&cli(&["--max-concurrent", "100000"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidConcurrency {
                value: 100_000,
                max: 4096
            })
        ));
    }

    #[test]
    fn excessive_lease() {
        let toml = toml("[webhook]\nlease = 9223372036854775807\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        match result {
            Err(ConfigError::InvalidDuration {
                field: "lease",
                reason,
            }) => assert!(reason.contains("at most")),
            other => panic!("expected InvalidDuration, got {other:?}"),
        }
    }

    #[test]
    fn excessive_timeout() {
        let result = ValidatedConfig::from_raw(&cli(&["--timeout", "86401"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "timeout",
                ..
            })
        ));
    }

    #[test]
    fn excessive_retry_delays() {
        let toml = toml("[retry]\ninitial_delay = 100000\nmax_delay = 100000\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        match result {
            Err(ConfigError::InvalidRetry(reason)) => assert!(reason.contains("at most")),
            other => panic!("expected InvalidRetry, got {other:?}"),
        }
    }

    #[test]
    fn largest_accepted_values() {
        let toml = toml(
            "[webhook]\ntimeout = 60\nlease = 86400\nmax_concurrent = 4096\n\
             [retry]\ninitial_delay = 86400\nmax_delay = 86400\n",
        );

        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml)).unwrap();

        assert_eq!(config.lease, Duration::from_secs(86_400));
        assert_eq!(config.max_concurrent, 4096);
        assert_eq!(config.backoff.max_delay, Duration::from_secs(86_400));
    }

    #[test]
    fn zero_initial_delay() {
        let result = ValidatedConfig::from_raw(&cli(&["--retry-delay", "0"]), None);

        assert!(matches!(result, Err(ConfigError::InvalidRetry(_))));
    }

    #[test]
    fn zero_multiplier() {
        let toml = toml("[retry]\nmultiplier = 0\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        assert!(matches!(result, Err(ConfigError::InvalidRetry(_))));
    }

    #[test]
    fn max_delay_below_initial() {
        let toml = toml("[retry]\ninitial_delay = 10\nmax_delay = 5\n");

        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml));

        match result {
            Err(ConfigError::InvalidRetry(reason)) => assert!(reason.contains("max_delay")),
            other => panic!("expected InvalidRetry, got {other:?}"),
        }
    }

    #[test]
    fn zero_retries_is_allowed() {
        let config = ValidatedConfig::from_raw(&cli(&["--retry-max", "0"]), None).unwrap();

        assert_eq!(config.backoff.max_retries, 0);
    }
}

mod loading {
    use super::*;

    #[test]
    fn load_without_config_file() {
        let config = ValidatedConfig::load(&cli(&["--max-concurrent", "3"])).unwrap();

        assert_eq!(config.max_concurrent, 3);
    }

    #[test]
    fn load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minipay.toml");
        std::fs::write(&path, "[webhook]\nmax_concurrent = 11\n").unwrap();

        let config = ValidatedConfig::load(&cli(&["--config", path.to_str().unwrap()])).unwrap();

        assert_eq!(config.max_concurrent, 11);
    }

    #[test]
    fn load_missing_config_file() {
        let result = ValidatedConfig::load(&cli(&["--config", "/nonexistent/minipay.toml"]));

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn written_template_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minipay.toml");
        write_default_config(&path).unwrap();

        let config = ValidatedConfig::load(&cli(&["--config", path.to_str().unwrap()])).unwrap();
        let defaults = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert_eq!(config.listen, defaults.listen);
        assert_eq!(config.webhook_target, defaults.webhook_target);
        assert_eq!(config.backoff, defaults.backoff);
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("minipay.toml");

        let result = write_default_config(&path);

        assert!(matches!(result, Err(ConfigError::FileWrite { .. })));
    }
}
