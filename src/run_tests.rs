//! Tests for the run module.

use super::*;

mod run_error {
    use super::*;

    #[test]
    fn store_error_displays_source() {
        let error = RunError::Store(StoreError::Poisoned);
        assert!(error.to_string().starts_with("Failed to open store"));
    }

    #[test]
    fn bind_error_names_address() {
        let error = RunError::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(error.to_string().contains("127.0.0.1:80"));
    }

    #[test]
    fn debug_format_works() {
        let error = RunError::Serve(std::io::Error::other("boom"));
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Serve"));
    }
}

mod startup {
    use super::*;
    use minipay::config::Cli;

    #[tokio::test]
    async fn corrupted_data_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minipay.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cli = Cli::parse_from_iter([
            "minipay",
            "--listen",
            "127.0.0.1:0",
            "--data-file",
            path.to_str().unwrap(),
        ]);
        let config = ValidatedConfig::from_raw(&cli, None).unwrap();

        let result = execute(config).await;

        assert!(matches!(
            result,
            Err(RunError::Store(StoreError::Corrupted { .. }))
        ));
    }
}

mod end_to_end {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use minipay::config::Cli;
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Received = (HeaderMap, String);

    /// Starts a webhook receiver and returns its URL and the channel of
    /// received deliveries.
    async fn spawn_receiver() -> (String, mpsc::UnboundedReceiver<Received>) {
        let (tx, rx) = mpsc::unbounded_channel::<Received>();
        let app = axum::Router::new()
            .route(
                "/webhook",
                post(
                    |State(tx): State<mpsc::UnboundedSender<Received>>,
                     headers: HeaderMap,
                     body: String| async move {
                        let _ = tx.send((headers, body));
                        "ok"
                    },
                ),
            )
            .with_state(tx);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/webhook"), rx)
    }

    fn http_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn charge_is_delivered_and_shutdown_drains() {
        let (target, mut received) = spawn_receiver().await;
        let cli = Cli::parse_from_iter([
            "minipay",
            "--listen",
            "127.0.0.1:0",
            "--webhook-target",
            &target,
            "--poll-interval",
            "1",
            "--timeout",
            "5",
        ]);
        let config = ValidatedConfig::from_raw(&cli, None).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            serve(MemoryStore::new(), listener, &config, async move {
                let _ = stop_rx.await;
            })
            .await
        });

        let client = http_client();
        let response = client
            .post(format!("{base}/api/v1/charges"))
            .header("Idempotency-Key", "e2e-1")
            .json(&serde_json::json!({
                "amount": 2500,
                "currency": "EUR",
                "customer": "cus_e2e",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let charge: serde_json::Value = response.json().await.unwrap();
        let id = charge["id"].as_str().unwrap().to_owned();

        let (headers, body) = tokio::time::timeout(Duration::from_secs(10), received.recv())
            .await
            .expect("webhook was not delivered in time")
            .unwrap();
        assert_eq!(headers["x-webhook-event"], "payment.succeeded");
        let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(payload["id"], id.as_str());
        assert_eq!(payload["amount"], 2500);

        let metrics: serde_json::Value = client
            .get(format!("{base}/metrics"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(metrics["total_charges"], 1);

        stop_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .expect("server did not shut down")
            .unwrap();
        assert!(result.is_ok());
    }
}
