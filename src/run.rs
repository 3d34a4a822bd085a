//! Application execution logic.
//!
//! This module wires the store, the payment service, the HTTP API and the
//! webhook delivery worker together and runs them until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;

use minipay::config::ValidatedConfig;
use minipay::metrics::Metrics;
use minipay::payment::PaymentService;
use minipay::server::router;
use minipay::store::{FileStore, MemoryStore, Store, StoreError};
use minipay::time::SystemClock;
use minipay::webhook::{
    Deliverer, DeliveryWorker, HttpError, Outbox, ReqwestClient, WorkerOptions,
};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The store could not be opened or read at startup.
    #[error("Failed to open store: {0}")]
    Store(#[source] StoreError),

    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The webhook HTTP client could not be built.
    #[error("Failed to create webhook client: {0}")]
    HttpClient(#[source] HttpError),

    /// The delivery worker task panicked or was cancelled.
    #[error("Delivery worker failed: {0}")]
    WorkerJoin(#[source] tokio::task::JoinError),
}

/// Executes the application until a shutdown signal arrives.
///
/// This function:
/// 1. Opens the file store, or an in-memory store if no data file is set
/// 2. Binds the listen address
/// 3. Runs the HTTP API and the delivery worker (see [`serve`])
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the address cannot be
/// bound, or either the server or the worker fails.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    match config.data_file.clone() {
        Some(path) => {
            let store = FileStore::open(&path).map_err(RunError::Store)?;
            tracing::info!("Persisting data to {}", store.path().display());
            let listener = bind(config.listen).await?;
            serve(store, listener, &config, shutdown_signal()).await
        }
        None => {
            tracing::warn!("No data file configured, all data is kept in memory");
            let listener = bind(config.listen).await?;
            serve(MemoryStore::new(), listener, &config, shutdown_signal()).await
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, RunError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| RunError::Bind { addr, source })
}

/// Serves the HTTP API on `listener` until `shutdown` completes.
///
/// The delivery worker runs alongside the server. Once the server has
/// stopped accepting requests, the worker is told to stop and its in-flight
/// deliveries are drained before this function returns.
async fn serve<S>(
    store: S,
    listener: TcpListener,
    config: &ValidatedConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), RunError>
where
    S: Store + 'static,
{
    let store = Arc::new(store);
    let clock = SystemClock;
    let metrics = Arc::new(Metrics::new());

    let outbox = Outbox::new(Arc::clone(&store), clock)
        .with_backoff(config.backoff)
        .with_lease(config.lease);
    let pending = outbox.count_pending().await.map_err(RunError::Store)?;
    if pending > 0 {
        tracing::info!("Resuming with {pending} undelivered webhook event(s)");
    }
    metrics.seed_pending(pending);

    let client =
        ReqwestClient::with_timeout(config.request_timeout).map_err(RunError::HttpClient)?;
    let deliverer = Deliverer::new(outbox, client, Arc::clone(&metrics));
    let worker = DeliveryWorker::new(deliverer, WorkerOptions::from(config));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let worker_handle = tokio::spawn(worker.run(async move {
        // A dropped sender also means stop.
        let _ = stop_rx.await;
    }));

    let service = Arc::new(PaymentService::new(
        store,
        clock,
        metrics,
        config.webhook_target.clone(),
    ));
    let app = router(service);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("Listening on {addr}"),
        Err(e) => tracing::warn!("Listening on unknown address: {e}"),
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(RunError::Serve);

    tracing::info!("HTTP server stopped, draining webhook deliveries...");
    let _ = stop_tx.send(());
    worker_handle.await.map_err(RunError::WorkerJoin)?;

    served
}

/// Returns a future that completes when a shutdown signal is received.
///
/// If a signal handler cannot be installed, that signal is ignored.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received, stopping...");
}
