//! taskfarm - a distributed compute-farm task dispatcher.
//!
//! A coordinator matches incoming task requests to a pool of remote worker
//! processes spread across a heterogeneous fleet, using live per-host load
//! telemetry to balance work and per-task platform constraints to narrow
//! eligible hosts. Four peer roles speak newline-delimited JSON to the
//! coordinator: monitors (load telemetry), workers (task executors),
//! clients (task submitters/queriers), and a one-way framed log viewer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   load records    ┌────────────┐
//! │ monitors │ ─────────────────▶│            │
//! └──────────┘                   │            │     ┌─────────────┐
//! ┌──────────┐   register        │  Registry  │────▶│  Dispatcher │
//! │ workers  │ ─────────────────▶│            │◀────│             │
//! └──────────┘                   │            │     └─────────────┘
//! ┌──────────┐  taskRequest /    │            │
//! │ clients  │  workerQuery  ───▶│            │
//! └──────────┘                   └────────────┘
//!                                       │
//!                                       ▼
//!                                  ┌──────────┐
//!                                  │ log sink │──▶ external viewer
//!                                  └──────────┘
//! ```
//!
//! [`serve`] builds the shared [`Registry`], [`LogSink`] and [`Metrics`],
//! binds the listener, spawns the [`dispatcher`] task, and returns a
//! [`ServerHandle`] the caller can use to drive a graceful shutdown --
//! this is what both `main` and the integration tests use to start a real
//! coordinator on an ephemeral port.

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logsink;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::Config;
pub use error::{Error, Result};

use logsink::LogSink;
use metrics::Metrics;
use registry::Registry;

/// Shared state handed to every connection handler and the Dispatcher.
pub struct Context {
    pub registry: Arc<Registry>,
    pub log_sink: Arc<LogSink>,
    pub metrics: Arc<Metrics>,
}

/// A running coordinator. Dropping this without calling [`shutdown`] leaves
/// the accept loop and Dispatcher running in the background; call
/// [`shutdown`] for a graceful stop.
///
/// [`shutdown`]: ServerHandle::shutdown
pub struct ServerHandle {
    /// The address actually bound (useful when port 0 was requested).
    pub local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting new connections, abort the Dispatcher, close the log
    /// sink, and wait for the accept loop to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Start the coordinator: bind the listener, spawn the Dispatcher and the
/// accept loop, and return a handle for graceful shutdown.
pub async fn serve(config: Config) -> Result<ServerHandle> {
    let registry = Arc::new(Registry::new(config.files.clone()));
    let log_sink = Arc::new(
        LogSink::connect(
            &config.cutelog_actions.host,
            config.cutelog_actions.port,
            config.cutelog_actions.retry_attempts,
        )
        .await,
    );
    let metrics = Arc::new(Metrics::default());
    let ctx = Arc::new(Context {
        registry: registry.clone(),
        log_sink: log_sink.clone(),
        metrics: metrics.clone(),
    });

    let addr_str = format!("{}:{}", config.task_manager.interface, config.task_manager.port);
    let listener = TcpListener::bind(&addr_str).await.map_err(|e| Error::Bind {
        addr: addr_str.clone(),
        source: e,
    })?;
    let local_addr = listener.local_addr().map_err(|e| Error::Bind {
        addr: addr_str.clone(),
        source: e,
    })?;
    info!(%local_addr, "taskmanager listening");

    let dispatcher_handle = tokio::spawn(dispatcher::run(registry.clone(), metrics.clone()));

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let ctx = ctx.clone();
                            tokio::spawn(async move {
                                server::handle(stream, addr, ctx).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "failed to accept connection"),
                    }
                }
            }
        }
        dispatcher_handle.abort();
        log_sink.close().await;
        info!("taskmanager shut down");
    });

    Ok(ServerHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        join,
    })
}
