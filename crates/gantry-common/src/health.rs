//! Readiness server
//!
//! A thin HTTP server exposing `GET /healthz`, returning 200 once the owning
//! service flips the ready flag and 503 before that. Shutdown is driven by a
//! cancellation future and drains within five seconds.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::{error, info};

use crate::{Error, Result};

/// Window granted to in-flight requests after shutdown is requested
const DRAIN_WINDOW: Duration = Duration::from_secs(5);

/// Shared readiness flag, toggled by the owning service
#[derive(Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// Create a new readiness flag, initially not ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the service ready
    pub fn ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Mark the service not ready
    pub fn not_ready(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Current readiness state
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

async fn healthz(State(readiness): State<Readiness>) -> StatusCode {
    if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Build the healthz router for the given readiness flag.
///
/// Both the bare path (control-plane probes) and the versioned path (the
/// sidecar's injected liveness/readiness probes) are served.
pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1.0/healthz", get(healthz))
        .with_state(readiness)
}

/// Serve the readiness endpoint on `port` until `shutdown` resolves.
///
/// In-flight requests get at most [`DRAIN_WINDOW`] to finish after the
/// shutdown signal; a stuck connection cannot block process exit.
pub async fn serve(
    readiness: Readiness,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::io(format!("binding healthz listener on {addr}"), e))?;
    info!(%addr, "healthz server listening");

    let (signal_tx, mut signal_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = signal_tx.send(true);
    });

    let mut drain_rx = signal_rx.clone();
    let app = router(readiness);
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal_rx.changed().await;
                info!("healthz server shutting down");
            })
            .await
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "healthz server error");
                return Err(Error::io("healthz server".to_string(), e));
            }
        }
        _ = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(DRAIN_WINDOW).await;
        } => {
            info!("healthz drain window elapsed");
        }
    }
    Ok(())
}
