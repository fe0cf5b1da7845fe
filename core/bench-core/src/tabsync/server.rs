//! Local HTTP endpoint the companion browser extension pushes tab reports to.
//!
//! The rest of the crate is synchronous, so the server runs on its own thread
//! with a single-threaded tokio runtime. Binding happens on the caller's
//! thread so a taken port is reported immediately.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::thread::JoinHandle;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bench_protocol::{parse_tab_report, Health, PushAck, HEALTH_PATH, PROTOCOL_VERSION, TABS_PATH};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::TabHub;
use crate::error::{BenchError, Result};

/// A running server. Dropping the handle stops it.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting pushes and waits for the server thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Tab sync server thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn router(hub: TabHub) -> Router {
    Router::new()
        .route(TABS_PATH, post(push_tabs))
        .route(HEALTH_PATH, get(health))
        .with_state(hub)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Binds `bind` and serves pushes into `hub` until the handle is dropped.
pub fn spawn_server(bind: &str, hub: TabHub) -> Result<ServerHandle> {
    let listener = StdTcpListener::bind(bind)
        .map_err(|err| BenchError::Server(format!("failed to bind {}: {}", bind, err)))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| BenchError::io("failed to configure tab sync listener", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| BenchError::io("failed to read tab sync address", err))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| BenchError::io("failed to start tab sync runtime", err))?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("bench-tabsync".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!(error = %err, "Failed to adopt tab sync listener");
                        return;
                    }
                };
                let served = axum::serve(listener, router(hub))
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
                if let Err(err) = served {
                    error!(error = %err, "Tab sync server stopped");
                }
            });
        })
        .map_err(|err| BenchError::io("failed to spawn tab sync thread", err))?;

    info!(%addr, "Tab sync server listening");
    Ok(ServerHandle {
        addr,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

async fn push_tabs(State(hub): State<TabHub>, body: Bytes) -> Response {
    match parse_tab_report(&body) {
        Ok(report) => {
            let windows = report.window_count();
            hub.record_push(report);
            Json(PushAck {
                accepted: true,
                windows,
            })
            .into_response()
        }
        Err(info) => {
            warn!(code = %info.code, message = %info.message, "Rejected tab report");
            let status = if info.code == "payload_too_large" {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(info)).into_response()
        }
    }
}

async fn health(State(hub): State<TabHub>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        protocol_version: PROTOCOL_VERSION,
        pushes_received: hub.pushes_received(),
    })
}
