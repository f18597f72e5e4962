//! Runtime profiling server.
//!
//! Serves runtime diagnostics on a separate listener so it can stay bound to
//! loopback while the main server is public.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Snapshot of the async runtime.
#[derive(Debug, Serialize)]
pub struct RuntimeReport {
    pub workers: usize,
    pub alive_tasks: usize,
    pub uptime_secs: u64,
}

async fn runtime_report(State(started): State<Instant>) -> Json<RuntimeReport> {
    let metrics = tokio::runtime::Handle::current().metrics();
    Json(RuntimeReport {
        workers: metrics.num_workers(),
        alive_tasks: metrics.num_alive_tasks(),
        uptime_secs: started.elapsed().as_secs(),
    })
}

/// Routes served by the profiling server.
pub fn router(started: Instant) -> Router {
    Router::new()
        .route("/debug/runtime", get(runtime_report))
        .with_state(started)
}

/// Start the profiling server in the background.
///
/// Bind and serve failures are logged; they never take the process down.
pub fn listen(addr: SocketAddr) -> JoinHandle<()> {
    let started = Instant::now();
    tokio::spawn(async move {
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(address = %addr, error = %e, "Profiling server failed to bind");
                return;
            }
        };
        tracing::info!(address = %addr, "Profiling enabled");
        if let Err(e) = axum::serve(listener, router(started)).await {
            tracing::error!(error = %e, "Profiling server stopped");
        }
    })
}
