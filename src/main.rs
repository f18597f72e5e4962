//! `mimic-server`: an Axum server running the full middleware chain in
//! front of an echo application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────▶ trace ─▶ timeout ─▶ metrics ─▶ host ─▶ cors ─▶ rate limit ─▶ mimic ─┐
//!                                                                                    │
//!                                              mock hit: rendered response ◀─────────┤
//!                                              miss:     echo application ◀──────────┘
//!
//!     Side services: mock file watcher, Prometheus scrape route,
//!                    profiling listener (127.0.0.1:6060)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use http_middlewares::config::loader::load_config;
use http_middlewares::config::watcher::MockFileWatcher;
use http_middlewares::config::{CatcherKind, ServerConfig};
use http_middlewares::http::{echo_app, HttpServer};
use http_middlewares::lifecycle::{wait_for_signal, Shutdown};
use http_middlewares::mimic::{Catcher, JsonCatcher, Mimic, XmlCatcher};
use http_middlewares::observability::{logging, metrics, profiling};
use http_middlewares::security::limits;

#[derive(Parser, Debug)]
#[command(name = "mimic-server", version, about = "HTTP middleware server with request mocking")]
struct Args {
    /// Server configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mock document (YAML, TOML or JSON). Enables mocking.
    #[arg(short, long)]
    mocks: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(mocks) = &args.mocks {
        config.mimic.enabled = true;
        config.mimic.path = mocks.display().to_string();
    }

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "mimic-server starting"
    );

    if let Some(max) = config.limits.max_open_files {
        if let Err(e) = limits::raise_open_files(max) {
            tracing::warn!(error = %e, limit = max, "Could not raise open file limit");
        }
    }

    let metrics_handle = if config.observability.metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder");
                None
            }
        }
    } else {
        None
    };

    if config.profiling.enabled {
        match config.profiling.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                profiling::listen(addr);
            }
            Err(e) => tracing::error!(
                address = %config.profiling.bind_address,
                error = %e,
                "Failed to parse profiling address"
            ),
        }
    }

    let catcher: Arc<dyn Catcher> = match config.mimic.catcher {
        CatcherKind::Json => Arc::new(JsonCatcher),
        CatcherKind::Xml => Arc::new(XmlCatcher),
    };
    let mimic = Arc::new(
        Mimic::with_catcher(catcher).with_max_form_bytes(config.mimic.max_form_bytes),
    );

    // Keeps the watcher alive until main returns.
    let mut _watcher = None;
    if config.mimic.enabled {
        let path = PathBuf::from(&config.mimic.path);
        mimic.load(&path)?;
        if config.mimic.watch {
            _watcher = Some(MockFileWatcher::new(&path, mimic.clone()).run()?);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut server = HttpServer::new(config, mimic, echo_app());
    if let Some(handle) = metrics_handle {
        server = server.with_metrics(handle);
    }

    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let signal = wait_for_signal().await?;
    tracing::info!(?signal, "Stopping");
    shutdown.trigger();

    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
