//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Report which one arrived so the caller can trigger shutdown

use std::io;

/// Signal that ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Wait until the process is asked to stop.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok(ShutdownSignal::Interrupt)
        }
        _ = terminate.recv() => Ok(ShutdownSignal::Terminate),
    }
}

/// Wait until the process is asked to stop.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
