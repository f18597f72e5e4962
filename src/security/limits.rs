//! Process resource limits.
//!
//! # Responsibilities
//! - Raise the open file descriptor limit at startup
//! - Log the limit before and after the change
//!
//! # Design Decisions
//! - Soft and hard limits are set to the same value
//! - Unsupported platforms report `ErrorKind::Unsupported`

use std::io;

/// Current `(soft, hard)` open file limit.
#[cfg(unix)]
pub fn current_open_files() -> io::Result<(u64, u64)> {
    rlimit::getrlimit(rlimit::Resource::NOFILE)
}

#[cfg(not(unix))]
pub fn current_open_files() -> io::Result<(u64, u64)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "open file limits are not supported on this platform",
    ))
}

/// Set both the soft and hard open file limit to `limit`.
///
/// Returns the limit read back after the change.
pub fn raise_open_files(limit: u64) -> io::Result<(u64, u64)> {
    if limit == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "open file limit must be greater than zero",
        ));
    }

    let (soft, hard) = current_open_files()?;
    tracing::info!(soft, hard, "Open file limit");

    set_open_files(limit)?;

    let (soft, hard) = current_open_files()?;
    tracing::info!(soft, hard, "Open file limit applied");
    Ok((soft, hard))
}

#[cfg(unix)]
fn set_open_files(limit: u64) -> io::Result<()> {
    rlimit::setrlimit(rlimit::Resource::NOFILE, limit, limit)
}

#[cfg(not(unix))]
fn set_open_files(_limit: u64) -> io::Result<()> {
    current_open_files().map(|_| ())
}
