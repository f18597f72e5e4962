//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host.rs (Host header allow-list)
//!     → cors.rs (Origin allow-list, Access-Control-Allow-Origin)
//!     → rate_limit.rs (per-client token bucket)
//!     → Pass to mocks / application
//!
//! Startup:
//!     → limits.rs (open file descriptor limit)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Each check is an independent middleware, enabled per config

pub mod cors;
pub mod host;
pub mod limits;
pub mod rate_limit;
