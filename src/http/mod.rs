//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, ConnectInfo)
//!     → trace / timeout / metrics layers
//!     → security middlewares (host, CORS, rate limit)
//!     → mimic (serve a mock or fall through)
//!     → application Router
//!     → Send to client
//! ```

pub mod server;

pub use server::{echo_app, HttpServer, ServerError};
