//! HTTP middleware kit: request mocking plus CORS, host allow-list, rate
//! limiting, metrics and profiling for Axum servers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mimic;
pub mod observability;
pub mod security;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mimic::Mimic;
