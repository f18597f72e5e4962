//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!
//! mock document (YAML/TOML/JSON):
//!     watcher.rs detects change
//!     → Mimic::load parses and re-indexes
//!     → atomic swap of the published MockCache
//!     → failed reloads keep the previous mocks
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::CatcherKind;
pub use schema::ServerConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
