//! Request mocking engine.
//!
//! # Data Flow
//! ```text
//! Load (mock document on disk / in memory):
//!     endpoint.rs (parse YAML/TOML/JSON into EndpointDefinitions)
//!     → catcher.rs (key_of each definition)
//!     → cache.rs (build MockCache off to the side, publish under write lock)
//!
//! Request:
//!     middleware.rs
//!     → form.rs (method, request URI, canonical form → RequestSignature)
//!     → catcher.rs (key_of request, Mimic::get)
//!     → hit: catcher.rs render, short-circuit
//!     → miss: wrapped handler
//! ```
//!
//! # Design Decisions
//! - Exact-match lookup only: no wildcards, path parameters or scripting
//! - `Mimic` is an explicit context shared via `Arc`, not global state
//! - Misses and unparsable forms are normal fall-through, never errors

pub mod cache;
pub mod catcher;
pub mod endpoint;
pub mod error;
pub mod form;
pub mod middleware;

pub use cache::{Mimic, MockCache};
pub use catcher::{Catcher, JsonCatcher, KeySubject, XmlCatcher};
pub use endpoint::{DocumentFormat, EndpointDefinition, HeaderList, MockDocument, ResponseDefinition};
pub use error::{MimicError, MimicResult};
pub use form::RequestSignature;
pub use middleware::mimic_middleware;
