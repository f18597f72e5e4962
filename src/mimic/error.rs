//! Error taxonomy for the mock engine.

use thiserror::Error;

/// Errors raised while loading, indexing, looking up or rendering mocks.
#[derive(Debug, Error)]
pub enum MimicError {
    /// The mock document could not be read.
    #[error("failed to read mock document: {0}")]
    Io(#[from] std::io::Error),

    /// The mock document is malformed.
    #[error("malformed mock document: {0}")]
    Parse(String),

    /// A lookup key could not be derived from the subject.
    #[error("cannot derive lookup key: {0}")]
    Key(String),

    /// No mock is registered under the key. This is the normal miss outcome.
    #[error("mock not found: {0}")]
    NotFound(String),

    /// The declared response is missing or could not be written.
    #[error("render failed: {0}")]
    Render(String),
}

impl MimicError {
    /// True for the expected "no such mock" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MimicError::NotFound(_))
    }
}

/// Convenience alias used across the mimic module.
pub type MimicResult<T> = Result<T, MimicError>;
