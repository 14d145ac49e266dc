pub mod artifacts;
pub mod cache;
pub mod market_data;

use thiserror::Error;

/// Failure reported by an adapter behind one of the repository ports.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    /// Source could not be reached or answered with a transient failure.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("storage error: {0}")]
    Storage(String),
}
