use thiserror::Error;

/// Core error type shared across datamask crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A pattern configuration cannot be compiled.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    /// A descriptor violates internal invariants.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by datamask crates.
pub type Result<T> = std::result::Result<T, Error>;
