//! Error types and utilities shared across the workspace.
//!
//! This module provides the foundation error type that domain-specific
//! crates (`qmf-cql`, `qmf-sql`, `qmf-library`, …) extend by wrapping it in
//! their own error enums.

use std::fmt;
use thiserror::Error;

/// Foundation error type covering the common, non-domain-specific cases.
#[derive(Error, Debug)]
pub enum FoundationError {
    /// Configuration error with a descriptive message.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input with a descriptive message.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context.
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl FoundationError {
    /// Attach a context message, turning this into an `Other` variant that
    /// carries both messages.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        FoundationError::Other(anyhow::Error::new(self).context(context.to_string()))
    }
}

/// Result type alias using [`FoundationError`].
pub type Result<T> = std::result::Result<T, FoundationError>;

/// Adds `.context(...)` to any `Result<T, E>` whose error implements
/// `std::error::Error`, turning it into a `Result<T, FoundationError>`.
pub trait ErrorContext<T> {
    fn context(self, context: impl fmt::Display) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl fmt::Display) -> Result<T> {
        self.map_err(|e| FoundationError::Other(anyhow::Error::new(e).context(context.to_string())))
    }
}

/// Wraps an I/O error together with the path it happened on, for a more
/// actionable message than `std::io::Error` gives alone.
pub fn io_error_with_path(err: std::io::Error, path: &std::path::Path, action: &str) -> FoundationError {
    FoundationError::Io(std::io::Error::new(
        err.kind(),
        format!("failed to {action} '{}': {err}", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_message() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let wrapped = result.context("loading measure store");
        assert!(wrapped.is_err());
        let msg = wrapped.unwrap_err().to_string();
        assert!(msg.contains("loading measure store"));
    }
}
