//! Error types for CQL generation, linting, and remote translation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CqlError {
    #[error("CQL generation error: {0}")]
    Generation(String),

    #[error("CQL lint error: {0}")]
    Lint(String),

    #[error("remote ELM translator error: {0}")]
    Translator(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CqlError>;
