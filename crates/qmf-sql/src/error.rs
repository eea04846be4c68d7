//! Error types for SQL generation and schema binding.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SqlError {
    #[error("unknown resource type '{0}' has no schema table")]
    UnknownResourceType(String),

    #[error("unknown column '{table}.{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("unknown timing anchor '{0}'")]
    UnknownTimingAnchor(String),
}

pub type Result<T> = std::result::Result<T, SqlError>;
