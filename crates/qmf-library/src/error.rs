//! Error types for the component library.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LibraryError {
    #[error("component '{0}' not found")]
    NotFound(String),

    #[error("component '{0}' is archived and cannot be modified")]
    Archived(String),

    #[error("component '{0}' is already archived")]
    AlreadyArchived(String),

    #[error("composite component '{0}' would introduce a cycle")]
    Cycle(String),

    #[error("composite component '{parent}' references unknown child '{child}'")]
    DanglingChild { parent: String, child: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;
