//! Errors for building and editing the role-permission data.

use thiserror::Error;

/// Result of a data-shaping operation.
pub type DomainResult<T> = Result<T, DomainError>;

/// Authorization decisions and guard verdicts never surface as errors; this
/// type covers the data-shaping operations around them (building graphs,
/// parsing identifiers, looking up names).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input, such as an empty role or permission name.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An id string did not parse as a Uuid.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A role, permission or principal the operation names does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A role or permission name, or a principal id, is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
