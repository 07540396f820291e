use thiserror::Error;

use iamkit_auth::DenialReason;
use iamkit_core::{DomainError, PrincipalId};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unknown principal {0}")]
    UnknownPrincipal(PrincipalId),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// The invariant guard refused the mutation; nothing was written.
    #[error("mutation denied: {0}")]
    GuardDenied(DenialReason),

    /// A lock was poisoned by a panicking writer.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            StoreError::GuardDenied(reason) => Some(*reason),
            _ => None,
        }
    }
}
