//! # DomainError
//!
//! Centralized error handling for the engagement core.
//! Adapters map backend failures onto these kinds; services decide whether
//! a kind is dropped (engagement counters) or propagated (thread state).

use thiserror::Error;

/// The primary error type for all domain and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The counter/ranking store (or the thread store on reads) cannot be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The thread document could not be saved.
    #[error("persist failed: {0}")]
    PersistError(String),

    /// The last-reply pointer was found partially set on read.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Resource not found (e.g., Thread)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),
}

impl DomainError {
    /// Transient failures are worth a retry by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::PersistError(_))
    }
}

/// A specialized Result type for engagement logic.
pub type Result<T> = std::result::Result<T, DomainError>;
