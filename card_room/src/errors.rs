//! Service-level error taxonomy.
//!
//! Everything the coordinator surfaces to its callers collapses into
//! `ServiceError`; the HTTP collaborator maps each kind to a status code.

use thiserror::Error;

use crate::game::engine::{EngineError, InvariantViolation};
use crate::store::StoreError;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ServiceError {
    /// Unknown game code or player id.
    #[error("not found")]
    NotFound,
    /// PIN mismatch, or a creator-only operation from another seat.
    #[error("unauthorized")]
    Unauthorized,
    /// The engine rejected the operation in its current state.
    #[error("{0}")]
    InvalidState(String),
    /// Malformed input: bad amount, unknown action, invalid settings.
    #[error("{0}")]
    InvalidArgument(String),
    /// The operation raced a conflicting change.
    #[error("conflict")]
    Conflict,
    /// Store timeout; already retried once.
    #[error("temporarily unavailable")]
    Transient,
    /// Invariant violation or unexpected backend failure. Details are
    /// logged, never surfaced.
    #[error("internal error")]
    Internal,
}

impl From<EngineError> for ServiceError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::PlayerNotFound => Self::NotFound,
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<InvariantViolation> for ServiceError {
    fn from(value: InvariantViolation) -> Self {
        tracing::warn!("{value}");
        Self::Internal
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Timeout(_) => Self::Transient,
            other => {
                tracing::warn!("store failure: {other}");
                Self::Internal
            }
        }
    }
}
