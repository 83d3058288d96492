//! Error taxonomy shared by the console components.

use crate::service::ServiceError;

/// Errors raised by console operations.
///
/// Stale fetch responses are not errors; they are reported through
/// [`crate::orchestrator::FetchOutcome::Stale`] and dropped.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Missing or out-of-range input. Never reaches the network layer.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Blocked by policy before any network call.
    #[error("{0}")]
    Policy(String),
    /// An external collaborator returned a failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Stored or imported data could not be understood.
    #[error("invalid format: {0}")]
    PersistenceFormat(String),
    /// The persistent store itself failed (I/O).
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ConsoleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }
}
