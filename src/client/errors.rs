//! Client error types

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the ledger service client.
///
/// These propagate to the repository caller as fatal per-call errors; any
/// retrying happens inside the client implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// No session could be acquired
    #[error("ledger session unavailable: {0}")]
    Session(String),

    /// The ledger rejected the statement
    #[error("statement rejected by the ledger: {0}")]
    Statement(String),

    /// Transport-level failure
    #[error("transport failure: {0}")]
    Transport(String),
}
