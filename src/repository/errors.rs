//! Repository error types

use thiserror::Error;

use crate::client::ClientError;
use crate::codec::CodecError;
use crate::query::QueryError;
use crate::schema::{MapperError, ValidationError};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced by repository operations.
///
/// Validation failures carry the full error list so callers can aggregate
/// and report; everything else is a fatal per-call failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Input failed schema validation
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// Statement compilation failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A parameter or result row could not be (de)coded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The ledger client failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A result row did not carry the expected shape
    #[error("malformed result row: {0}")]
    MalformedRecord(String),
}

impl RepositoryError {
    /// Returns the validation error list, when this is a validation failure
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            RepositoryError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<MapperError> for RepositoryError {
    fn from(error: MapperError) -> Self {
        match error {
            MapperError::Validation(errors) => RepositoryError::Validation(errors),
            MapperError::Lookup(inner) => *inner,
        }
    }
}
