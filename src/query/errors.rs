//! Query compiler error types

use thiserror::Error;

use crate::codec::CodecError;

/// Result type for query compilation
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while compiling statements
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// A predicate or assignment names a field the schema does not declare
    #[error("field '{field}' is not defined for table '{table}'")]
    UnknownField { table: String, field: String },

    /// An operation requires a primary key the schema does not resolve
    #[error("table '{0}' resolves no primary key")]
    MissingPrimaryKey(String),

    /// DELETE would run without a where-clause
    #[error("refusing to compile an unfiltered DELETE for table '{0}'")]
    UnfilteredDelete(String),

    /// UPDATE would run without a where-clause
    #[error("refusing to compile an unfiltered UPDATE for table '{0}'")]
    UnfilteredUpdate(String),

    /// A history bound lies in the future
    #[error("history bounds must not lie in the future")]
    InvalidDates,

    /// A condition cannot be rendered for the field it addresses
    #[error("invalid filter for field '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    /// A reference field reached the compiler without being resolved
    #[error("reference field '{0}' is unresolved at compile time")]
    UnresolvedReference(String),

    /// A mapped value could not be converted for the wire
    #[error(transparent)]
    Codec(#[from] CodecError),
}
