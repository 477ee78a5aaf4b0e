//! Schema and validation error types
//!
//! Validation failures are plain values collected into lists and handed back
//! to the caller; only schema construction problems are hard errors.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The closed set of validation failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Required field absent with no default and null not allowed
    Missing,
    /// Supplied value does not match the declared kind
    InvalidValue,
    /// Primary-key value already exists in the table
    PkReferenceDuplicate,
    /// Referenced document could not be found in the target table
    DocumentReferenceNotFound,
    /// History bound lies in the future
    InvalidDates,
}

impl ValidationErrorKind {
    /// Returns the stable error code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorKind::Missing => "missing",
            ValidationErrorKind::InvalidValue => "invalid_value",
            ValidationErrorKind::PkReferenceDuplicate => "pk_reference_duplicate",
            ValidationErrorKind::DocumentReferenceNotFound => "document_reference_not_found",
            ValidationErrorKind::InvalidDates => "invalid_dates",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single validation failure.
///
/// `field` is a dotted path for nested failures (`owner.address.city`,
/// `tags[2].label`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted field path
    pub field: String,
    /// Failure kind
    pub kind: ValidationErrorKind,
    /// Offending value, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Expected kind or condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Received kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

impl ValidationError {
    /// Required field absent
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::Missing,
            value: None,
            expected: None,
            received: None,
        }
    }

    /// Value does not match the declared kind
    pub fn invalid_value(
        field: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::InvalidValue,
            value: Some(value),
            expected: Some(expected.into()),
            received: Some(received.into()),
        }
    }

    /// Primary-key value already taken
    pub fn pk_duplicate(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::PkReferenceDuplicate,
            value: Some(value),
            expected: None,
            received: None,
        }
    }

    /// Referenced document not found
    pub fn reference_not_found(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::DocumentReferenceNotFound,
            value: Some(value),
            expected: None,
            received: None,
        }
    }

    /// History bound in the future
    pub fn invalid_dates(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::InvalidDates,
            value: None,
            expected: None,
            received: None,
        }
    }

    /// Re-roots this error under a parent field path
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.field = if self.field.is_empty() {
            prefix.to_string()
        } else {
            format!("{}.{}", prefix, self.field)
        };
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field, self.kind)?;
        if let (Some(expected), Some(received)) = (&self.expected, &self.received) {
            write!(f, " (expected {}, received {})", expected, received)?;
        }
        Ok(())
    }
}

/// Errors raised while assembling a schema or repository
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// A reference field targets a table whose schema resolves no primary key
    #[error("reference field '{field}' targets table '{table}' which resolves no primary key")]
    ReferenceWithoutPrimaryKey { field: String, table: String },

    /// A field kind requires a companion the definition does not carry
    #[error("field '{field}' of kind {kind} requires {requirement}")]
    IncompleteField {
        field: String,
        kind: &'static str,
        requirement: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ValidationErrorKind::Missing.code(), "missing");
        assert_eq!(ValidationErrorKind::InvalidValue.code(), "invalid_value");
        assert_eq!(
            ValidationErrorKind::PkReferenceDuplicate.code(),
            "pk_reference_duplicate"
        );
        assert_eq!(
            ValidationErrorKind::DocumentReferenceNotFound.code(),
            "document_reference_not_found"
        );
        assert_eq!(ValidationErrorKind::InvalidDates.code(), "invalid_dates");
    }

    #[test]
    fn test_prefixed_builds_dotted_path() {
        let err = ValidationError::missing("city").prefixed("address").prefixed("owner");
        assert_eq!(err.field, "owner.address.city");
    }

    #[test]
    fn test_prefixed_on_rootless_error() {
        let err = ValidationError::missing("").prefixed("owner");
        assert_eq!(err.field, "owner");
    }

    #[test]
    fn test_display_includes_expectation() {
        let err = ValidationError::invalid_value("age", "int", "string", json!("x"));
        let text = err.to_string();
        assert!(text.contains("age"));
        assert!(text.contains("expected int"));
        assert!(text.contains("received string"));
    }

    #[test]
    fn test_errors_serialize_with_stable_codes() {
        let err = ValidationError::missing("name");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, json!({"field": "name", "kind": "missing"}));

        let err = ValidationError::reference_not_found("owner", json!("ghost"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], json!("document_reference_not_found"));
        assert_eq!(json["value"], json!("ghost"));
    }
}
