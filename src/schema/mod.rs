//! Schema model and document mapper
//!
//! A schema is a declarative, ordered description of one logical table:
//! field kinds, primary key, nullability, defaults, secondary indexes,
//! nested models, and references into other tables. The mapper walks
//! untyped JSON input against a schema, validates and binds values, and
//! resolves cross-table references through the owning repository.
//!
//! # Design Principles
//!
//! - Closed field-kind enumeration, matched exhaustively
//! - Field order is declaration order and is semantically meaningful
//! - Primary key resolved once, at construction (first declared wins)
//! - Validation failures are returned values, never panics
//! - The mapper works on a per-call output tree, never the canonical schema

mod errors;
mod mapper;
mod types;

pub use errors::{SchemaError, ValidationError, ValidationErrorKind};
pub use mapper::{
    map_document, DepthPolicy, FieldValue, MappedDocument, MappedField, MapperError, MapperOptions,
};
pub use types::{FieldDef, FieldDefault, FieldKind, SchemaModel};
