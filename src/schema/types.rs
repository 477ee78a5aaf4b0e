//! Schema type definitions
//!
//! Supported field kinds:
//! - string: UTF-8 string
//! - number: any numeric value
//! - integer: 64-bit signed integer
//! - boolean
//! - timestamp: RFC 3339 point in time
//! - object: nested document with its own field model
//! - array: sequence, optionally with a per-element model
//! - json: opaque value, accepted unchanged
//! - reference: primary key of a document in another table

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::repository::Repository;

/// The closed set of semantic field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Timestamp,
    Object,
    Array,
    /// Opaque value, no type check and no recursion
    Json,
    /// Foreign key into another repository's table
    Reference,
}

impl FieldKind {
    /// Returns the kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Json => "json",
            FieldKind::Reference => "reference",
        }
    }
}

/// Default applied when input omits a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    /// A fixed value
    Value(serde_json::Value),
    /// The moment of mapping, as an RFC 3339 string
    Now,
}

impl FieldDefault {
    /// Materializes the default into a concrete value
    pub fn resolve(&self) -> serde_json::Value {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Now => serde_json::Value::String(
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
        }
    }
}

/// A single field descriptor
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Semantic kind
    pub kind: FieldKind,
    /// Whether this field is the table's primary key
    pub primary_key: bool,
    /// Whether an absent value may bind to null
    pub allow_null: bool,
    /// Default applied when input omits the field
    pub default: Option<FieldDefault>,
    /// Whether a secondary index should exist for this field
    pub indexed: bool,
    /// Nested model for object fields and array elements
    pub nested: Option<SchemaModel>,
    /// Target repository for reference fields and reference array elements
    pub reference: Option<Arc<Repository>>,
}

impl FieldDef {
    fn of_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            primary_key: false,
            allow_null: false,
            default: None,
            indexed: false,
            nested: None,
            reference: None,
        }
    }

    /// Create a string field
    pub fn string() -> Self {
        Self::of_kind(FieldKind::String)
    }

    /// Create a numeric field
    pub fn number() -> Self {
        Self::of_kind(FieldKind::Number)
    }

    /// Create an integer field
    pub fn integer() -> Self {
        Self::of_kind(FieldKind::Integer)
    }

    /// Create a boolean field
    pub fn boolean() -> Self {
        Self::of_kind(FieldKind::Boolean)
    }

    /// Create a timestamp field
    pub fn timestamp() -> Self {
        Self::of_kind(FieldKind::Timestamp)
    }

    /// Create a nested object field with its own model
    pub fn object(nested: SchemaModel) -> Self {
        let mut def = Self::of_kind(FieldKind::Object);
        def.nested = Some(nested);
        def
    }

    /// Create an array field whose elements follow the given model
    pub fn array_of(element: SchemaModel) -> Self {
        let mut def = Self::of_kind(FieldKind::Array);
        def.nested = Some(element);
        def
    }

    /// Create an array field with untyped elements
    pub fn array() -> Self {
        Self::of_kind(FieldKind::Array)
    }

    /// Create an array field whose elements reference another table
    pub fn array_of_references(target: Arc<Repository>) -> Self {
        let mut def = Self::of_kind(FieldKind::Array);
        def.reference = Some(target);
        def
    }

    /// Create an opaque json field
    pub fn json() -> Self {
        Self::of_kind(FieldKind::Json)
    }

    /// Create a reference field targeting another repository
    pub fn reference(target: Arc<Repository>) -> Self {
        let mut def = Self::of_kind(FieldKind::Reference);
        def.reference = Some(target);
        def
    }

    /// Marks this field as the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allows an absent value to bind as null
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Sets a fixed default value
    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(FieldDefault::Value(value));
        self
    }

    /// Defaults the field to the mapping time
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }

    /// Requests a secondary index for this field
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Ordered mapping of field name to descriptor.
///
/// Iteration order is declaration order; the compiler derives column order
/// from it. The primary key is resolved once at construction: the first
/// field declared with `primary_key` wins, any later ones are ignored.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    fields: Vec<(String, FieldDef)>,
    primary_key: Option<usize>,
}

impl SchemaModel {
    /// Creates an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, preserving declaration order
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        let name = name.into();
        if def.primary_key && self.primary_key.is_none() {
            self.primary_key = Some(self.fields.len());
        }
        self.fields.push((name, def));
        self
    }

    /// Iterates fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Looks up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, def)| def)
    }

    /// Returns true if the model declares the field
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the resolved primary-key field name, if any
    pub fn primary_key_name(&self) -> Option<&str> {
        self.primary_key
            .and_then(|idx| self.fields.get(idx))
            .map(|(name, _)| name.as_str())
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no fields are declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends ledger-managed `createdAt`/`updatedAt` timestamp fields.
    ///
    /// Both default to the mapping time; `updatedAt` is refreshed by
    /// repository updates.
    pub fn with_timestamps(self) -> Self {
        self.field("createdAt", FieldDef::timestamp().default_now())
            .field("updatedAt", FieldDef::timestamp().default_now())
    }
}
