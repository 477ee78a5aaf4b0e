//! Query argument structures
//!
//! `QueryArgs` is the caller-facing description of a filtered query:
//! where-conditions, projection, ordering, pagination, and the recursive
//! flag for cascading deletes. Ordering and pagination are client-side
//! emulations; the query language itself has neither.

use chrono::{DateTime, Utc};

use super::operators::Operator;

/// A condition attached to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare value; equality, except sequences which become IN
    Value(serde_json::Value),
    /// Tagged `[operator, value]` pair
    Compare(Operator, serde_json::Value),
    /// Sub-filter on a reference field's target table
    Nested(Vec<Predicate>),
}

/// A filter predicate: field plus condition
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name, unqualified; the compiler rewrites it
    pub field: String,
    /// Condition applied to the field
    pub condition: Condition,
}

impl Predicate {
    /// Bare-value predicate (equality, or IN for sequences)
    pub fn value(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Value(value),
        }
    }

    /// Equality predicate
    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// Tagged-operator predicate
    pub fn compare(field: impl Into<String>, op: Operator, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Compare(op, value),
        }
    }

    /// Sub-filter on a reference field
    pub fn nested(field: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Nested(predicates),
        }
    }
}

/// Sort direction for client-side ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Single-key sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    /// Field to sort by
    pub field: String,
    /// Sort direction
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Arguments for filtered queries
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    /// Where-conditions, combined with AND
    pub predicates: Vec<Predicate>,
    /// Projection restriction; all columns when absent
    pub fields: Option<Vec<String>>,
    /// Client-side single-key sort
    pub order: Option<OrderSpec>,
    /// Client-side pagination limit
    pub limit: Option<usize>,
    /// Client-side pagination offset
    pub offset: Option<usize>,
    /// Cascade deletes through reference fields
    pub recursive: bool,
}

impl QueryArgs {
    /// Creates empty arguments (select-all semantics)
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds a bare-value predicate
    pub fn filter_value(self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.filter(Predicate::value(field, value))
    }

    /// Adds an equality predicate
    pub fn filter_eq(self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.filter(Predicate::eq(field, value))
    }

    /// Restricts the projection to the named fields
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Sets the client-side sort
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the client-side limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the client-side offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Requests cascading deletes through reference fields
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

/// Which side of a revision the history filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// Filter on the revision's data fields
    Data,
    /// Filter on the revision's store-assigned metadata
    Metadata,
}

impl HistoryScope {
    /// Column prefix inside the history projection
    pub fn prefix(&self) -> &'static str {
        match self {
            HistoryScope::Data => "h.data.",
            HistoryScope::Metadata => "h.metadata.",
        }
    }
}

/// Arguments for audit-history queries
#[derive(Debug, Clone)]
pub struct HistoryArgs {
    /// Equality filters, applied under the scope prefix
    pub filters: Vec<(String, serde_json::Value)>,
    /// Whether filters address data or metadata fields
    pub scope: HistoryScope,
    /// Inclusive lower time bound
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    pub end: Option<DateTime<Utc>>,
}

impl HistoryArgs {
    /// History filtered on data fields
    pub fn on_data(filters: Vec<(String, serde_json::Value)>) -> Self {
        Self {
            filters,
            scope: HistoryScope::Data,
            start: None,
            end: None,
        }
    }

    /// History filtered on store metadata
    pub fn on_metadata(filters: Vec<(String, serde_json::Value)>) -> Self {
        Self {
            filters,
            scope: HistoryScope::Metadata,
            start: None,
            end: None,
        }
    }

    /// Bounds the history window
    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}
