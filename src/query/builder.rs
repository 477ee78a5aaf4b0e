//! Statement builders
//!
//! Inserts use the positional-parameter style: the mapped document travels
//! as one binary-encoded parameter. Filters, updates, and deletes embed
//! literals in the statement text; string scalars are always escaped by
//! doubling single quotes before embedding.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::codec::{CodecError, Value};
use crate::schema::{FieldDef, FieldKind, FieldValue, MappedDocument, SchemaModel};

use super::args::{Condition, HistoryArgs, Predicate, QueryArgs};
use super::errors::{QueryError, QueryResult};
use super::operators::Operator;

/// A compiled statement: query text plus positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text in the ledger's query language
    pub text: String,
    /// Parameters bound to `?` placeholders, in order
    pub params: Vec<Value>,
}

impl Statement {
    /// Statement with no bound parameters
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Statement with positional parameters
    pub fn with_params(text: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

/// Compiled update: the local statement plus cascade targets.
///
/// Cascade targets are reference fields named in the update's field set;
/// the repository compiles and executes each referenced table's update
/// independently, fire-and-forget.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub statement: Statement,
    /// Dotted paths of reference fields excluded from the local SET
    pub cascades: Vec<String>,
}

/// Builds a SELECT with reference joins and an optional projection.
///
/// Column order follows schema declaration order. Every reference field
/// joins the target table on its primary key and projects the target
/// aliased under the reference field's name.
pub fn build_select(table: &str, schema: &SchemaModel, args: &QueryArgs) -> QueryResult<Statement> {
    let mut columns = Vec::new();
    let mut joins = String::new();

    for (name, def) in schema.fields() {
        if let Some(wanted) = &args.fields {
            if !wanted.iter().any(|f| f == name) {
                continue;
            }
        }
        match (&def.kind, &def.reference) {
            (FieldKind::Reference, Some(target)) => {
                let target_table = target.table();
                let target_pk = target
                    .schema()
                    .primary_key_name()
                    .ok_or_else(|| QueryError::MissingPrimaryKey(target_table.to_string()))?;
                joins.push_str(&format!(
                    " JOIN {0} ON {1}.{2} = {0}.{3}",
                    target_table, table, name, target_pk
                ));
                columns.push(format!("{} AS {}", target_table, name));
            }
            _ => columns.push(format!("{}.{}", table, name)),
        }
    }

    let where_sql = build_where(&args.predicates, table, schema)?;
    Ok(Statement::text_only(format!(
        "SELECT {} FROM {}{}{};",
        columns.join(", "),
        table,
        joins,
        where_sql
    )))
}

/// Compiles where-conditions into a WHERE clause.
///
/// Bare field names are rewritten to `table.field`; sub-filters on reference
/// fields address the target table. An empty condition list compiles to an
/// always-true predicate (select-all semantics).
pub fn build_where(
    predicates: &[Predicate],
    table: &str,
    schema: &SchemaModel,
) -> QueryResult<String> {
    if predicates.is_empty() {
        return Ok(" WHERE 1 = 1".to_string());
    }

    let mut parts = Vec::new();
    for predicate in predicates {
        let def = schema
            .get(&predicate.field)
            .ok_or_else(|| QueryError::UnknownField {
                table: table.to_string(),
                field: predicate.field.clone(),
            })?;

        match &predicate.condition {
            Condition::Nested(subs) => {
                let target = reference_target(def, &predicate.field)?;
                let target_table = target.table();
                let target_schema = target.schema();
                for sub in subs {
                    if !target_schema.contains(&sub.field) {
                        return Err(QueryError::UnknownField {
                            table: target_table.to_string(),
                            field: sub.field.clone(),
                        });
                    }
                    parts.push(render_condition(
                        &format!("{}.{}", target_table, sub.field),
                        &sub.condition,
                        &sub.field,
                    )?);
                }
            }
            condition => {
                parts.push(render_condition(
                    &format!("{}.{}", table, predicate.field),
                    condition,
                    &predicate.field,
                )?);
            }
        }
    }

    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// Builds an INSERT carrying the mapped document as one parameter
pub fn build_insert(table: &str, document: Value) -> Statement {
    Statement::with_params(format!("INSERT INTO {} VALUE ?;", table), vec![document])
}

/// Converts a mapped document into the wire value an insert binds.
///
/// Null bindings appear as explicit nulls; skipped fields are omitted; a
/// pending structured reference reaching this point is a compile error —
/// the repository resolves those before compiling.
pub fn document_value(document: &MappedDocument, schema: &SchemaModel) -> QueryResult<Value> {
    let mut fields = Vec::new();
    for mapped in document.fields() {
        let def = schema.get(&mapped.name);
        match &mapped.value {
            FieldValue::Skipped => {}
            FieldValue::Null => fields.push((mapped.name.clone(), Value::Null)),
            FieldValue::ForeignKey(json) => {
                fields.push((mapped.name.clone(), Value::from_json(json)?))
            }
            FieldValue::PendingReference(_) => {
                return Err(QueryError::UnresolvedReference(mapped.name.clone()))
            }
            FieldValue::Data(json) => fields.push((mapped.name.clone(), typed_value(json, def)?)),
        }
    }
    Ok(Value::Struct(fields))
}

/// Builds an UPDATE plan: dotted assignments plus cascade targets
pub fn build_update(
    table: &str,
    fields: &serde_json::Map<String, serde_json::Value>,
    schema: &SchemaModel,
    predicates: &[Predicate],
) -> QueryResult<UpdatePlan> {
    if predicates.is_empty() {
        return Err(QueryError::UnfilteredUpdate(table.to_string()));
    }

    let mut assignments = Vec::new();
    let mut cascades = Vec::new();
    collect_assignments(table, fields, schema, "", &mut assignments, &mut cascades)?;

    let where_sql = build_where(predicates, table, schema)?;
    let statement = Statement::text_only(format!(
        "UPDATE {} SET {}{};",
        table,
        assignments.join(", "),
        where_sql
    ));

    Ok(UpdatePlan {
        statement,
        cascades,
    })
}

/// Builds a DELETE, refusing to compile without a where-clause
pub fn build_delete(
    table: &str,
    schema: &SchemaModel,
    predicates: &[Predicate],
) -> QueryResult<Statement> {
    if predicates.is_empty() {
        return Err(QueryError::UnfilteredDelete(table.to_string()));
    }
    let where_sql = build_where(predicates, table, schema)?;
    Ok(Statement::text_only(format!(
        "DELETE FROM {}{};",
        table, where_sql
    )))
}

/// Builds a history projection, optionally bounded by a time window.
///
/// Bounds after `now` are rejected before any query is issued.
pub fn build_history(
    table: &str,
    args: &HistoryArgs,
    now: DateTime<Utc>,
) -> QueryResult<Statement> {
    if args.start.is_some_and(|start| start > now) || args.end.is_some_and(|end| end > now) {
        return Err(QueryError::InvalidDates);
    }

    let mut from = format!("history({}", table);
    if let Some(start) = args.start {
        from.push_str(&format!(
            ", `{}`",
            start.to_rfc3339_opts(SecondsFormat::Micros, true)
        ));
    }
    if let Some(end) = args.end {
        from.push_str(&format!(
            ", `{}`",
            end.to_rfc3339_opts(SecondsFormat::Micros, true)
        ));
    }
    from.push(')');

    let where_sql = if args.filters.is_empty() {
        String::new()
    } else {
        let mut parts = Vec::new();
        for (field, value) in &args.filters {
            parts.push(format!(
                "{}{}{}{}",
                args.scope.prefix(),
                field,
                Operator::Eq.sql(),
                render_literal(value, field)?
            ));
        }
        format!(" WHERE {}", parts.join(" AND "))
    };

    Ok(Statement::text_only(format!(
        "SELECT * FROM {} AS h{};",
        from, where_sql
    )))
}

/// Builds a select over the committed-revision view.
///
/// Filter keys address the view directly (`metadata.id`, `data.name`).
pub fn build_committed(
    table: &str,
    filters: &[(String, serde_json::Value)],
) -> QueryResult<Statement> {
    let where_sql = if filters.is_empty() {
        " WHERE 1 = 1".to_string()
    } else {
        let mut parts = Vec::new();
        for (field, value) in filters {
            parts.push(format!(
                "{}{}{}",
                field,
                Operator::Eq.sql(),
                render_literal(value, field)?
            ));
        }
        format!(" WHERE {}", parts.join(" AND "))
    };

    Ok(Statement::text_only(format!(
        "SELECT * FROM _ql_committed_{}{};",
        table, where_sql
    )))
}

fn reference_target<'a>(
    def: &'a FieldDef,
    field: &str,
) -> QueryResult<&'a std::sync::Arc<crate::repository::Repository>> {
    if def.kind != FieldKind::Reference {
        return Err(QueryError::InvalidFilter {
            field: field.to_string(),
            reason: "sub-filters only apply to reference fields".to_string(),
        });
    }
    def.reference.as_ref().ok_or(QueryError::InvalidFilter {
        field: field.to_string(),
        reason: "reference field has no target repository".to_string(),
    })
}

fn render_condition(qualified: &str, condition: &Condition, field: &str) -> QueryResult<String> {
    match condition {
        Condition::Value(value) if value.is_array() => Ok(format!(
            "{}{}{}",
            qualified,
            Operator::In.sql(),
            render_literal(value, field)?
        )),
        Condition::Value(value) => Ok(format!(
            "{}{}{}",
            qualified,
            Operator::Eq.sql(),
            render_literal(value, field)?
        )),
        Condition::Compare(op, value) => Ok(format!(
            "{}{}{}",
            qualified,
            op.sql(),
            render_literal(value, field)?
        )),
        Condition::Nested(_) => Err(QueryError::InvalidFilter {
            field: field.to_string(),
            reason: "sub-filters cannot nest further".to_string(),
        }),
    }
}

/// Renders a scalar or sequence literal for embedding in statement text.
///
/// Strings are single-quoted with embedded quotes doubled; numbers and
/// booleans embed unquoted; sequences render as a bracketed list.
fn render_literal(value: &serde_json::Value, field: &str) -> QueryResult<String> {
    match value {
        serde_json::Value::Null => Ok("NULL".to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) => Ok(quote_str(s)),
        serde_json::Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(render_literal(item, field)?);
            }
            Ok(format!("[{}]", rendered.join(",")))
        }
        serde_json::Value::Object(_) => Err(QueryError::InvalidFilter {
            field: field.to_string(),
            reason: "structured values cannot be rendered as literals".to_string(),
        }),
    }
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Renders a document-shaped literal for update assignments of opaque and
/// sequence values: single-quoted keys and strings, plain scalars.
fn render_document_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_str(s),
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_document_literal).collect();
            format!("[{}]", rendered.join(","))
        }
        serde_json::Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(key, field_value)| {
                    format!("{}: {}", quote_str(key), render_document_literal(field_value))
                })
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

fn collect_assignments(
    prefix: &str,
    fields: &serde_json::Map<String, serde_json::Value>,
    schema: &SchemaModel,
    cascade_base: &str,
    assignments: &mut Vec<String>,
    cascades: &mut Vec<String>,
) -> QueryResult<()> {
    for (name, value) in fields {
        let def = schema.get(name).ok_or_else(|| QueryError::UnknownField {
            table: prefix.to_string(),
            field: name.clone(),
        })?;

        let cascade_path = if cascade_base.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", cascade_base, name)
        };

        match def.kind {
            FieldKind::Reference => cascades.push(cascade_path),
            FieldKind::Object => match (value.as_object(), &def.nested) {
                (Some(nested_fields), Some(nested_schema)) => collect_assignments(
                    &format!("{}.{}", prefix, name),
                    nested_fields,
                    nested_schema,
                    &cascade_path,
                    assignments,
                    cascades,
                )?,
                _ => assignments.push(format!(
                    "{}.{} = {}",
                    prefix,
                    name,
                    render_document_literal(value)
                )),
            },
            FieldKind::Json => assignments.push(format!(
                "{}.{} = {}",
                prefix,
                name,
                render_document_literal(value)
            )),
            _ => assignments.push(format!(
                "{}.{} = {}",
                prefix,
                name,
                render_literal(value, name)?
            )),
        }
    }
    Ok(())
}

fn typed_value(json: &serde_json::Value, def: Option<&FieldDef>) -> QueryResult<Value> {
    let Some(def) = def else {
        return Ok(Value::from_json(json)?);
    };
    match (def.kind, json) {
        (FieldKind::Timestamp, serde_json::Value::String(s)) => {
            let parsed = DateTime::parse_from_rfc3339(s).map_err(|_| {
                CodecError::UnsupportedShape(format!("'{}' is not an RFC 3339 timestamp", s))
            })?;
            Ok(Value::Timestamp(parsed.with_timezone(&Utc)))
        }
        (FieldKind::Object, serde_json::Value::Object(map)) => {
            let mut fields = Vec::with_capacity(map.len());
            for (name, field_value) in map {
                let nested_def = def.nested.as_ref().and_then(|schema| schema.get(name));
                fields.push((name.clone(), typed_value(field_value, nested_def)?));
            }
            Ok(Value::Struct(fields))
        }
        (FieldKind::Array, serde_json::Value::Array(items)) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match (item, &def.nested) {
                    (serde_json::Value::Object(map), Some(element_schema)) => {
                        let mut fields = Vec::with_capacity(map.len());
                        for (name, field_value) in map {
                            fields.push((
                                name.clone(),
                                typed_value(field_value, element_schema.get(name))?,
                            ));
                        }
                        list.push(Value::Struct(fields));
                    }
                    _ => list.push(Value::from_json(item)?),
                }
            }
            Ok(Value::List(list))
        }
        _ => Ok(Value::from_json(json)?),
    }
}
