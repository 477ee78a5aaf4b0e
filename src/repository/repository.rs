//! Repository orchestration
//!
//! Control flow for a write: map the input against the schema, resolve
//! pending structured references by inserting into their target tables,
//! compile the statement, encode the parameters, execute through the
//! connection, decode the result rows.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};

use crate::client::Connection;
use crate::codec::{decode_bytes, encode, Value};
use crate::query::{
    build_committed, build_delete, build_history, build_insert, build_select, build_update,
    document_value, HistoryArgs, QueryArgs, QueryError, Statement,
};
use crate::schema::{
    map_document, FieldDef, FieldKind, FieldValue, MapperOptions, SchemaError, SchemaModel,
};

use super::errors::{RepositoryError, RepositoryResult};
use super::record::DocumentRecord;
use super::shaping::shape_results;

/// Repository configuration
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Append ledger-managed createdAt/updatedAt timestamp fields
    pub timestamps: bool,
    /// Create the table on first insert when the catalog does not list it
    pub auto_create_tables: bool,
    /// Mapper configuration for validation
    pub mapper: MapperOptions,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            timestamps: false,
            auto_create_tables: true,
            mapper: MapperOptions::default(),
        }
    }
}

impl RepositoryOptions {
    /// Enables the managed timestamp fields
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Disables table auto-creation on insert
    pub fn without_auto_create(mut self) -> Self {
        self.auto_create_tables = false;
        self
    }

    /// Overrides the mapper configuration
    pub fn with_mapper(mut self, mapper: MapperOptions) -> Self {
        self.mapper = mapper;
        self
    }
}

/// One logical ledger table: schema, compiled statements, and CRUD plus
/// audit-history operations.
pub struct Repository {
    connection: Arc<Connection>,
    table: String,
    schema: SchemaModel,
    options: RepositoryOptions,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Builds a repository over one logical table.
    ///
    /// Validates that every reference field carries a target whose schema
    /// resolves a primary key, and that object fields carry a nested model.
    /// With `timestamps` enabled, managed createdAt/updatedAt fields are
    /// appended to the schema.
    pub fn new(
        connection: Arc<Connection>,
        table: impl Into<String>,
        schema: SchemaModel,
        options: RepositoryOptions,
    ) -> Result<Arc<Self>, SchemaError> {
        let table = table.into();
        let schema = if options.timestamps {
            schema.with_timestamps()
        } else {
            schema
        };

        for (name, def) in schema.fields() {
            match def.kind {
                FieldKind::Reference => match &def.reference {
                    None => {
                        return Err(SchemaError::IncompleteField {
                            field: name.to_string(),
                            kind: "reference",
                            requirement: "a target repository",
                        })
                    }
                    Some(target) if target.schema().primary_key_name().is_none() => {
                        return Err(SchemaError::ReferenceWithoutPrimaryKey {
                            field: name.to_string(),
                            table: target.table().to_string(),
                        })
                    }
                    _ => {}
                },
                FieldKind::Object if def.nested.is_none() => {
                    return Err(SchemaError::IncompleteField {
                        field: name.to_string(),
                        kind: "object",
                        requirement: "a nested model",
                    })
                }
                _ => {}
            }
        }

        Ok(Arc::new(Self {
            connection,
            table,
            schema,
            options,
        }))
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The resolved schema (including managed timestamp fields)
    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// The shared connection
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub(crate) async fn ensure_index(&self, field: &str) -> RepositoryResult<()> {
        self.connection
            .ensure_index(&self.table, field)
            .await
            .map_err(RepositoryError::from)
    }

    /// Encodes parameters, executes, and decodes result rows
    async fn run(&self, statement: &Statement) -> RepositoryResult<Vec<Value>> {
        let params: Vec<Vec<u8>> = statement.params.iter().map(encode).collect();
        let rows = self.connection.execute(&statement.text, &params).await?;
        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            decoded.push(decode_bytes(row)?);
        }
        Ok(decoded)
    }

    /// Every record in the table. Loads the full result set; there is no
    /// server-side pagination.
    pub async fn get_all(&self) -> RepositoryResult<Vec<serde_json::Value>> {
        self.get_by(QueryArgs::new()).await
    }

    /// Records matching the supplied arguments, shaped client-side
    pub async fn get_by(&self, args: QueryArgs) -> RepositoryResult<Vec<serde_json::Value>> {
        let statement = build_select(&self.table, &self.schema, &args)?;
        let rows = self.run(&statement).await?;
        let results = rows.iter().map(Value::to_json).collect();
        Ok(shape_results(
            results,
            args.order.as_ref(),
            args.offset,
            args.limit,
        ))
    }

    /// First record matching the supplied arguments
    pub async fn get_one_by(&self, args: QueryArgs) -> RepositoryResult<Option<serde_json::Value>> {
        Ok(self.get_by(args).await?.into_iter().next())
    }

    /// Record whose primary key equals the value
    pub async fn get_by_pk(
        &self,
        value: &serde_json::Value,
    ) -> RepositoryResult<Option<serde_json::Value>> {
        let pk = self
            .schema
            .primary_key_name()
            .ok_or_else(|| QueryError::MissingPrimaryKey(self.table.clone()))?;
        self.get_one_by(QueryArgs::new().filter_value(pk, value.clone()))
            .await
    }

    /// Revisions from the committed view matching the filters.
    ///
    /// Filter keys address the view directly (`metadata.id`, `data.name`).
    pub async fn get_committed_by(
        &self,
        filters: Vec<(String, serde_json::Value)>,
    ) -> RepositoryResult<Vec<DocumentRecord>> {
        let statement = build_committed(&self.table, &filters)?;
        let rows = self.run(&statement).await?;
        rows.iter().map(DocumentRecord::from_row).collect()
    }

    /// Revisions carrying the store-assigned document identifier
    pub async fn get_by_document_id(&self, id: &str) -> RepositoryResult<Vec<DocumentRecord>> {
        self.get_committed_by(vec![(
            "metadata.id".to_string(),
            serde_json::Value::String(id.to_string()),
        )])
        .await
    }

    /// Audit trail matching the supplied history arguments
    pub async fn get_history_by(&self, args: HistoryArgs) -> RepositoryResult<Vec<DocumentRecord>> {
        let statement = build_history(&self.table, &args, Utc::now())?;
        let rows = self.run(&statement).await?;
        rows.iter().map(DocumentRecord::from_row).collect()
    }

    /// Audit trail for the document holding the primary-key value
    pub async fn get_history_by_pk(
        &self,
        value: &serde_json::Value,
        start: Option<chrono::DateTime<Utc>>,
        end: Option<chrono::DateTime<Utc>>,
    ) -> RepositoryResult<Vec<DocumentRecord>> {
        let pk = self
            .schema
            .primary_key_name()
            .ok_or_else(|| QueryError::MissingPrimaryKey(self.table.clone()))?;
        self.get_history_by(
            HistoryArgs::on_data(vec![(pk.to_string(), value.clone())]).between(start, end),
        )
        .await
    }

    /// Audit trail for the store-assigned document identifier
    pub async fn get_history_by_document_id(
        &self,
        id: &str,
        start: Option<chrono::DateTime<Utc>>,
        end: Option<chrono::DateTime<Utc>>,
    ) -> RepositoryResult<Vec<DocumentRecord>> {
        self.get_history_by(
            HistoryArgs::on_metadata(vec![(
                "id".to_string(),
                serde_json::Value::String(id.to_string()),
            )])
            .between(start, end),
        )
        .await
    }

    /// Validates and inserts a document.
    ///
    /// Structured reference values are inserted into their target tables
    /// first; the resolved primary keys are bound as foreign keys before the
    /// outer insert compiles. Each insert is its own transaction.
    pub async fn add(&self, data: serde_json::Value) -> RepositoryResult<Vec<serde_json::Value>> {
        Ok(self.add_internal(data).await?.0)
    }

    fn add_internal(
        &self,
        data: serde_json::Value,
    ) -> BoxFuture<'_, RepositoryResult<(Vec<serde_json::Value>, Option<serde_json::Value>)>> {
        async move {
            let mut mapped =
                map_document(self, &data, &self.schema, 0, &self.options.mapper, false).await?;

            if self.options.auto_create_tables {
                self.connection.ensure_table(&self.table).await?;
            }

            for (name, def) in self.schema.fields() {
                let Some(target) = &def.reference else {
                    continue;
                };
                match mapped.get(name).cloned() {
                    Some(FieldValue::PendingReference(sub_data)) => {
                        let (_, pk_value) = target.add_internal(sub_data).await?;
                        let foreign_key = pk_value.ok_or_else(|| {
                            QueryError::MissingPrimaryKey(target.table().to_string())
                        })?;
                        mapped.set_value(name, FieldValue::ForeignKey(foreign_key));
                    }
                    Some(FieldValue::Data(serde_json::Value::Array(elements))) => {
                        let mut resolved = Vec::with_capacity(elements.len());
                        for element in elements {
                            if element.is_object() {
                                let (_, pk_value) = target.add_internal(element).await?;
                                resolved.push(pk_value.ok_or_else(|| {
                                    QueryError::MissingPrimaryKey(target.table().to_string())
                                })?);
                            } else {
                                resolved.push(element);
                            }
                        }
                        mapped.set_value(
                            name,
                            FieldValue::Data(serde_json::Value::Array(resolved)),
                        );
                    }
                    _ => {}
                }
            }

            let pk_value = self
                .schema
                .primary_key_name()
                .and_then(|pk| mapped.bound_value(pk).cloned());

            let document = document_value(&mapped, &self.schema)?;
            let statement = build_insert(&self.table, document);
            let rows = self.run(&statement).await?;
            debug!("inserted document into '{}'", self.table);
            Ok((rows.iter().map(Value::to_json).collect(), pk_value))
        }
        .boxed()
    }

    /// Validates and updates records matching the arguments.
    ///
    /// Reference fields in the field set cascade: the referenced table's
    /// update is compiled and executed independently and its outcome is not
    /// surfaced. With managed timestamps, `updatedAt` refreshes on every
    /// update.
    pub async fn update(
        &self,
        fields: serde_json::Value,
        args: QueryArgs,
    ) -> RepositoryResult<Vec<serde_json::Value>> {
        self.update_internal(fields, args).await
    }

    fn update_internal(
        &self,
        fields: serde_json::Value,
        args: QueryArgs,
    ) -> BoxFuture<'_, RepositoryResult<Vec<serde_json::Value>>> {
        async move {
            let mut field_map = fields.as_object().cloned().ok_or_else(|| {
                RepositoryError::MalformedRecord("update fields must be an object".to_string())
            })?;

            // Shallow validation: required and primary-key checks are
            // skipped for updates.
            let update_mapper = MapperOptions {
                max_depth: 1,
                ..self.options.mapper.clone()
            };
            map_document(self, &fields, &self.schema, 0, &update_mapper, true).await?;

            if self.options.timestamps && self.schema.contains("updatedAt") {
                field_map.insert(
                    "updatedAt".to_string(),
                    serde_json::Value::String(
                        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                    ),
                );
            }

            let plan = build_update(&self.table, &field_map, &self.schema, &args.predicates)?;

            for cascade in &plan.cascades {
                if let Err(error) = self.cascade_update(cascade, &field_map, &args).await {
                    warn!(
                        "cascading update through '{}' on '{}' failed: {}",
                        cascade, self.table, error
                    );
                }
            }

            let rows = self.run(&plan.statement).await?;
            Ok(rows.iter().map(Value::to_json).collect())
        }
        .boxed()
    }

    async fn cascade_update(
        &self,
        field_path: &str,
        field_map: &serde_json::Map<String, serde_json::Value>,
        args: &QueryArgs,
    ) -> RepositoryResult<()> {
        let def = resolve_field_path(&self.schema, field_path).ok_or_else(|| {
            QueryError::UnknownField {
                table: self.table.clone(),
                field: field_path.to_string(),
            }
        })?;
        let target = def
            .reference
            .as_ref()
            .ok_or_else(|| QueryError::UnresolvedReference(field_path.to_string()))?;

        let sub_fields = value_at_path(field_map, field_path).ok_or_else(|| {
            RepositoryError::MalformedRecord(format!(
                "no update data supplied for reference '{}'",
                field_path
            ))
        })?;

        let foreign_key = self
            .lookup_reference_key(field_path, args)
            .await?
            .ok_or_else(|| {
                RepositoryError::MalformedRecord(format!(
                    "no document matched while resolving reference '{}'",
                    field_path
                ))
            })?;

        let target_pk = target
            .schema()
            .primary_key_name()
            .ok_or_else(|| QueryError::MissingPrimaryKey(target.table().to_string()))?;

        target
            .update_internal(
                sub_fields,
                QueryArgs::new().filter_value(target_pk, foreign_key),
            )
            .await?;
        Ok(())
    }

    /// Resolves the foreign key stored in a reference field, scoped by the
    /// original where-arguments
    async fn lookup_reference_key(
        &self,
        field_path: &str,
        args: &QueryArgs,
    ) -> RepositoryResult<Option<serde_json::Value>> {
        let where_sql =
            crate::query::build_where(&args.predicates, &self.table, &self.schema)?;
        let statement = Statement::text_only(format!(
            "SELECT {}.{} FROM {}{};",
            self.table, field_path, self.table, where_sql
        ));
        let rows = self.run(&statement).await?;

        let column = field_path.rsplit('.').next().unwrap_or(field_path);
        Ok(rows.first().and_then(|row| match row {
            Value::Struct(fields) if fields.len() == 1 => Some(fields[0].1.to_json()),
            other => other.field(column).map(Value::to_json),
        }))
    }

    /// Deletes records matching the arguments.
    ///
    /// With `recursive`, referenced documents are deleted too: each
    /// reference field's key is resolved via an auxiliary lookup scoped by
    /// the original where-arguments, and the referenced table's delete is
    /// compiled recursively. Statements execute as independent transactions;
    /// a failure mid-cascade leaves partial state.
    pub async fn delete(&self, args: QueryArgs) -> RepositoryResult<Vec<serde_json::Value>> {
        let statements = self.collect_delete_statements(args).await?;
        let mut acknowledgments = Vec::new();
        for statement in &statements {
            let rows = self.run(statement).await?;
            acknowledgments.extend(rows.iter().map(Value::to_json));
        }
        Ok(acknowledgments)
    }

    fn collect_delete_statements(
        &self,
        args: QueryArgs,
    ) -> BoxFuture<'_, RepositoryResult<Vec<Statement>>> {
        async move {
            let mut statements = vec![build_delete(&self.table, &self.schema, &args.predicates)?];

            if args.recursive {
                for (name, def) in self.schema.fields() {
                    if def.kind != FieldKind::Reference {
                        continue;
                    }
                    let Some(target) = &def.reference else {
                        continue;
                    };
                    let Some(foreign_key) = self.lookup_reference_key(name, &args).await? else {
                        debug!(
                            "skipping recursive delete through '{}': no referenced key",
                            name
                        );
                        continue;
                    };
                    let target_pk = target
                        .schema()
                        .primary_key_name()
                        .ok_or_else(|| QueryError::MissingPrimaryKey(target.table().to_string()))?;
                    let sub_args = QueryArgs::new()
                        .filter_value(target_pk, foreign_key)
                        .recursive();
                    statements.extend(target.collect_delete_statements(sub_args).await?);
                }
            }

            Ok(statements)
        }
        .boxed()
    }
}

/// Walks a dotted field path through nested models
fn resolve_field_path<'a>(schema: &'a SchemaModel, path: &str) -> Option<&'a FieldDef> {
    let mut segments = path.split('.');
    let mut def = schema.get(segments.next()?)?;
    for segment in segments {
        def = def.nested.as_ref()?.get(segment)?;
    }
    Some(def)
}

/// Reads the value at a dotted path in an update field map
fn value_at_path(
    map: &serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_field_path_through_nested_models() {
        let schema = SchemaModel::new().field(
            "address",
            FieldDef::object(SchemaModel::new().field("city", FieldDef::string())),
        );
        assert!(resolve_field_path(&schema, "address").is_some());
        assert!(resolve_field_path(&schema, "address.city").is_some());
        assert!(resolve_field_path(&schema, "address.street").is_none());
        assert!(resolve_field_path(&schema, "ghost").is_none());
    }

    #[test]
    fn test_value_at_path() {
        let fields = json!({"address": {"city": "Utrecht"}});
        let map = fields.as_object().unwrap();
        assert_eq!(value_at_path(map, "address.city"), Some(json!("Utrecht")));
        assert_eq!(value_at_path(map, "address.zip"), None);
    }

    #[test]
    fn test_options_builders() {
        let options = RepositoryOptions::default()
            .with_timestamps()
            .without_auto_create();
        assert!(options.timestamps);
        assert!(!options.auto_create_tables);
    }
}
