//! Recursive document mapper
//!
//! Walks untyped JSON input against a schema model in declaration order,
//! binding validated values into a per-call output tree. Reference fields
//! resolve through their target repository: primitives are checked to exist
//! and bound as foreign keys, structured values are validated against the
//! target schema and left pending for add-time insertion.
//!
//! Validation never throws: every failure is collected into the returned
//! error list, with dotted paths for nested failures. Only collaborator
//! failures (a lookup that could not run) abort the walk.

use chrono::DateTime;
use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

use crate::repository::{Repository, RepositoryError};

use super::errors::ValidationError;
use super::types::{FieldKind, SchemaModel};

/// What happens when validation reaches the configured depth limit.
///
/// The ledger accepts arbitrarily deep documents; validating them all the
/// way down can chase reference cycles forever. The default accepts deeper
/// data as-is, unvalidated. `FailClosed` rejects it instead. Either way the
/// policy is explicit — it is never corrected silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthPolicy {
    /// Deeper data is accepted without inspection (default)
    #[default]
    AcceptUnvalidated,
    /// Deeper data fails validation
    FailClosed,
}

/// Mapper configuration
#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// Levels of nesting validated before the depth policy applies
    pub max_depth: usize,
    /// Behavior at the depth limit
    pub depth_policy: DepthPolicy,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            depth_policy: DepthPolicy::AcceptUnvalidated,
        }
    }
}

impl MapperOptions {
    /// Overrides the validated nesting depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rejects data below the depth limit instead of accepting it
    pub fn fail_closed(mut self) -> Self {
        self.depth_policy = DepthPolicy::FailClosed;
        self
    }
}

/// A field's resolved value in the mapped tree
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Nothing bound; the field is omitted from compiled documents
    Skipped,
    /// Explicit null binding
    Null,
    /// Validated data, bound as supplied
    Data(serde_json::Value),
    /// Reference resolved to the target's primary-key value
    ForeignKey(serde_json::Value),
    /// Structured reference data, inserted into the target table at add time
    PendingReference(serde_json::Value),
}

/// One mapped field: name, kind, resolved value
#[derive(Debug, Clone)]
pub struct MappedField {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
}

/// The mapper's output: a working copy of the schema tree with every
/// field's resolved value attached. The canonical schema is never mutated.
#[derive(Debug, Clone, Default)]
pub struct MappedDocument {
    fields: Vec<MappedField>,
    depth_pruned: bool,
}

impl MappedDocument {
    /// Builds a document from mapped fields
    pub fn new(fields: Vec<MappedField>) -> Self {
        Self {
            fields,
            depth_pruned: false,
        }
    }

    /// The success sentinel returned at the depth limit
    pub fn depth_pruned() -> Self {
        Self {
            fields: Vec::new(),
            depth_pruned: true,
        }
    }

    /// True when the depth limit cut validation short
    pub fn is_depth_pruned(&self) -> bool {
        self.depth_pruned
    }

    /// Iterates mapped fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &MappedField> {
        self.fields.iter()
    }

    /// Looks up a field's resolved value
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Returns the bound JSON value for data and foreign-key bindings
    pub fn bound_value(&self, name: &str) -> Option<&serde_json::Value> {
        match self.get(name) {
            Some(FieldValue::Data(value)) | Some(FieldValue::ForeignKey(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn set_value(&mut self, name: &str, value: FieldValue) {
        if let Some(field) = self.fields.iter_mut().find(|field| field.name == name) {
            field.value = value;
        }
    }
}

/// Mapper failure: either a list of validation errors, or a collaborator
/// failure that prevented a lookup from running at all
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Lookup(Box<RepositoryError>),
}

impl MapperError {
    fn lookup(error: RepositoryError) -> Self {
        MapperError::Lookup(Box::new(error))
    }
}

/// Maps input data against a schema, in declaration order.
///
/// `repo` is the repository owning the schema; it supplies primary-key
/// uniqueness lookups and the ensure-index side effect. Reference fields
/// resolve through their own target repository.
pub fn map_document<'a>(
    repo: &'a Repository,
    data: &'a serde_json::Value,
    schema: &'a SchemaModel,
    depth: usize,
    options: &'a MapperOptions,
    is_update: bool,
) -> BoxFuture<'a, Result<MappedDocument, MapperError>> {
    async move {
        if depth >= options.max_depth {
            return match options.depth_policy {
                DepthPolicy::AcceptUnvalidated => Ok(MappedDocument::depth_pruned()),
                DepthPolicy::FailClosed => Err(MapperError::Validation(vec![
                    ValidationError::invalid_value(
                        "",
                        format!("nesting at most {} levels deep", options.max_depth),
                        "deeper nesting",
                        data.clone(),
                    ),
                ])),
            };
        }

        let Some(input) = data.as_object() else {
            return Err(MapperError::Validation(vec![ValidationError::invalid_value(
                "",
                "object",
                json_kind(data),
                data.clone(),
            )]));
        };

        let mut errors: Vec<ValidationError> = Vec::new();
        let mut fields: Vec<MappedField> = Vec::new();

        for (name, def) in schema.fields() {
            let supplied = input.get(name).filter(|value| !value.is_null());

            let Some(value) = supplied else {
                // Absent: default, then null, then ensure-index, then missing.
                if let Some(default) = &def.default {
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Data(default.resolve()),
                    });
                } else if def.allow_null {
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Null,
                    });
                } else if def.indexed {
                    repo.ensure_index(name).await.map_err(MapperError::lookup)?;
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Skipped,
                    });
                } else if !is_update {
                    errors.push(ValidationError::missing(name));
                } else {
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Skipped,
                    });
                }
                continue;
            };

            if def.kind == FieldKind::Reference {
                let Some(target) = &def.reference else {
                    errors.push(ValidationError::invalid_value(
                        name,
                        "configured reference target",
                        json_kind(value),
                        value.clone(),
                    ));
                    continue;
                };

                if let Some(elements) = value.as_array() {
                    map_reference_sequence(target, name, elements, depth, options, &mut errors)
                        .await?;
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Data(value.clone()),
                    });
                } else if value.is_object() {
                    match map_document(target, value, target.schema(), depth + 1, options, false)
                        .await
                    {
                        Ok(_) => {}
                        Err(MapperError::Validation(nested)) => {
                            errors.extend(nested.into_iter().map(|err| err.prefixed(name)));
                        }
                        Err(other) => return Err(other),
                    }
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::PendingReference(value.clone()),
                    });
                } else {
                    match target.get_by_pk(value).await {
                        Ok(Some(_)) => fields.push(MappedField {
                            name: name.to_string(),
                            kind: def.kind,
                            value: FieldValue::ForeignKey(value.clone()),
                        }),
                        Ok(None) => {
                            errors.push(ValidationError::reference_not_found(name, value.clone()));
                        }
                        Err(error) => return Err(MapperError::lookup(error)),
                    }
                }
                continue;
            }

            if def.kind == FieldKind::Json {
                // Opaque: accepted unchanged, no type check, no recursion.
                fields.push(MappedField {
                    name: name.to_string(),
                    kind: def.kind,
                    value: FieldValue::Data(value.clone()),
                });
                continue;
            }

            if let Some(elements) = value.as_array() {
                // Sequence against an element model or reference target.
                // Per-element errors are collected, but never block binding
                // the sequence itself.
                if let Some(target) = &def.reference {
                    map_reference_sequence(target, name, elements, depth, options, &mut errors)
                        .await?;
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Data(value.clone()),
                    });
                    continue;
                }
                if let Some(element_schema) = &def.nested {
                    for (index, element) in elements.iter().enumerate() {
                        let element_path = format!("{}[{}]", name, index);
                        if element.is_object() {
                            match map_document(
                                repo,
                                element,
                                element_schema,
                                depth,
                                options,
                                false,
                            )
                            .await
                            {
                                Ok(_) => {}
                                Err(MapperError::Validation(nested)) => {
                                    errors.extend(
                                        nested.into_iter().map(|err| err.prefixed(&element_path)),
                                    );
                                }
                                Err(other) => return Err(other),
                            }
                        } else {
                            errors.push(ValidationError::invalid_value(
                                element_path,
                                "object",
                                json_kind(element),
                                element.clone(),
                            ));
                        }
                    }
                    fields.push(MappedField {
                        name: name.to_string(),
                        kind: def.kind,
                        value: FieldValue::Data(value.clone()),
                    });
                    continue;
                }
            }

            if !kind_matches(def.kind, value) {
                errors.push(ValidationError::invalid_value(
                    name,
                    def.kind.kind_name(),
                    json_kind(value),
                    value.clone(),
                ));
                continue;
            }

            if def.kind == FieldKind::Timestamp {
                let parses = value
                    .as_str()
                    .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
                    .unwrap_or(false);
                if !parses {
                    errors.push(ValidationError::invalid_value(
                        name,
                        def.kind.kind_name(),
                        json_kind(value),
                        value.clone(),
                    ));
                    continue;
                }
            }

            if def.kind == FieldKind::Object {
                if let Some(nested_schema) = &def.nested {
                    match map_document(repo, value, nested_schema, depth + 1, options, false).await
                    {
                        Ok(_) => {}
                        Err(MapperError::Validation(nested)) => {
                            errors.extend(nested.into_iter().map(|err| err.prefixed(name)));
                        }
                        Err(other) => return Err(other),
                    }
                }
            }

            if def.primary_key && !is_update {
                match repo.get_by_pk(value).await {
                    Ok(Some(_)) => {
                        errors.push(ValidationError::pk_duplicate(name, value.clone()));
                        continue;
                    }
                    Ok(None) => {}
                    Err(error) => return Err(MapperError::lookup(error)),
                }
            }

            fields.push(MappedField {
                name: name.to_string(),
                kind: def.kind,
                value: FieldValue::Data(value.clone()),
            });
        }

        if errors.is_empty() {
            Ok(MappedDocument::new(fields))
        } else {
            Err(MapperError::Validation(errors))
        }
    }
    .boxed()
}

async fn map_reference_sequence(
    target: &Repository,
    name: &str,
    elements: &[serde_json::Value],
    depth: usize,
    options: &MapperOptions,
    errors: &mut Vec<ValidationError>,
) -> Result<(), MapperError> {
    for (index, element) in elements.iter().enumerate() {
        let element_path = format!("{}[{}]", name, index);
        if element.is_object() {
            match map_document(target, element, target.schema(), depth + 1, options, false).await {
                Ok(_) => {}
                Err(MapperError::Validation(nested)) => {
                    errors.extend(nested.into_iter().map(|err| err.prefixed(&element_path)));
                }
                Err(other) => return Err(other),
            }
        } else {
            match target.get_by_pk(element).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    errors.push(ValidationError::reference_not_found(
                        element_path,
                        element.clone(),
                    ));
                }
                Err(error) => return Err(MapperError::lookup(error)),
            }
        }
    }
    Ok(())
}

fn kind_matches(kind: FieldKind, value: &serde_json::Value) -> bool {
    match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Timestamp => value.is_string(),
        FieldKind::Object => value.is_object(),
        FieldKind::Array => value.is_array(),
        // Handled before the kind match
        FieldKind::Json | FieldKind::Reference => true,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
