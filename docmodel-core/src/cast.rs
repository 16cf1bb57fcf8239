//! Applying casting rules to values and whole records.

use bson::Bson;

use crate::{
    error::ModelError,
    path::resolve,
    record::{ID_FIELD, Record},
    schema::{CastingRule, ElementType, RuleKind, Schema},
};

/// A value rejected while casting a record.
#[derive(Debug, Clone, PartialEq)]
pub struct CastFailure {
    pub path: String,
    pub reason: String,
}

impl CastFailure {
    fn within(self, prefix: &str) -> Self {
        CastFailure { path: format!("{prefix}.{}", self.path), reason: self.reason }
    }
}

impl From<CastFailure> for ModelError {
    fn from(failure: CastFailure) -> Self {
        ModelError::Validation { path: failure.path, reason: failure.reason }
    }
}

/// Casts a single value with `rule`.
pub fn cast_value(rule: &CastingRule, value: Bson) -> Result<Bson, CastFailure> {
    let fail = |reason: String| CastFailure { path: rule.path.clone(), reason };

    match &rule.kind {
        RuleKind::Scalar(caster) => caster.cast(value).map_err(fail),
        RuleKind::Ref { .. } => cast_reference(value).map_err(fail),
        RuleKind::Array(array) => {
            let items = match value {
                Bson::Null => return Ok(Bson::Null),
                Bson::Array(items) => items,
                single => vec![single],
            };

            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    cast_element(&array.element, item).map_err(|failure| match failure {
                        ElementFailure::Value(reason) => CastFailure {
                            path: format!("{}.{index}", rule.path),
                            reason,
                        },
                        ElementFailure::Nested(inner) => {
                            inner.within(&format!("{}.{index}", rule.path))
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Bson::Array)
        }
    }
}

enum ElementFailure {
    Value(String),
    Nested(CastFailure),
}

fn cast_element(element: &ElementType, item: Bson) -> Result<Bson, ElementFailure> {
    match element {
        ElementType::Mixed => Ok(item),
        ElementType::Scalar(caster) => caster.cast(item).map_err(ElementFailure::Value),
        ElementType::Ref { .. } => cast_reference(item).map_err(ElementFailure::Value),
        ElementType::Embedded(schema) => match item {
            Bson::Document(doc) => cast_record(schema, doc)
                .map(Bson::Document)
                .map_err(ElementFailure::Nested),
            Bson::Null => Ok(Bson::Null),
            other => Err(ElementFailure::Value(format!("expected an embedded document, got {other}"))),
        },
    }
}

/// References hold either an identifier or a populated record carrying one.
fn cast_reference(value: Bson) -> Result<Bson, String> {
    match value {
        Bson::Document(ref doc) if !doc.contains_key(ID_FIELD) => {
            Err("populated reference has no identifier".to_string())
        }
        Bson::Array(_) => Err("reference cannot be an array".to_string()),
        other => Ok(other),
    }
}

/// Casts every field of `record` through the rules resolved for its path.
///
/// Values under flattened sub-schemas are walked recursively. Paths the
/// schema does not declare are kept unless the schema is strict; `_id` is
/// always kept.
pub fn cast_record(schema: &Schema, record: Record) -> Result<Record, CastFailure> {
    cast_into(schema, None, record)
}

fn cast_into(schema: &Schema, prefix: Option<&str>, source: Record) -> Result<Record, CastFailure> {
    let mut out = Record::new();

    for (key, value) in source {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };

        if let Some(rule) = resolve(schema, &path) {
            out.insert(key, cast_value(rule, value)?);
            continue;
        }

        match value {
            Bson::Document(inner) if schema.is_nested(&path) => {
                out.insert(key, Bson::Document(cast_into(schema, Some(&path), inner)?));
            }
            value if key == ID_FIELD || !schema.options().strict => {
                out.insert(key, value);
            }
            _ => {}
        }
    }

    Ok(out)
}

/// Replaces populated references with their identifiers.
pub fn depopulate(schema: &Schema, record: &Record) -> Record {
    depopulate_into(schema, None, record)
}

fn depopulate_into(schema: &Schema, prefix: Option<&str>, source: &Record) -> Record {
    let mut out = Record::new();

    for (key, value) in source {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };

        let value = match (schema.path(&path).map(|rule| &rule.kind), value) {
            (Some(RuleKind::Ref { .. }), value) => reference_id(value),
            (Some(RuleKind::Array(array)), Bson::Array(items)) => Bson::Array(
                items
                    .iter()
                    .map(|item| match (&array.element, item) {
                        (ElementType::Ref { .. }, item) => reference_id(item),
                        (ElementType::Embedded(inner), Bson::Document(doc)) => {
                            Bson::Document(depopulate(inner, doc))
                        }
                        (_, item) => item.clone(),
                    })
                    .collect(),
            ),
            (None, Bson::Document(inner)) if schema.is_nested(&path) => {
                Bson::Document(depopulate_into(schema, Some(&path), inner))
            }
            (_, value) => value.clone(),
        };

        out.insert(key.clone(), value);
    }

    out
}

fn reference_id(value: &Bson) -> Bson {
    match value {
        Bson::Document(doc) => doc.get(ID_FIELD).cloned().unwrap_or(Bson::Null),
        other => other.clone(),
    }
}
