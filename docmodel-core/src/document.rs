//! Documents: schema-typed entities bound to a model.
//!
//! A [`Document`] owns its cast field values and the set of paths changed
//! since it was last clean. Its lifecycle (state, identifier, revision and
//! any in-flight removal) lives in a shared cell so that concurrent
//! [`Model::remove`](crate::model::Model::remove) calls on the same document
//! can find and join each other.
//!
//! # Example
//!
//! ```ignore
//! let mut user = users.new_document();
//! user.set("name", "Alice")?;
//! user.set("age", "41")?; // cast to a number by the schema
//! users.save(&mut user).await?;
//! assert!(!user.is_new());
//! ```

use bson::Bson;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{collections::BTreeSet, fmt::Debug, sync::Arc};

use crate::{
    cast::{cast_value, depopulate},
    error::{ModelError, ModelResult},
    model::Model,
    path::{POSITIONAL, resolve},
    record::{ID_FIELD, REV_FIELD, Record, get_path, set_path, stringify_id},
    state::DocumentState,
};

/// A removal in flight, shared by every caller waiting on it.
pub(crate) type PendingRemoval = Shared<BoxFuture<'static, ModelResult<()>>>;

/// Lifecycle data shared between a document and its pending operations.
#[derive(Default)]
pub(crate) struct Lifecycle {
    pub(crate) state: DocumentState,
    pub(crate) id: Option<String>,
    pub(crate) rev: Option<String>,
    pub(crate) pending_removal: Option<PendingRemoval>,
}

/// How a document is turned into a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Replace populated references with their identifiers.
    pub depopulate: bool,
    /// Include the schema's virtual fields.
    pub virtuals: bool,
}

/// An instance of a model.
pub struct Document {
    model: Arc<Model>,
    fields: Record,
    dirty: BTreeSet<String>,
    pub(crate) lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("Document")
            .field("model", &self.model.name())
            .field("id", &lifecycle.id)
            .field("rev", &lifecycle.rev)
            .field("state", &lifecycle.state)
            .field("fields", &self.fields)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Document {
    /// A fresh, never persisted document.
    pub(crate) fn new(model: Arc<Model>, fields: Record) -> Self {
        Self {
            model,
            fields,
            dirty: BTreeSet::new(),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        }
    }

    /// A clean document rebuilt from a stored record.
    pub(crate) fn hydrated(model: Arc<Model>, fields: Record, id: String, rev: Option<String>) -> Self {
        Self {
            model,
            fields,
            dirty: BTreeSet::new(),
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: DocumentState::Clean,
                id: Some(id),
                rev,
                pending_removal: None,
            })),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Backend-assigned identifier; `None` until the first successful save
    /// (unless the caller chose one) and again after removal.
    pub fn id(&self) -> Option<String> {
        self.lifecycle.lock().id.clone()
    }

    /// Backend-assigned revision token.
    pub fn rev(&self) -> Option<String> {
        self.lifecycle.lock().rev.clone()
    }

    pub fn state(&self) -> DocumentState {
        self.lifecycle.lock().state
    }

    pub fn is_new(&self) -> bool {
        self.state().is_new()
    }

    pub fn is_removed(&self) -> bool {
        self.state().is_removed()
    }

    /// Returns `true` when a removal is in flight.
    pub fn is_removing(&self) -> bool {
        self.lifecycle.lock().pending_removal.is_some()
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    /// Reads a dotted path.
    pub fn get(&self, path: &str) -> Option<&Bson> {
        get_path(&self.fields, path)
    }

    /// Paths changed since the document was last clean.
    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub fn is_modified(&self, path: &str) -> bool {
        self.dirty.iter().any(|dirty| {
            dirty == path
                || dirty.starts_with(&format!("{path}."))
                || path.starts_with(&format!("{dirty}."))
        })
    }

    /// Marks `path` as changed without assigning a value.
    pub fn mark_modified(&mut self, path: impl Into<String>) {
        self.dirty.insert(path.into());
    }

    /// Casts `value` with the rule resolved for `path`, stores it and marks the path dirty.
    ///
    /// Setting `_id` on a new document chooses its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] when the caster rejects the value,
    /// the path is positional, or a strict schema does not declare it.
    pub fn set(&mut self, path: &str, value: impl Into<Bson>) -> ModelResult<()> {
        let value = value.into();

        if path == ID_FIELD {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.state.is_new() {
                return Err(ModelError::InvalidState(
                    "the identifier of a persisted document cannot change".to_string(),
                ));
            }
            lifecycle.id = Some(stringify_id(&value));
            return Ok(());
        }

        if path.split('.').any(|part| part == POSITIONAL) {
            return Err(ModelError::Validation {
                path: path.to_string(),
                reason: "positional paths cannot be assigned".to_string(),
            });
        }

        let schema = self.model.schema();
        let value = match resolve(schema, path) {
            Some(rule) => cast_value(rule, value)?,
            None if schema.options().strict => {
                return Err(ModelError::Validation {
                    path: path.to_string(),
                    reason: "path is not declared in the schema".to_string(),
                });
            }
            None => value,
        };

        if !set_path(&mut self.fields, path, value) {
            return Err(ModelError::Validation {
                path: path.to_string(),
                reason: "an intermediate value is not a document".to_string(),
            });
        }

        self.dirty.insert(path.to_string());
        Ok(())
    }

    /// Removes the value at a top-level or nested path.
    pub fn unset(&mut self, path: &str) -> Option<Bson> {
        let removed = match path.rsplit_once('.') {
            None => self.fields.remove(path),
            Some((parent, leaf)) => match get_path_mut(&mut self.fields, parent) {
                Some(Bson::Document(doc)) => doc.remove(leaf),
                _ => None,
            },
        };

        if removed.is_some() {
            self.dirty.insert(path.to_string());
        }
        removed
    }

    /// Checks that every required path holds a non-null value.
    pub fn validate(&self) -> ModelResult<()> {
        let mut required = self
            .model
            .schema()
            .rules()
            .filter(|rule| rule.required)
            .map(|rule| rule.path.as_str())
            .collect::<Vec<_>>();
        required.sort_unstable();

        for path in required {
            if matches!(self.get(path), None | Some(Bson::Null)) {
                return Err(ModelError::Validation {
                    path: path.to_string(),
                    reason: "path is required".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Serializes the document into a record including `_id`/`_rev` when known.
    pub fn to_record(&self, options: SerializeOptions) -> Record {
        let schema = self.model.schema();
        let mut record = Record::new();

        {
            let lifecycle = self.lifecycle.lock();
            if let Some(id) = &lifecycle.id {
                record.insert(ID_FIELD, id.clone());
            }
            if let Some(rev) = &lifecycle.rev {
                record.insert(REV_FIELD, rev.clone());
            }
        }

        let fields = if options.depopulate {
            depopulate(schema, &self.fields)
        } else {
            self.fields.clone()
        };
        for (key, value) in fields {
            record.insert(key, value);
        }

        if options.virtuals {
            for (name, virtual_fn) in schema.virtuals() {
                let value = virtual_fn(&self.fields);
                record.insert(name, value);
            }
        }

        record
    }

    /// Serializes the document (with virtuals) into JSON.
    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self.to_record(SerializeOptions {
            depopulate: false,
            virtuals: true,
        }))?)
    }

    /// Deserializes the document's record into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> ModelResult<T> {
        Ok(bson::deserialize_from_document(self.to_record(SerializeOptions::default()))?)
    }

    /// Assigns every field of `value` through [`Document::set`].
    pub fn assign<T: Serialize>(&mut self, value: &T) -> ModelResult<()> {
        for (key, field) in bson::serialize_to_document(value)? {
            self.set(&key, field)?;
        }
        Ok(())
    }

    pub(crate) fn take_dirty(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn restore_dirty(&mut self, paths: BTreeSet<String>) {
        self.dirty.extend(paths);
    }
}

fn get_path_mut<'a>(record: &'a mut Record, path: &str) -> Option<&'a mut Bson> {
    let mut parts = path.split('.');
    let mut current = record.get_mut(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get_mut(part)?,
            _ => return None,
        };
    }

    Some(current)
}
