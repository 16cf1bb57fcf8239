//! Model descriptors: a name, a schema and a backend binding.
//!
//! Every persistable entity shares the same capability set (cast, track
//! dirty paths, serialize) implemented once on [`Document`]; what differs
//! between models is injected through the [`Model`] descriptor it points to.
//! Persistence lives in [`crate::persist`], hydration and lookups in
//! [`crate::hydrate`] and index provisioning in [`crate::index`].

use async_trait::async_trait;
use bson::Bson;
use std::{fmt::Debug, sync::Arc};

use crate::{
    backend::{DynStoreBackend, WriteOptions},
    cast::cast_record,
    document::Document,
    error::ModelResult,
    events::{ErrorChannel, EventBus, LifecycleEvent, LifecycleObserver},
    record::{ID_FIELD, Record},
    schema::Schema,
};

/// Post-construction initialization run for every hydrated document.
#[async_trait]
pub trait InitHook: Send + Sync {
    async fn init(&self, document: &mut Document) -> ModelResult<()>;
}

/// A compiled model.
pub struct Model {
    name: String,
    schema: Arc<Schema>,
    backend: Arc<dyn DynStoreBackend>,
    events: EventBus,
    errors: ErrorChannel,
    init_hook: Option<Arc<dyn InitHook>>,
}

impl Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("collection", &self.collection())
            .field("schema", &self.schema)
            .field("backend", &self.backend)
            .field("events", &self.events)
            .field("init_hook", &self.init_hook.is_some())
            .finish()
    }
}

impl Model {
    /// Creates a builder for a model stored on `backend`.
    pub fn builder(
        name: impl Into<String>,
        schema: Schema,
        backend: Arc<dyn DynStoreBackend>,
    ) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            schema: Arc::new(schema),
            backend,
            errors: None,
            init_hook: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Collection the model's records live in: the schema's `collection`
    /// option, or the model name.
    pub fn collection(&self) -> &str {
        self.schema
            .options()
            .collection
            .as_deref()
            .unwrap_or(self.name.as_str())
    }

    pub fn backend(&self) -> &Arc<dyn DynStoreBackend> {
        &self.backend
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    pub(crate) fn init_hook(&self) -> Option<&Arc<dyn InitHook>> {
        self.init_hook.as_ref()
    }

    /// Registers an observer for this model's lifecycle notifications.
    pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) {
        self.events.subscribe(observer);
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        self.events.emit(&self.name, event);
    }

    /// Options attached to every write issued for this model.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions { safe: self.schema.options().safe.clone() }
    }

    /// Creates an empty, never persisted document.
    pub fn new_document(self: &Arc<Self>) -> Document {
        Document::new(self.clone(), Record::new())
    }

    /// Creates a never persisted document from raw values, casting each field.
    ///
    /// An `_id` in `record` becomes the caller-chosen identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`](crate::error::ModelError::Validation)
    /// when a value is rejected by its caster.
    pub fn new_document_from(self: &Arc<Self>, mut record: Record) -> ModelResult<Document> {
        let id = record.remove(ID_FIELD);
        let fields = cast_record(&self.schema, record)?;
        let paths = fields.keys().cloned().collect::<Vec<_>>();

        let mut document = Document::new(self.clone(), fields);
        for path in paths {
            document.mark_modified(path);
        }

        if let Some(id) = id.filter(|id| *id != Bson::Null) {
            document.set(ID_FIELD, id)?;
        }

        Ok(document)
    }

    pub(crate) fn is_model_of(&self, document: &Document) -> bool {
        std::ptr::eq(self, Arc::as_ptr(document.model()))
    }
}

/// Builder for [`Model`].
pub struct ModelBuilder {
    name: String,
    schema: Arc<Schema>,
    backend: Arc<dyn DynStoreBackend>,
    errors: Option<ErrorChannel>,
    init_hook: Option<Arc<dyn InitHook>>,
}

impl ModelBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Routes unhandled errors to `errors` instead of a private channel.
    pub fn errors(mut self, errors: ErrorChannel) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn init_hook(mut self, hook: Arc<dyn InitHook>) -> Self {
        self.init_hook = Some(hook);
        self
    }

    pub fn build(self) -> Arc<Model> {
        Arc::new(Model {
            name: self.name,
            schema: self.schema,
            backend: self.backend,
            events: EventBus::default(),
            errors: self.errors.unwrap_or_default(),
            init_hook: self.init_hook,
        })
    }
}
