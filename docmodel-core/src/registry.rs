//! Name-to-model table.
//!
//! A registry is populated once per model and read afterwards. Registering a
//! name twice with a compatible schema returns the model already registered;
//! an incompatible schema fails with [`ModelError::OverwriteModel`].

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};
use tracing::{debug, warn};

use crate::{
    backend::DynStoreBackend,
    error::{ModelError, ModelResult},
    events::ErrorChannel,
    model::{Model, ModelBuilder},
    schema::Schema,
};

static GLOBAL: LazyLock<ModelRegistry> = LazyLock::new(ModelRegistry::new);

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<Model>>>,
    errors: ErrorChannel,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ModelRegistry {
        &GLOBAL
    }

    /// Error channel shared by every model this registry builds.
    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Compiles and registers a model named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::OverwriteModel`] when `name` is already bound to
    /// a model with an incompatible schema.
    pub fn register(
        &self,
        name: impl Into<String>,
        schema: Schema,
        backend: Arc<dyn DynStoreBackend>,
    ) -> ModelResult<Arc<Model>> {
        self.register_with(Model::builder(name, schema, backend))
    }

    /// Registers the model described by `builder`, wiring it to this
    /// registry's error channel.
    pub fn register_with(&self, builder: ModelBuilder) -> ModelResult<Arc<Model>> {
        let mut models = self.models.write();

        if let Some(existing) = models.get(builder.name()) {
            if existing.schema().is_compatible_with(builder.schema()) {
                debug!(model = builder.name(), "model already registered");
                return Ok(existing.clone());
            }

            warn!(model = builder.name(), "refusing to overwrite model with an incompatible schema");
            return Err(ModelError::OverwriteModel(builder.name().to_string()));
        }

        let model = builder.errors(self.errors.clone()).build();
        models.insert(model.name().to_string(), model.clone());
        debug!(model = model.name(), collection = model.collection(), "registered model");

        Ok(model)
    }

    /// Looks up a registered model.
    pub fn get(&self, name: &str) -> ModelResult<Arc<Model>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::MissingSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.models.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Forgets every registered model.
    pub fn clear(&self) {
        self.models.write().clear();
    }
}
