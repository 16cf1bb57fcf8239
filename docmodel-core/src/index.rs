//! Sequential index provisioning.
//!
//! Backends may reject overlapping index builds, so specs are issued one at a
//! time and each acknowledgment is awaited before the next call.

use tracing::{debug, warn};

use crate::{
    backend::DynStoreBackend,
    error::{ModelError, ModelResult},
    events::LifecycleEvent,
    model::Model,
    schema::IndexSpec,
};

/// Builds every index in `specs`, in order, stopping at the first failure.
///
/// Nothing runs until the returned future is polled, so an empty list still
/// completes asynchronously.
pub async fn ensure_indexes<I>(backend: &dyn DynStoreBackend, collection: &str, specs: I) -> ModelResult<()>
where
    I: IntoIterator<Item = IndexSpec>,
{
    for (position, spec) in specs.into_iter().enumerate() {
        debug!(collection, position, keys = %spec.keys, "building index");

        if let Err(error) = backend.ensure_index(collection, spec).await {
            warn!(collection, position, %error, "index build failed");
            return Err(error);
        }
    }

    Ok(())
}

impl Model {
    /// Builds the schema's declared indexes and emits one
    /// [`LifecycleEvent::Index`] carrying the outcome.
    pub async fn ensure_indexes(&self) -> ModelResult<()> {
        self.ensure_indexes_with(|_| {}).await
    }

    /// Like [`Model::ensure_indexes`], then hands the same outcome to `handler`.
    pub async fn ensure_indexes_with<F>(&self, handler: F) -> ModelResult<()>
    where
        F: FnOnce(Option<&ModelError>),
    {
        let specs = self.schema().indexes().to_vec();
        let result = ensure_indexes(self.backend().as_ref(), self.collection(), specs).await;

        let error = result.as_ref().err();
        self.emit(LifecycleEvent::Index { error: error.cloned() });
        handler(error);

        result
    }
}
