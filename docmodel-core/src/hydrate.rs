//! Rebuilding documents from raw backend records.
//!
//! Hydration preserves the shape of its input: one record yields one
//! document, a sequence (even of length one) yields a sequence of the same
//! length and order. It never calls the backend.

use bson::Bson;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    backend::ViewOptions,
    cast::cast_record,
    document::Document,
    error::{ModelError, ModelResult},
    model::Model,
    record::{ID_FIELD, REV_FIELD, Record, stringify_id},
    reorder::{ReorderMode, ReorderOptions, Slot, reorder},
};

/// A single value or a sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn into_one(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<T>> {
        match self {
            OneOrMany::Many(items) => Some(items),
            OneOrMany::One(_) => None,
        }
    }

    /// Flattens either shape into a vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// Builds documents of `model` from `input`.
///
/// Records are initialized concurrently. The first failure aborts the whole
/// batch and no documents are returned.
///
/// # Errors
///
/// Returns [`ModelError::Hydration`] when a record has no identifier, a value
/// is rejected by its caster, or the model's init hook fails.
pub async fn hydrate(model: &Arc<Model>, input: OneOrMany<Record>) -> ModelResult<OneOrMany<Document>> {
    match input {
        OneOrMany::One(record) => Ok(OneOrMany::One(init_record(model, record).await?)),
        OneOrMany::Many(records) => {
            let count = records.len();
            let documents = try_join_all(records.into_iter().map(|record| init_record(model, record)))
                .await
                .inspect_err(|error| warn!(model = model.name(), %error, "hydration aborted"))?;

            debug!(model = model.name(), count, "hydrated records");
            Ok(OneOrMany::Many(documents))
        }
    }
}

async fn init_record(model: &Arc<Model>, mut record: Record) -> ModelResult<Document> {
    let id = match record.remove(ID_FIELD) {
        None | Some(Bson::Null) => return Err(ModelError::hydration(None, "record has no identifier")),
        Some(id) => stringify_id(&id),
    };
    let rev = match record.remove(REV_FIELD) {
        Some(Bson::String(rev)) => Some(rev),
        _ => None,
    };

    let fields = cast_record(model.schema(), record).map_err(|failure| {
        ModelError::hydration(Some(&id), format!("`{}`: {}", failure.path, failure.reason))
    })?;

    let mut document = Document::hydrated(model.clone(), fields, id.clone(), rev);

    if let Some(hook) = model.init_hook() {
        hook.init(&mut document)
            .await
            .map_err(|error| ModelError::hydration(Some(&id), error.to_string()))?;
    }

    Ok(document)
}

impl Model {
    /// See [`hydrate`].
    pub async fn hydrate(self: &Arc<Self>, input: OneOrMany<Record>) -> ModelResult<OneOrMany<Document>> {
        hydrate(self, input).await
    }

    /// Fetches and hydrates a single document.
    pub async fn find_by_id(self: &Arc<Self>, id: &str) -> ModelResult<Option<Document>> {
        let record = self
            .backend()
            .get_by_ids(self.collection(), vec![id.to_string()])
            .await?
            .into_iter()
            .flatten()
            .next();

        match record {
            Some(record) => Ok(hydrate(self, OneOrMany::One(record)).await?.into_one()),
            None => Ok(None),
        }
    }

    /// Fetches every id in `requested` with a single backend call and
    /// reassembles the hydrated documents into the requested shape.
    ///
    /// See [`reorder`] for how `mode` and `options` shape the result.
    pub async fn find_by_ids(
        self: &Arc<Self>,
        requested: Vec<Slot>,
        mode: ReorderMode,
        options: &ReorderOptions,
    ) -> ModelResult<Vec<Slot<Document>>> {
        let ids = Slot::requested_ids(&requested);
        let found = if ids.is_empty() {
            Vec::new()
        } else {
            self.backend()
                .get_by_ids(self.collection(), ids)
                .await?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
        };

        let slots = reorder(requested, &found, options, mode);
        let records = Slot::found_items(&slots).into_iter().cloned().collect::<Vec<_>>();
        let mut documents = hydrate(self, OneOrMany::Many(records)).await?.into_vec().into_iter();

        slots
            .into_iter()
            .map(|slot| {
                slot.try_map(&mut |_record| {
                    documents.next().ok_or_else(|| {
                        ModelError::InvalidState("hydrated fewer documents than were found".to_string())
                    })
                })
            })
            .collect()
    }

    /// Runs a backend view and hydrates every returned record.
    pub async fn query_view(self: &Arc<Self>, view: &str, options: ViewOptions) -> ModelResult<Vec<Document>> {
        let records = self
            .backend()
            .query_by_view(self.collection(), view, options)
            .await?;

        Ok(hydrate(self, OneOrMany::Many(records)).await?.into_vec())
    }
}
