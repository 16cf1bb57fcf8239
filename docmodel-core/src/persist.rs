//! Saving and removing documents through a model's backend.
//!
//! # Example
//!
//! ```ignore
//! let mut post = posts.new_document();
//! post.set("title", "hello")?;
//!
//! let saved = posts.save(&mut post).await?;
//! assert_eq!(saved.affected, 1);
//!
//! // Both calls share a single backend remove.
//! let (a, b) = futures::join!(posts.remove(&post), posts.remove(&post));
//! ```

use futures::{
    FutureExt,
    future::{self, BoxFuture, join_all},
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::{
    backend::{ViewOptions, WriteAck},
    document::{Document, Lifecycle, PendingRemoval, SerializeOptions},
    error::{ModelError, ModelResult},
    events::LifecycleEvent,
    model::Model,
    record::Record,
    state::{DocumentState, Transition, WriteKind},
};

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub id: String,
    pub rev: String,
    /// Number of records the backend wrote.
    pub affected: usize,
}

impl Model {
    /// Persists `document`: an insert when it is new, an update otherwise.
    ///
    /// An insert sends the full depopulated record; an update also carries
    /// virtual fields when the schema enables `virtuals_on_update`. The
    /// schema's `safe` option is forwarded verbatim.
    ///
    /// # Errors
    ///
    /// * [`ModelError::Validation`] when a required path is missing; nothing is sent.
    /// * [`ModelError::InvalidState`] when the document belongs to another
    ///   model, is being removed, or was removed.
    /// * [`ModelError::Persistence`] when the backend rejects the write. A
    ///   failed insert leaves the document new so the save can be retried; a
    ///   failed update leaves it clean. Identifier and revision are untouched.
    pub async fn save(&self, document: &mut Document) -> ModelResult<Saved> {
        if !self.is_model_of(document) {
            return Err(ModelError::InvalidState(format!(
                "document of model \"{}\" cannot be saved through model \"{}\"",
                document.model().name(),
                self.name()
            )));
        }

        document.validate()?;

        let kind = match document.lifecycle.lock().state.apply(Transition::BeginSave)? {
            DocumentState::Saving(kind) => kind,
            other => {
                return Err(ModelError::InvalidState(format!("cannot save from state {other:?}")));
            }
        };

        let record = document.to_record(SerializeOptions {
            depopulate: true,
            virtuals: kind == WriteKind::Update && self.schema().options().virtuals_on_update,
        });
        let dirty = document.take_dirty();

        if kind == WriteKind::Insert {
            self.emit(LifecycleEvent::IsNew { id: document.id(), is_new: false });
        }

        debug!(model = self.name(), operation = kind.operation(), "saving document");
        let outcome = self.write(kind, record).await;

        match outcome {
            Ok(WriteAck { id, rev }) => {
                {
                    let mut lifecycle = document.lifecycle.lock();
                    lifecycle.id = Some(id.clone());
                    lifecycle.rev = Some(rev.clone());
                    lifecycle.state.apply(Transition::SaveSucceeded)?;
                }

                self.emit(LifecycleEvent::Save { id: id.clone() });
                Ok(Saved { id, rev, affected: 1 })
            }
            Err(error) => {
                document.lifecycle.lock().state.apply(Transition::SaveFailed)?;
                document.restore_dirty(dirty);

                if kind == WriteKind::Insert {
                    self.emit(LifecycleEvent::IsNew { id: document.id(), is_new: true });
                }

                warn!(model = self.name(), operation = kind.operation(), %error, "save failed");
                Err(ModelError::persistence(kind.operation(), error))
            }
        }
    }

    async fn write(&self, kind: WriteKind, record: Record) -> ModelResult<WriteAck> {
        let options = self.write_options();

        match kind {
            WriteKind::Insert => self.backend().insert(self.collection(), record, &options).await,
            WriteKind::Update => self.backend().update(self.collection(), record, &options).await,
        }
    }

    /// Saves without a caller to report to: a failure is published on the
    /// model's [`ErrorChannel`](crate::events::ErrorChannel).
    pub async fn save_detached(&self, document: &mut Document) {
        if let Err(error) = self.save(document).await {
            self.errors().publish(error);
        }
    }

    /// Removes `document` from the backend.
    ///
    /// The removal is registered on the document when this is called, not
    /// when the returned future is first polled: any call made while it is
    /// pending joins it instead of issuing another backend call, and every
    /// caller receives the same outcome. On success the identifier and
    /// revision are cleared and the document can no longer be persisted. On
    /// failure the document returns to the state it was in and a later call
    /// may retry.
    ///
    /// # Errors
    ///
    /// * [`ModelError::InvalidState`] when the document has no identifier, is
    ///   being saved, or was already removed.
    /// * [`ModelError::Persistence`] when the backend rejects the removal.
    pub fn remove(self: &Arc<Self>, document: &Document) -> BoxFuture<'static, ModelResult<()>> {
        match self.pending_removal(document) {
            Ok(pending) => pending.boxed(),
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    fn pending_removal(self: &Arc<Self>, document: &Document) -> ModelResult<PendingRemoval> {
        let mut lifecycle = document.lifecycle.lock();

        if let Some(pending) = &lifecycle.pending_removal {
            debug!(model = self.name(), id = ?lifecycle.id, "joining pending removal");
            return Ok(pending.clone());
        }

        let id = lifecycle
            .id
            .clone()
            .ok_or_else(|| ModelError::InvalidState("cannot remove a document without an identifier".to_string()))?;
        lifecycle.state.apply(Transition::BeginRemove)?;

        let pending = self
            .clone()
            .removal(Arc::downgrade(&document.lifecycle), id, lifecycle.rev.clone())
            .boxed()
            .shared();
        lifecycle.pending_removal = Some(pending.clone());

        Ok(pending)
    }

    async fn removal(
        self: Arc<Self>,
        lifecycle: Weak<Mutex<Lifecycle>>,
        id: String,
        rev: Option<String>,
    ) -> ModelResult<()> {
        debug!(model = self.name(), id = %id, "removing document");
        let outcome = self
            .backend()
            .remove(self.collection(), &id, rev.as_deref())
            .await;

        // The document may have been dropped while the removal was in flight.
        if let Some(lifecycle) = lifecycle.upgrade() {
            let mut lifecycle = lifecycle.lock();
            lifecycle.pending_removal = None;
            lifecycle.state.apply(if outcome.is_ok() {
                Transition::RemoveSucceeded
            } else {
                Transition::RemoveFailed
            })?;

            if outcome.is_ok() {
                lifecycle.id = None;
                lifecycle.rev = None;
            }
        }

        match outcome {
            Ok(()) => {
                self.emit(LifecycleEvent::Remove { id });
                Ok(())
            }
            Err(error) => {
                warn!(model = self.name(), id = %id, %error, "remove failed");
                Err(ModelError::persistence("remove", error))
            }
        }
    }

    /// Saves every document concurrently.
    ///
    /// Completes once every save has settled and reports the first error in
    /// input order; the remaining saves are not cancelled.
    pub async fn save_all(&self, documents: &mut [Document]) -> ModelResult<Vec<Saved>> {
        join_all(documents.iter_mut().map(|document| self.save(document)))
            .await
            .into_iter()
            .collect()
    }

    /// Builds new documents from raw records and saves them all.
    ///
    /// Casting happens up front; a rejected value fails the call before
    /// anything is sent.
    pub async fn create(self: &Arc<Self>, records: Vec<Record>) -> ModelResult<Vec<Document>> {
        let mut documents = records
            .into_iter()
            .map(|record| self.new_document_from(record))
            .collect::<ModelResult<Vec<_>>>()?;

        self.save_all(&mut documents).await?;
        Ok(documents)
    }

    /// Removes every document concurrently, reporting the first error once
    /// all removals have settled.
    pub async fn remove_all(self: &Arc<Self>, documents: &[Document]) -> ModelResult<()> {
        join_all(documents.iter().map(|document| self.remove(document)))
            .await
            .into_iter()
            .collect()
    }

    /// Removes every record the named view selects. Returns how many were removed.
    pub async fn remove_where(self: &Arc<Self>, view: &str, options: ViewOptions) -> ModelResult<usize> {
        let documents = self.query_view(view, options).await?;
        self.remove_all(&documents).await?;
        Ok(documents.len())
    }
}
