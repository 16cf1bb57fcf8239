//! Storage backend abstraction for models.
//!
//! This module defines the narrow contract the mapping layer needs from a
//! revisioned document store. The core never speaks a wire protocol itself;
//! it issues these calls and interprets their results.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::{StoreBackend, WriteOptions};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let ack = backend
//!     .insert("users", doc! { "name": "Alice" }, &WriteOptions::default())
//!     .await?;
//! println!("stored as {} at revision {}", ack.id, ack.rev);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{error::ModelResult, record::Record, schema::IndexSpec};

/// Options attached to every write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Write-acknowledgment setting copied verbatim from the schema.
    pub safe: Option<Bson>,
}

/// Identifier and revision the backend assigned to a written record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    pub id: String,
    pub rev: String,
}

/// Options for [`StoreBackend::query_by_view`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    /// Only return rows whose emitted key equals this value.
    pub key: Option<Bson>,
    /// Number of matching rows to skip.
    pub skip: Option<usize>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Return rows in descending key order.
    pub descending: bool,
}

impl ViewOptions {
    pub fn key(mut self, key: impl Into<Bson>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

/// Abstract interface for revisioned document storage backends.
///
/// Every call is a suspension point; implementations own their timeouts. All
/// implementations must be thread-safe.
///
/// # Error Handling
///
/// Operations return [`ModelResult<T>`](crate::error::ModelResult). Backends
/// should report revision mismatches as
/// [`ModelError::Conflict`](crate::error::ModelError::Conflict) and missing
/// records as [`ModelError::DocumentNotFound`](crate::error::ModelError::DocumentNotFound).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Stores a new record. The backend assigns an identifier when the record
    /// carries no `_id`, and always assigns the first revision.
    async fn insert(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck>;

    /// Replaces an existing record. The record's `_rev` must match the stored one.
    async fn update(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck>;

    /// Removes the record with the given identifier and revision.
    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()>;

    /// Fetches records by identifier. The result has one entry per requested
    /// id, in no guaranteed order; absent records are `None`.
    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>>;

    /// Runs a named view and returns the matching records.
    async fn query_by_view(
        &self,
        collection: &str,
        view: &str,
        options: ViewOptions,
    ) -> ModelResult<Vec<Record>>;

    /// Builds an index. Backends may reject overlapping builds.
    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> ModelResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck> {
        (*self).insert(collection, record, options).await
    }

    async fn update(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck> {
        (*self).update(collection, record, options).await
    }

    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()> {
        (*self).remove(collection, id, rev).await
    }

    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>> {
        (*self).get_by_ids(collection, ids).await
    }

    async fn query_by_view(
        &self,
        collection: &str,
        view: &str,
        options: ViewOptions,
    ) -> ModelResult<Vec<Record>> {
        (*self)
            .query_by_view(collection, view, options)
            .await
    }

    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()> {
        (*self).ensure_index(collection, spec).await
    }
}

/// Object-safe mirror of [`StoreBackend`], implemented for every backend.
///
/// Models hold their backend as `Arc<dyn DynStoreBackend>` so that models
/// bound to different backend types can live in the same registry.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck>;
    async fn update(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck>;
    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()>;
    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>>;
    async fn query_by_view(
        &self,
        collection: &str,
        view: &str,
        options: ViewOptions,
    ) -> ModelResult<Vec<Record>>;
    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn insert(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck> {
        StoreBackend::insert(self, collection, record, options).await
    }

    async fn update(
        &self,
        collection: &str,
        record: Record,
        options: &WriteOptions,
    ) -> ModelResult<WriteAck> {
        StoreBackend::update(self, collection, record, options).await
    }

    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()> {
        StoreBackend::remove(self, collection, id, rev).await
    }

    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>> {
        StoreBackend::get_by_ids(self, collection, ids).await
    }

    async fn query_by_view(
        &self,
        collection: &str,
        view: &str,
        options: ViewOptions,
    ) -> ModelResult<Vec<Record>> {
        StoreBackend::query_by_view(self, collection, view, options).await
    }

    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()> {
        StoreBackend::ensure_index(self, collection, spec).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ModelResult<Self::Backend>;
}
