//! In-memory storage implementation for models.
//!
//! This module provides a revisioned backend that keeps records in HashMaps
//! behind async-safe read-write locks.

use async_trait::async_trait;
use bson::Bson;
use futures::future::poll_fn;
use mea::rwlock::RwLock;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::Poll,
};
use tracing::{debug, warn};
use uuid::Uuid;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, ViewOptions, WriteAck, WriteOptions},
    error::{ModelError, ModelResult},
    record::{ID_FIELD, REV_FIELD, Record, get_path, record_id, record_rev},
    schema::IndexSpec,
};

use crate::collation::collate;

/// A view function: emits zero or more keys for every record of a collection.
pub type ViewFn = Arc<dyn Fn(&Record) -> Vec<Bson> + Send + Sync>;

type CollectionMap = HashMap<String, Record>;
type StoreMap = HashMap<String, CollectionMap>;
type IndexMap = HashMap<String, Vec<IndexSpec>>;

/// Thread-safe in-memory revisioned document backend.
///
/// `InMemoryStore` is cloneable and uses `Arc`-wrapped internal state, so
/// clones share the same records, views and indexes.
///
/// Every write assigns a new revision of the form `<n>-<uuid>`. Updates and
/// removes must carry the current revision or fail with
/// [`ModelError::Conflict`].
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::{StoreBackend, WriteOptions};
/// use bson::doc;
///
/// let store = InMemoryStore::builder()
///     .with_view("by_email", |record| record.get("email").cloned().into_iter().collect())
///     .build()
///     .await?;
///
/// let ack = store.insert("users", doc! { "email": "ann@example.com" }, &WriteOptions::default()).await?;
/// assert!(ack.rev.starts_with("1-"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// collection_name -> (record_id -> record)
    store: Arc<RwLock<StoreMap>>,
    views: Arc<HashMap<String, ViewFn>>,
    /// collection_name -> built indexes
    indexes: Arc<RwLock<IndexMap>>,
    index_builds: Arc<AtomicUsize>,
    index_builds_exclusive: bool,
}

impl Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut views = self.views.keys().collect::<Vec<_>>();
        views.sort();

        f.debug_struct("InMemoryStore")
            .field("views", &views)
            .field("index_builds_exclusive", &self.index_builds_exclusive)
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    /// Creates an empty store with no views.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore` with views and options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Indexes built so far on `collection`, in build order.
    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.indexes
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of records stored in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    async fn check_unique(&self, collection: &str, candidate: &Record, records: &CollectionMap) -> ModelResult<()> {
        let indexes = self.indexes.read().await;
        let unique = indexes
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|spec| is_unique(spec));

        let candidate_id = record_id(candidate, ID_FIELD);

        for spec in unique {
            let Some(key) = index_key(spec, candidate) else {
                continue;
            };

            let clash = records
                .values()
                .filter(|other| record_id(other, ID_FIELD) != candidate_id)
                .any(|other| index_key(spec, other).as_ref() == Some(&key));

            if clash {
                return Err(ModelError::Backend(format!(
                    "duplicate key {key:?} for unique index {} on {collection}",
                    spec.keys
                )));
            }
        }

        Ok(())
    }
}

fn next_rev(previous: Option<&str>) -> String {
    let generation = previous
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(generation, _)| generation.parse::<u64>().ok())
        .unwrap_or(0);

    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

fn is_unique(spec: &IndexSpec) -> bool {
    spec.options.get_bool("unique").unwrap_or(false)
}

/// Values of every indexed key, or `None` when the record lacks one of them.
fn index_key(spec: &IndexSpec, record: &Record) -> Option<Vec<Bson>> {
    spec.keys
        .keys()
        .map(|path| get_path(record, path).cloned())
        .collect()
}

/// Returns `Pending` once so other tasks can observe an in-flight build.
async fn yield_once() {
    let mut yielded = false;

    poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

/// Decrements the in-flight build counter when dropped.
struct BuildGuard<'a>(&'a AtomicUsize);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert(&self, collection: &str, mut record: Record, options: &WriteOptions) -> ModelResult<WriteAck> {
        let mut store = self.store.write().await;
        let records = store.entry(collection.to_string()).or_default();

        let id = match record_id(&record, ID_FIELD) {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        if records.contains_key(&id) {
            return Err(ModelError::DocumentAlreadyExists(id, collection.to_string()));
        }

        let rev = next_rev(None);
        record.insert(ID_FIELD, id.clone());
        record.insert(REV_FIELD, rev.clone());

        self.check_unique(collection, &record, records).await?;
        records.insert(id.clone(), record);

        debug!(collection, %id, %rev, safe = ?options.safe, "inserted record");
        Ok(WriteAck { id, rev })
    }

    async fn update(&self, collection: &str, mut record: Record, options: &WriteOptions) -> ModelResult<WriteAck> {
        let id = record_id(&record, ID_FIELD)
            .ok_or_else(|| ModelError::Backend(format!("cannot update a record without {ID_FIELD} in {collection}")))?;

        let mut store = self.store.write().await;
        let records = store
            .get_mut(collection)
            .ok_or_else(|| ModelError::DocumentNotFound(id.clone(), collection.to_string()))?;
        let stored_rev = records
            .get(&id)
            .map(record_rev)
            .ok_or_else(|| ModelError::DocumentNotFound(id.clone(), collection.to_string()))?;

        let sent_rev = record_rev(&record);
        if sent_rev != stored_rev {
            warn!(collection, %id, "revision conflict on update");
            return Err(ModelError::Conflict { id, expected: sent_rev, found: stored_rev });
        }

        let rev = next_rev(stored_rev.as_deref());
        record.insert(ID_FIELD, id.clone());
        record.insert(REV_FIELD, rev.clone());

        self.check_unique(collection, &record, records).await?;
        records.insert(id.clone(), record);

        debug!(collection, %id, %rev, safe = ?options.safe, "updated record");
        Ok(WriteAck { id, rev })
    }

    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()> {
        let mut store = self.store.write().await;
        let records = store
            .get_mut(collection)
            .ok_or_else(|| ModelError::DocumentNotFound(id.to_string(), collection.to_string()))?;
        let stored_rev = records
            .get(id)
            .map(record_rev)
            .ok_or_else(|| ModelError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        if let Some(rev) = rev
            && stored_rev.as_deref() != Some(rev)
        {
            warn!(collection, id, "revision conflict on remove");
            return Err(ModelError::Conflict {
                id: id.to_string(),
                expected: Some(rev.to_string()),
                found: stored_rev,
            });
        }

        records.remove(id);
        debug!(collection, id, "removed record");

        Ok(())
    }

    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>> {
        let store = self.store.read().await;
        let records = store.get(collection);

        Ok(ids
            .iter()
            .map(|id| records.and_then(|records| records.get(id)).cloned())
            .collect())
    }

    async fn query_by_view(&self, collection: &str, view: &str, options: ViewOptions) -> ModelResult<Vec<Record>> {
        let emit = self
            .views
            .get(view)
            .ok_or_else(|| ModelError::ViewNotFound(view.to_string()))?;

        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut rows = records
            .iter()
            .flat_map(|(id, record)| emit(record).into_iter().map(move |key| (key, id, record)))
            .filter(|(key, _, _)| {
                options
                    .key
                    .as_ref()
                    .is_none_or(|wanted| collate(key, wanted).is_eq())
            })
            .collect::<Vec<_>>();

        rows.sort_by(|(left_key, left_id, _), (right_key, right_id, _)| {
            collate(left_key, right_key).then_with(|| left_id.cmp(right_id))
        });

        if options.descending {
            rows.reverse();
        }

        Ok(rows
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|(_, _, record)| record.clone())
            .collect())
    }

    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()> {
        let in_flight = self.index_builds.fetch_add(1, Ordering::SeqCst);
        let _guard = BuildGuard(&self.index_builds);

        if self.index_builds_exclusive && in_flight > 0 {
            warn!(collection, keys = %spec.keys, "rejecting overlapping index build");
            return Err(ModelError::Backend(format!(
                "an index build is already in progress, cannot build {} on {collection}",
                spec.keys
            )));
        }

        yield_once().await;

        if is_unique(&spec) {
            let store = self.store.read().await;
            let mut seen = Vec::new();

            for record in store.get(collection).into_iter().flat_map(HashMap::values) {
                if let Some(key) = index_key(&spec, record) {
                    if seen.contains(&key) {
                        return Err(ModelError::Backend(format!(
                            "duplicate key {key:?} prevents unique index {} on {collection}",
                            spec.keys
                        )));
                    }
                    seen.push(key);
                }
            }
        }

        let mut indexes = self.indexes.write().await;
        let built = indexes.entry(collection.to_string()).or_default();

        if !built.iter().any(|existing| existing.keys == spec.keys) {
            debug!(collection, keys = %spec.keys, "built index");
            built.push(spec);
        }

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_index_builds_exclusive(true)
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    views: HashMap<String, ViewFn>,
    index_builds_exclusive: bool,
}

impl InMemoryStoreBuilder {
    /// Defines a named view. `emit` returns the keys a record is listed under.
    pub fn with_view<F>(mut self, name: impl Into<String>, emit: F) -> Self
    where
        F: Fn(&Record) -> Vec<Bson> + Send + Sync + 'static,
    {
        self.views.insert(name.into(), Arc::new(emit));
        self
    }

    /// Rejects an index build while another one is still running.
    pub fn with_index_builds_exclusive(mut self, exclusive: bool) -> Self {
        self.index_builds_exclusive = exclusive;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(InMemoryStore {
            views: Arc::new(self.views),
            index_builds_exclusive: self.index_builds_exclusive,
            ..InMemoryStore::default()
        })
    }
}
