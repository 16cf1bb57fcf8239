//! Scripted backend and helpers for unit tests.

use async_trait::async_trait;
use bson::Bson;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    backend::{StoreBackend, ViewOptions, WriteAck, WriteOptions},
    error::{ModelError, ModelResult},
    events::{LifecycleEvent, LifecycleObserver},
    record::{ID_FIELD, REV_FIELD, Record, record_id},
    schema::IndexSpec,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Insert { collection: String, record: Record, options: WriteOptions },
    Update { collection: String, record: Record, options: WriteOptions },
    Remove { collection: String, id: String, rev: Option<String> },
    GetByIds { collection: String, ids: Vec<String> },
    View { collection: String, view: String },
    EnsureIndex { collection: String, spec: IndexSpec },
}

/// Records every call and fails the ones it was told to.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    records: Mutex<HashMap<String, Record>>,
    views: Mutex<HashMap<String, Vec<Record>>>,
    insert_failures: Mutex<VecDeque<ModelError>>,
    update_failures: Mutex<VecDeque<ModelError>>,
    remove_failures: Mutex<VecDeque<ModelError>>,
    title_failures: Mutex<HashMap<String, ModelError>>,
    index_failures: Mutex<HashMap<String, ModelError>>,
    active_index_builds: AtomicUsize,
    max_index_builds: AtomicUsize,
    counter: AtomicUsize,
    immediate: bool,
}

impl ScriptedBackend {
    /// A backend whose calls complete in their first poll.
    pub fn immediate() -> Self {
        Self { immediate: true, ..Self::default() }
    }

    async fn pause(&self) {
        if !self.immediate {
            tokio::task::yield_now().await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn removes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Remove { .. }))
            .count()
    }

    pub fn index_calls(&self) -> Vec<IndexSpec> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::EnsureIndex { spec, .. } => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of index builds observed in flight at once.
    pub fn max_concurrent_index_builds(&self) -> usize {
        self.max_index_builds.load(Ordering::SeqCst)
    }

    pub fn fail_next_insert(&self, error: ModelError) {
        self.insert_failures.lock().push_back(error);
    }

    pub fn fail_next_update(&self, error: ModelError) {
        self.update_failures.lock().push_back(error);
    }

    pub fn fail_next_remove(&self, error: ModelError) {
        self.remove_failures.lock().push_back(error);
    }

    /// Fails every insert whose `title` equals `title`.
    pub fn fail_insert_with_title(&self, title: &str, error: ModelError) {
        self.title_failures.lock().insert(title.to_string(), error);
    }

    /// Fails the index build whose `name` option equals `name`.
    pub fn fail_index_named(&self, name: &str, error: ModelError) {
        self.index_failures.lock().insert(name.to_string(), error);
    }

    pub fn put(&self, record: Record) {
        if let Some(id) = record_id(&record, ID_FIELD) {
            self.records.lock().insert(id, record);
        }
    }

    pub fn set_view(&self, name: &str, rows: Vec<Record>) {
        self.views.lock().insert(name.to_string(), rows);
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn store(&self, mut record: Record, id: String) -> WriteAck {
        let rev = format!("{}-scripted", self.next());
        record.insert(ID_FIELD, id.clone());
        record.insert(REV_FIELD, rev.clone());
        self.records.lock().insert(id.clone(), record);
        WriteAck { id, rev }
    }
}

#[async_trait]
impl StoreBackend for ScriptedBackend {
    async fn insert(&self, collection: &str, record: Record, options: &WriteOptions) -> ModelResult<WriteAck> {
        self.calls.lock().push(Call::Insert {
            collection: collection.to_string(),
            record: record.clone(),
            options: options.clone(),
        });
        self.pause().await;

        let by_title = record
            .get("title")
            .and_then(Bson::as_str)
            .and_then(|title| self.title_failures.lock().get(title).cloned());
        if let Some(error) = by_title.or_else(|| self.insert_failures.lock().pop_front()) {
            return Err(error);
        }

        let id = record_id(&record, ID_FIELD).unwrap_or_else(|| format!("doc-{}", self.next()));
        Ok(self.store(record, id))
    }

    async fn update(&self, collection: &str, record: Record, options: &WriteOptions) -> ModelResult<WriteAck> {
        self.calls.lock().push(Call::Update {
            collection: collection.to_string(),
            record: record.clone(),
            options: options.clone(),
        });
        self.pause().await;

        if let Some(error) = self.update_failures.lock().pop_front() {
            return Err(error);
        }

        let id = record_id(&record, ID_FIELD)
            .ok_or_else(|| ModelError::Backend("update without identifier".into()))?;
        Ok(self.store(record, id))
    }

    async fn remove(&self, collection: &str, id: &str, rev: Option<&str>) -> ModelResult<()> {
        self.calls.lock().push(Call::Remove {
            collection: collection.to_string(),
            id: id.to_string(),
            rev: rev.map(str::to_string),
        });
        self.pause().await;

        if let Some(error) = self.remove_failures.lock().pop_front() {
            return Err(error);
        }

        self.records.lock().remove(id);
        Ok(())
    }

    async fn get_by_ids(&self, collection: &str, ids: Vec<String>) -> ModelResult<Vec<Option<Record>>> {
        self.calls.lock().push(Call::GetByIds { collection: collection.to_string(), ids: ids.clone() });
        self.pause().await;

        let records = self.records.lock();
        Ok(ids.iter().rev().map(|id| records.get(id).cloned()).collect())
    }

    async fn query_by_view(&self, collection: &str, view: &str, _options: ViewOptions) -> ModelResult<Vec<Record>> {
        self.calls.lock().push(Call::View { collection: collection.to_string(), view: view.to_string() });
        self.pause().await;

        self.views
            .lock()
            .get(view)
            .cloned()
            .ok_or_else(|| ModelError::ViewNotFound(view.to_string()))
    }

    async fn ensure_index(&self, collection: &str, spec: IndexSpec) -> ModelResult<()> {
        self.calls.lock().push(Call::EnsureIndex { collection: collection.to_string(), spec: spec.clone() });

        let active = self.active_index_builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_index_builds.fetch_max(active, Ordering::SeqCst);
        self.pause().await;
        self.active_index_builds.fetch_sub(1, Ordering::SeqCst);

        let failure = spec
            .options
            .get("name")
            .and_then(Bson::as_str)
            .and_then(|name| self.index_failures.lock().get(name).cloned());

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// An observer that records every event it receives.
pub fn recorder() -> (Arc<dyn LifecycleObserver>, Arc<Mutex<Vec<LifecycleEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer = move |_model: &str, event: &LifecycleEvent| sink.lock().push(event.clone());

    (Arc::new(observer), seen)
}
