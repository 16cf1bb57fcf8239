//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder, ViewOptions, WriteAck, WriteOptions},
    document::{Document, SerializeOptions},
    error::{ModelError, ModelResult},
    events::{ErrorChannel, LifecycleEvent, LifecycleObserver},
    hydrate::OneOrMany,
    model::{InitHook, Model, ModelBuilder},
    persist::Saved,
    record::Record,
    registry::ModelRegistry,
    reorder::{ReorderMode, ReorderOptions, Slot},
    schema::{Caster, IndexSpec, Schema, SchemaBuilder, SchemaOptions, SchemaType},
    state::DocumentState,
};
