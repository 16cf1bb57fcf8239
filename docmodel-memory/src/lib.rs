//! In-memory revisioned storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Revision tracking** - Every write assigns a new `<n>-<uuid>` revision; stale writes conflict
//! - **Views** - Named key-emitting functions queried with key, skip, limit and direction
//! - **Index bookkeeping** - Unique indexes are enforced; overlapping builds can be rejected
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{memory::InMemoryStore, model::Model, schema::{Schema, SchemaType}};
//! use docmodel::backend::StoreBackendBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let schema = Schema::builder().required("name", SchemaType::String).build();
//!     let users = Model::builder("users", schema, Arc::new(backend)).build();
//!
//!     let mut user = users.new_document();
//!     user.set("name", "Alice")?;
//!     users.save(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

mod collation;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder, ViewFn};
