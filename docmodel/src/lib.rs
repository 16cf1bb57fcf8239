//! Main docmodel crate: object-document mapping over revisioned stores.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports
//! the core types from `docmodel-core` and provides convenient access to the
//! bundled storage backends.
//!
//! # Features
//!
//! - **Schema-typed documents** - Declare fields, arrays, nested schemas and references; values are cast on the way in
//! - **Positional path resolution** - `comments.$.author` resolves through array element schemas
//! - **Retry-safe persistence** - Failed inserts leave documents new, concurrent removes share one backend call
//! - **Shape-preserving hydration** - One record in, one document out; many in, many out, failing fast
//! - **Multi-id reassembly** - Lookups come back in the caller's requested shape and order
//! - **Sequential index builds** - For backends that reject overlapping builds
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     let backend = Arc::new(InMemoryStore::builder().build().await?);
//!
//!     let comment = Schema::builder()
//!         .required("body", SchemaType::String)
//!         .field("author", SchemaType::Ref("User".into()))
//!         .build();
//!
//!     let schema = Schema::builder()
//!         .required("title", SchemaType::String)
//!         .array_of("comments", comment)
//!         .index(bson::doc! { "title": 1 }, bson::doc! { "unique": true })
//!         .build();
//!
//!     let posts = ModelRegistry::global().register("Post", schema, backend)?;
//!     posts.ensure_indexes().await?;
//!
//!     let mut post = posts.new_document();
//!     post.set("title", "hello")?;
//!     posts.save(&mut post).await?;
//!
//!     post.set("title", "hello again")?;
//!     posts.save(&mut post).await?;
//!
//!     posts.remove(&post).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Lookups
//!
//! ```ignore
//! use docmodel::{prelude::*, reorder::Slot};
//!
//! let found = posts
//!     .find_by_ids(
//!         vec![Slot::id("b"), Slot::id("a"), Slot::id("missing")],
//!         ReorderMode::FindOne,
//!         &ReorderOptions::default(),
//!     )
//!     .await?;
//!
//! // Positions follow the request, misses are explicit.
//! assert!(matches!(found[2], Slot::Missing));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory revisioned storage for development and testing

pub mod prelude;

pub use docmodel_core::{
    backend, cast, document, error, events, hydrate, index, model, path, persist, record, registry, reorder,
    schema, state,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder, ViewFn};
}
