//! Object-document mapping over revisioned document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Schemas and casting** ([`schema`], [`cast`]) - Typed field declarations and value casting
//! - **Path resolution** ([`path`]) - Maps dotted, array-positional paths to their casting rule
//! - **Documents** ([`document`], [`state`]) - Schema-typed entities and their lifecycle state machine
//! - **Models** ([`model`], [`registry`]) - Model descriptors and the name-to-model table
//! - **Persistence** ([`persist`]) - Save, remove and bulk operations with retry-safe state handling
//! - **Hydration and lookups** ([`hydrate`], [`reorder`]) - Rebuilding documents and reassembling multi-id results
//! - **Index provisioning** ([`index`]) - Strictly sequential index builds
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Events and errors** ([`events`], [`error`]) - Lifecycle notifications and the error types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{model::Model, schema::{Schema, SchemaType}};
//! use bson::Bson;
//!
//! let schema = Schema::builder()
//!     .required("email", SchemaType::String)
//!     .field("age", SchemaType::Number)
//!     .build();
//!
//! let users = Model::builder("users", schema, backend).build();
//! let mut user = users.new_document();
//! user.set("email", Bson::from("ann@example.com"))?;
//! users.save(&mut user).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod cast;
pub mod document;
pub mod error;
pub mod events;
pub mod hydrate;
pub mod index;
pub mod model;
pub mod path;
pub mod persist;
pub mod record;
pub mod registry;
pub mod reorder;
pub mod schema;
pub mod state;

#[cfg(test)]
mod testing;
