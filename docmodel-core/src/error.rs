//! Error types and result types for model and document operations.
//!
//! Every fallible operation in this crate returns [`ModelResult<T>`]. Errors are
//! `Clone` so a single outcome can be handed to every caller waiting on a shared
//! operation (see [`crate::persist`]).

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur while mapping documents to a store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Serialization/deserialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A value was rejected before any backend call was made.
    #[error("Validation failed for path `{path}`: {reason}")]
    Validation {
        /// The offending field path.
        path: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A backend insert, update or remove failed.
    #[error("Persistence error during {operation}: {source}")]
    Persistence {
        /// The backend operation that failed (`insert`, `update`, `remove`).
        operation: &'static str,
        /// The error reported by the backend.
        #[source]
        source: Box<ModelError>,
    },
    /// A record could not be turned into a document.
    #[error("Hydration error for record {record}: {reason}")]
    Hydration {
        /// Identifier of the failing record, or `<unsaved>` when it has none.
        record: String,
        /// Why casting or initialization failed.
        reason: String,
    },
    /// A model was looked up under a name that has no registered schema.
    #[error("Schema hasn't been registered for model \"{0}\"")]
    MissingSchema(String),
    /// A model name was registered again with an incompatible schema.
    #[error("Cannot overwrite model \"{0}\" once compiled")]
    OverwriteModel(String),
    /// The document lifecycle does not allow the requested operation.
    #[error("Invalid document state: {0}")]
    InvalidState(String),
    /// A record with the given ID already exists in the collection.
    /// The first argument is the record ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested record was not found in the collection.
    /// The first argument is the record ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The supplied revision does not match the stored one.
    #[error("Revision conflict for document {id}: expected {expected:?}, found {found:?}")]
    Conflict {
        /// The record ID.
        id: String,
        /// The revision the caller sent.
        expected: Option<String>,
        /// The revision currently stored.
        found: Option<String>,
    },
    /// The requested view is not defined on the backend.
    #[error("View not found: {0}")]
    ViewNotFound(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl ModelError {
    /// Wraps a backend failure for the named write operation.
    pub fn persistence(operation: &'static str, source: ModelError) -> Self {
        ModelError::Persistence { operation, source: Box::new(source) }
    }

    /// Builds a hydration error for the record with the given identifier.
    pub fn hydration(record: Option<&str>, reason: impl Into<String>) -> Self {
        ModelError::Hydration {
            record: record.unwrap_or("<unsaved>").to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ModelError {
    fn from(err: SerdeJsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
