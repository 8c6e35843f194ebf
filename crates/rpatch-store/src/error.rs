use std::path::PathBuf;

use rpatch_types::{TypeError, ValidationError};

/// A stored record could not be turned back into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The `kind` tag names no known recipe kind.
    #[error("unknown recipe kind {0:?}")]
    UnknownKind(String),

    /// A field required by the record's kind is absent.
    #[error("{kind} record is missing field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A keyed ingredient appeared in a list-only kind, or vice versa.
    #[error("{kind} record has malformed ingredients: {reason}")]
    MalformedIngredients { kind: &'static str, reason: String },

    /// The embedded id or an item reference did not parse.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The decoded descriptor failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from recipe and id-set store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error at {path}: {reason}")]
    Serialization { path: PathBuf, reason: String },

    /// A record was read but could not be decoded.
    #[error("corrupt record {id}: {source}")]
    CorruptRecord {
        id: String,
        #[source]
        source: RecordError,
    },

    /// The record embeds a different id than the one it was stored under.
    #[error("record stored as {expected} claims id {found}")]
    IdMismatch { expected: String, found: String },

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
