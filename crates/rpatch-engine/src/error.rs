use std::path::PathBuf;

use thiserror::Error;

use rpatch_registry::PatchError;
use rpatch_store::{RecordError, StoreError};
use rpatch_sync::SyncError;
use rpatch_types::{TypeError, ValidationError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The descriptor was rejected before anything was staged.
    #[error("invalid recipe: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),

    /// A record could not be decoded for a reason other than validation.
    #[error("bad record: {0}")]
    Record(RecordError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The host refused the candidate snapshot. The live snapshot and the
    /// pending set are unchanged.
    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("config error at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("a reload is already in progress")]
    ReloadInProgress,

    #[error("recipe service has been shut down")]
    ShutDown,
}

impl From<RecordError> for EngineError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Validation(v) => Self::Validation(v),
            RecordError::Type(t) => Self::Type(t),
            other => Self::Record(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
