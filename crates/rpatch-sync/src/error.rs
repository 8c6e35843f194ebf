/// Errors produced by the sync subsystem.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The broadcaster has been closed and accepts no new observers.
    #[error("broadcaster is closed")]
    Closed,
}

/// Convenience alias used throughout the sync crate.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
