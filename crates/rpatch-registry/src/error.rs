use thiserror::Error;

/// The host refused to install a candidate snapshot.
///
/// The live snapshot is unchanged whenever this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The host's registry handle is gone (e.g. the server is stopping).
    #[error("registry handle is unavailable")]
    HostUnavailable,

    /// The host rejected the snapshot for a host-specific reason.
    #[error("host rejected snapshot: {0}")]
    Rejected(String),
}

pub type PatchResult<T> = Result<T, PatchError>;
