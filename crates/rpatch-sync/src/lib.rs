//! Client synchronization for rpatch.
//!
//! Every successful patch is pushed, as a full snapshot, to each connected
//! observer. The transport behind an observer is not this crate's concern:
//! observers receive a channel and forward what arrives on it.

pub mod broadcaster;
pub mod error;

pub use broadcaster::{ClientSyncBroadcaster, SnapshotBroadcaster, SnapshotStream, SyncMessage};
pub use error::{SyncError, SyncResult};
