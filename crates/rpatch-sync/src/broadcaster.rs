use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use rpatch_registry::RegistrySnapshot;

use crate::error::{SyncError, SyncResult};

/// One pushed snapshot.
#[derive(Clone, Debug)]
pub struct SyncMessage {
    /// Strictly increasing across the broadcaster's lifetime, starting at 1.
    pub sequence: u64,
    pub snapshot: Arc<RegistrySnapshot>,
}

/// A receiver for pushed snapshots.
pub type SnapshotStream = broadcast::Receiver<SyncMessage>;

/// Pushes each newly installed snapshot to observers.
pub trait SnapshotBroadcaster: Send + Sync {
    /// Deliver `snapshot` to every live observer. Returns how many received it.
    fn broadcast(&self, snapshot: &Arc<RegistrySnapshot>) -> usize;
}

/// Per-observer broadcast channel fan-out.
///
/// Each observer gets its own bounded channel so a slow observer lags (and
/// skips to the newest snapshot) without holding back the others. Observers
/// whose receiver has been dropped are pruned on the next broadcast.
pub struct ClientSyncBroadcaster {
    observers: RwLock<Vec<broadcast::Sender<SyncMessage>>>,
    capacity: usize,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl ClientSyncBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> SyncResult<SnapshotStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Closed);
        }
        let (tx, rx) = broadcast::channel(self.capacity);
        self.observers
            .write()
            .expect("observer lock poisoned")
            .push(tx);
        Ok(rx)
    }

    /// Number of registered observers, including ones not yet pruned.
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .expect("observer lock poisoned")
            .len()
    }

    /// Sequence number of the last message sent, 0 if none.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Drop every observer and refuse new ones. Open streams see the channel
    /// close once they drain.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut observers = self.observers.write().expect("observer lock poisoned");
        debug!(observers = observers.len(), "sync broadcaster closed");
        observers.clear();
    }
}

impl Default for ClientSyncBroadcaster {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SnapshotBroadcaster for ClientSyncBroadcaster {
    fn broadcast(&self, snapshot: &Arc<RegistrySnapshot>) -> usize {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let message = SyncMessage {
            sequence,
            snapshot: Arc::clone(snapshot),
        };
        let mut observers = self.observers.write().expect("observer lock poisoned");
        // A failed send means every receiver for that observer is gone.
        observers.retain(|tx| tx.send(message.clone()).is_ok());
        let delivered = observers.len();
        debug!(sequence, delivered, entries = snapshot.len(), "snapshot broadcast");
        delivered
    }
}

impl std::fmt::Debug for ClientSyncBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSyncBroadcaster")
            .field("observers", &self.observer_count())
            .field("sequence", &self.last_sequence())
            .finish()
    }
}
