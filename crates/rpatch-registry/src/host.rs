use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::snapshot::RegistrySnapshot;

/// The only two things rpatch needs from the host registry.
///
/// How the host performs the swap (a replace callback, a mutable handle, a
/// reflective field write) is the implementor's business. Mutations are
/// serialized by the caller, so `install` needs no compare-and-swap.
pub trait RegistryHost: Send + Sync {
    /// The snapshot readers currently observe.
    fn current_snapshot(&self) -> Arc<RegistrySnapshot>;

    /// Replace the live snapshot in one step.
    ///
    /// On error the previously installed snapshot must remain live.
    fn install(&self, snapshot: Arc<RegistrySnapshot>) -> PatchResult<()>;
}

/// A [`RegistryHost`] backed by an [`ArcSwap`].
///
/// Reads are lock-free and always return a complete snapshot. The handle
/// can be detached to simulate a host that refuses installs.
pub struct SwapHost {
    snap: ArcSwap<RegistrySnapshot>,
    attached: AtomicBool,
    installs: AtomicU64,
}

impl SwapHost {
    pub fn new(initial: RegistrySnapshot) -> Self {
        Self {
            snap: ArcSwap::from_pointee(initial),
            attached: AtomicBool::new(true),
            installs: AtomicU64::new(0),
        }
    }

    /// Make every subsequent install fail with [`PatchError::HostUnavailable`].
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    /// Number of snapshots installed since construction.
    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::SeqCst)
    }
}

impl Default for SwapHost {
    fn default() -> Self {
        Self::new(RegistrySnapshot::new())
    }
}

impl RegistryHost for SwapHost {
    fn current_snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snap.load_full()
    }

    fn install(&self, snapshot: Arc<RegistrySnapshot>) -> PatchResult<()> {
        if !self.attached.load(Ordering::SeqCst) {
            return Err(PatchError::HostUnavailable);
        }
        let entries = snapshot.len();
        self.snap.store(snapshot);
        let seq = self.installs.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq, entries, "snapshot installed");
        Ok(())
    }
}

impl std::fmt::Debug for SwapHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapHost")
            .field("entries", &self.snap.load().len())
            .field("attached", &self.attached.load(Ordering::SeqCst))
            .field("installs", &self.install_count())
            .finish()
    }
}
