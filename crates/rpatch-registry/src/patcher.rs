//! Copy-then-install patching.
//!
//! Every patch starts from a clone of a base snapshot (sharing its sub-maps),
//! edits that private copy, and only then hands it to the host. The base
//! itself is never touched, so a failed install leaves nothing to undo.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use rpatch_types::{RecipeDescriptor, RecipeId};

use crate::error::PatchResult;
use crate::host::RegistryHost;
use crate::pending::PendingRecipeSet;
use crate::snapshot::RegistrySnapshot;

/// Counts of what a [`Patch`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub added: usize,
    pub removed: usize,
    pub suppressed: usize,
}

/// A candidate snapshot under construction.
#[derive(Debug)]
pub struct Patch {
    draft: RegistrySnapshot,
    stats: PatchStats,
}

impl Patch {
    /// Start a patch on a shallow copy of `base`.
    pub fn on(base: &RegistrySnapshot) -> Self {
        Self {
            draft: base.clone(),
            stats: PatchStats::default(),
        }
    }

    /// File one entry under its type, replacing the id wherever it was.
    pub fn put(mut self, id: RecipeId, descriptor: Arc<RecipeDescriptor>) -> Self {
        self.draft.insert(id, descriptor);
        self.stats.added += 1;
        self
    }

    /// Merge every staged entry.
    pub fn add_all(mut self, staged: &PendingRecipeSet) -> Self {
        for (id, descriptor) in staged.iter() {
            self = self.put(id.clone(), Arc::clone(descriptor));
        }
        self
    }

    /// Drop ids from every type that holds them.
    pub fn remove_all<'a>(mut self, ids: impl IntoIterator<Item = &'a RecipeId>) -> Self {
        for id in ids {
            if self.draft.remove(id) {
                self.stats.removed += 1;
            }
        }
        self
    }

    /// Unconditionally exclude suppressed ids, whatever layer put them here.
    pub fn exclude(mut self, blacklist: &BTreeSet<RecipeId>) -> Self {
        for id in blacklist {
            if self.draft.remove(id) {
                self.stats.suppressed += 1;
            }
        }
        self
    }

    pub fn build(self) -> (RegistrySnapshot, PatchStats) {
        (self.draft, self.stats)
    }
}

/// Builds candidate snapshots and installs them through the host.
#[derive(Clone)]
pub struct RegistryPatcher {
    host: Arc<dyn RegistryHost>,
}

impl RegistryPatcher {
    pub fn new(host: Arc<dyn RegistryHost>) -> Self {
        Self { host }
    }

    /// The snapshot currently live in the host.
    pub fn current(&self) -> Arc<RegistrySnapshot> {
        self.host.current_snapshot()
    }

    /// `base` plus every staged entry.
    pub fn apply_additions(base: &RegistrySnapshot, staged: &PendingRecipeSet) -> RegistrySnapshot {
        Patch::on(base).add_all(staged).build().0
    }

    /// `base` without `id`. The flag reports whether any type held it.
    pub fn apply_removal(base: &RegistrySnapshot, id: &RecipeId) -> (RegistrySnapshot, bool) {
        let (snapshot, stats) = Patch::on(base).remove_all([id]).build();
        (snapshot, stats.removed > 0)
    }

    /// Swap `snapshot` in as the live registry.
    ///
    /// On error the host keeps its previous snapshot and the candidate is
    /// dropped; callers keep whatever they staged and may retry.
    pub fn install(&self, snapshot: RegistrySnapshot) -> PatchResult<Arc<RegistrySnapshot>> {
        let snapshot = Arc::new(snapshot);
        self.host.install(Arc::clone(&snapshot))?;
        debug!(entries = snapshot.len(), "patch installed");
        Ok(snapshot)
    }
}

impl std::fmt::Debug for RegistryPatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryPatcher")
            .field("live_entries", &self.host.current_snapshot().len())
            .finish()
    }
}
