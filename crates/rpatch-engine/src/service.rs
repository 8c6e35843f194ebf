use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use rpatch_registry::{
    ConflictResolver, Patch, PatchStats, PendingRecipeSet, RegistryHost, RegistryPatcher,
    RegistrySnapshot, Visibility,
};
use rpatch_store::StoredRecipe;
use rpatch_sync::{ClientSyncBroadcaster, SnapshotBroadcaster, SnapshotStream};
use rpatch_types::{RecipeDescriptor, RecipeId};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::guard::ReloadFlag;
use crate::journal::Journal;
use crate::reload::{ReloadCoordinator, ReloadReport};
use crate::stores::{Layer, ServiceStores};

/// Settings a service needs beyond its stores.
#[derive(Clone, Debug)]
pub struct ServiceOptions {
    /// Namespace for ids generated by [`RecipeService::add_recipe`].
    pub default_namespace: String,
    pub channel_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ServiceOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_namespace: config.default_namespace.clone(),
            channel_capacity: config.channel_capacity,
        }
    }
}

/// The single owner of the host registry handle and of the authored layers.
///
/// Every mutation takes the state lock, builds a full candidate snapshot,
/// writes what it must, and installs the candidate in one swap. A failure at
/// any step reverses the operation's durable writes and leaves the live
/// snapshot untouched. Staged entries stay pending for a retry.
pub struct RecipeService {
    patcher: RegistryPatcher,
    /// The host's snapshot as captured at init, before any layering.
    builtins: Arc<RegistrySnapshot>,
    stores: ServiceStores,
    pending: Mutex<PendingRecipeSet>,
    reload: ReloadFlag,
    sync: ClientSyncBroadcaster,
    relay: Option<Arc<dyn SnapshotBroadcaster>>,
    default_namespace: String,
    running: AtomicBool,
}

impl RecipeService {
    /// Attach to a host, capturing its current snapshot as the built-in layer.
    pub fn init(host: Arc<dyn RegistryHost>, stores: ServiceStores, options: ServiceOptions) -> Self {
        let builtins = host.current_snapshot();
        info!(
            builtins = builtins.len(),
            namespace = %options.default_namespace,
            "recipe service initialized"
        );
        Self {
            patcher: RegistryPatcher::new(host),
            builtins,
            stores,
            pending: Mutex::new(PendingRecipeSet::new()),
            reload: ReloadFlag::new(),
            sync: ClientSyncBroadcaster::new(options.channel_capacity),
            relay: None,
            default_namespace: options.default_namespace,
            running: AtomicBool::new(true),
        }
    }

    /// Open file stores from `config` and attach to `host`.
    pub fn open(config: &EngineConfig, host: Arc<dyn RegistryHost>) -> EngineResult<Self> {
        let stores = ServiceStores::open(config)?;
        Ok(Self::init(host, stores, ServiceOptions::from(config)))
    }

    /// Also push every installed snapshot through `relay`.
    pub fn with_relay(mut self, relay: Arc<dyn SnapshotBroadcaster>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Stop accepting mutations and disconnect every observer.
    ///
    /// Reads keep working on the last installed snapshot.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let dropped = {
            let mut pending = self.lock();
            let n = pending.count();
            pending.clear();
            n
        };
        self.sync.close();
        info!(dropped_pending = dropped, "recipe service shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receive every snapshot installed from now on.
    pub fn subscribe(&self) -> EngineResult<SnapshotStream> {
        self.ensure_running()?;
        Ok(self.sync.subscribe()?)
    }

    pub fn builtins(&self) -> &RegistrySnapshot {
        &self.builtins
    }

    /// The live snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.patcher.current()
    }

    // ---- Recipes ----

    /// Add a recipe under a generated id: `<default namespace>:<result path>`,
    /// suffixed `_2`, `_3`, ... while that id is taken.
    pub fn add_recipe(&self, descriptor: RecipeDescriptor) -> EngineResult<RecipeId> {
        self.ensure_running()?;
        let mut pending = self.lock();
        let id = self.generate_id(&descriptor, &pending)?;
        self.add_locked(&mut pending, id, descriptor)
    }

    /// Add or replace the recipe under `id`.
    pub fn add_recipe_as(&self, id: RecipeId, descriptor: RecipeDescriptor) -> EngineResult<RecipeId> {
        self.ensure_running()?;
        let mut pending = self.lock();
        self.add_locked(&mut pending, id, descriptor)
    }

    /// Decode a record and add it.
    ///
    /// The id is `id` if given, else the record's embedded id, else generated.
    pub fn add_record(&self, record: &StoredRecipe, id: Option<RecipeId>) -> EngineResult<RecipeId> {
        let descriptor = record.descriptor()?;
        match id {
            Some(id) => self.add_recipe_as(id, descriptor),
            None if !record.id.trim().is_empty() => {
                self.add_recipe_as(RecipeId::parse(&record.id)?, descriptor)
            }
            None => self.add_recipe(descriptor),
        }
    }

    /// Remove `id` from the live snapshot, the pending set, and both recipe
    /// layers. Returns `true` if it was present anywhere.
    ///
    /// A built-in id only leaves the live snapshot; a reload brings it back.
    /// Use the blacklist to hide a built-in for good.
    pub fn delete_recipe(&self, id: &RecipeId) -> EngineResult<bool> {
        self.ensure_running()?;
        let mut pending = self.lock();
        let staged = pending.remove(id);
        let outcome = self.journaled(|journal| {
            let authored = journal.delete(Layer::Recipes, id)?;
            let overridden = journal.delete(Layer::Overrides, id)?;
            let (candidate, live) = RegistryPatcher::apply_removal(&self.patcher.current(), id);
            Ok((authored || overridden || live, live.then_some(candidate)))
        });
        match outcome {
            Ok(existed) => {
                let existed = existed || staged.is_some();
                debug!(%id, existed, "recipe deleted");
                Ok(existed)
            }
            Err(error) => {
                if let Some(descriptor) = staged {
                    pending.add(id.clone(), descriptor);
                }
                Err(error)
            }
        }
    }

    /// Every live id, sorted.
    pub fn list_ids(&self) -> Vec<RecipeId> {
        self.patcher.current().ids()
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.patcher.current().len()
    }

    pub fn get(&self, id: &RecipeId) -> Option<Arc<RecipeDescriptor>> {
        self.patcher.current().get(id).cloned()
    }

    /// How the durable layers resolve `id` over the built-in layer.
    pub fn visibility(&self, id: &RecipeId) -> EngineResult<Visibility> {
        let blacklisted = self.stores.blacklist.contains(id)?;
        let overridden = self.stores.overrides.load(id)?.map(Arc::new);
        let authored = self.stores.recipes.load(id)?.map(Arc::new);
        Ok(ConflictResolver::visibility(
            id,
            &self.builtins,
            authored,
            overridden,
            blacklisted,
        ))
    }

    // ---- Staging ----

    /// Stage a recipe without committing it. Returns the pending count.
    pub fn stage_recipe(&self, id: RecipeId, descriptor: RecipeDescriptor) -> EngineResult<usize> {
        self.ensure_running()?;
        let mut pending = self.lock();
        pending.add(id, descriptor);
        Ok(pending.count())
    }

    /// Persist and install everything staged. Returns how many entries were
    /// committed; the pending set is kept if the commit fails.
    pub fn commit_pending(&self) -> EngineResult<usize> {
        self.ensure_running()?;
        let mut pending = self.lock();
        let staged = pending.count();
        if staged == 0 {
            return Ok(0);
        }
        let base = self.patcher.current();
        self.commit_onto(&mut pending, &base)?;
        Ok(staged)
    }

    /// Drop everything staged. Returns how many entries were dropped.
    pub fn clear_pending(&self) -> EngineResult<usize> {
        self.ensure_running()?;
        let mut pending = self.lock();
        let dropped = pending.count();
        pending.clear();
        Ok(dropped)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().count()
    }

    // ---- Overrides ----

    /// Persist an override and make it visible. Returns `true` if `id` had no
    /// override before.
    pub fn add_override(&self, id: &RecipeId, descriptor: RecipeDescriptor) -> EngineResult<bool> {
        self.ensure_running()?;
        let _pending = self.lock();
        let descriptor = Arc::new(descriptor);
        self.journaled(|journal| {
            let created = journal.save(Layer::Overrides, id, &descriptor)?;
            if self.stores.blacklist.contains(id)? {
                return Ok((created, None));
            }
            let (candidate, _) = Patch::on(&self.patcher.current())
                .put(id.clone(), Arc::clone(&descriptor))
                .build();
            Ok((created, Some(candidate)))
        })
    }

    /// Drop an override; whatever layer is underneath becomes visible again.
    pub fn remove_override(&self, id: &RecipeId) -> EngineResult<bool> {
        self.ensure_running()?;
        let _pending = self.lock();
        self.journaled(|journal| {
            if !journal.delete(Layer::Overrides, id)? {
                return Ok((false, None));
            }
            Ok((true, self.relayer([id])?))
        })
    }

    /// Drop every override. Returns how many were removed.
    pub fn clear_overrides(&self) -> EngineResult<usize> {
        self.ensure_running()?;
        let _pending = self.lock();
        self.journaled(|journal| {
            let mut removed = Vec::new();
            for id in self.stores.overrides.list_ids()? {
                if journal.delete(Layer::Overrides, &id)? {
                    removed.push(id);
                }
            }
            if removed.is_empty() {
                return Ok((0, None));
            }
            Ok((removed.len(), self.relayer(&removed)?))
        })
    }

    pub fn list_overrides(&self) -> EngineResult<Vec<RecipeId>> {
        Ok(self.stores.overrides.list_ids()?)
    }

    // ---- Blacklist ----

    /// Suppress `id` whatever layer provides it. Returns `true` if it was not
    /// already blacklisted.
    pub fn add_to_blacklist(&self, id: &RecipeId) -> EngineResult<bool> {
        self.ensure_running()?;
        let _pending = self.lock();
        self.journaled(|journal| {
            let added = journal.blacklist_insert(id)?;
            let (candidate, live) = RegistryPatcher::apply_removal(&self.patcher.current(), id);
            Ok((added, live.then_some(candidate)))
        })
    }

    pub fn remove_from_blacklist(&self, id: &RecipeId) -> EngineResult<bool> {
        self.ensure_running()?;
        let _pending = self.lock();
        self.journaled(|journal| {
            if !journal.blacklist_remove(id)? {
                return Ok((false, None));
            }
            Ok((true, self.relayer([id])?))
        })
    }

    /// Lift every suppression. Returns how many ids were removed.
    pub fn clear_blacklist(&self) -> EngineResult<usize> {
        self.ensure_running()?;
        let _pending = self.lock();
        self.journaled(|journal| {
            let mut lifted = Vec::new();
            for id in self.stores.blacklist.list()? {
                if journal.blacklist_remove(&id)? {
                    lifted.push(id);
                }
            }
            if lifted.is_empty() {
                return Ok((0, None));
            }
            Ok((lifted.len(), self.relayer(&lifted)?))
        })
    }

    pub fn list_blacklist(&self) -> EngineResult<BTreeSet<RecipeId>> {
        Ok(self.stores.blacklist.list()?)
    }

    // ---- Reload ----

    /// Rebuild the live snapshot from the built-in layer and storage.
    ///
    /// Nothing is written to storage while the rebuild runs, so reloading
    /// twice yields the same snapshot.
    pub fn reload_from_store(&self) -> EngineResult<ReloadReport> {
        self.ensure_running()?;
        let guard = self
            .reload
            .try_acquire()
            .ok_or(EngineError::ReloadInProgress)?;
        let mut pending = self.lock();
        let result = self.rebuild(&mut pending);
        if result.is_err() {
            // Entries staged by a failed rebuild came from storage and must
            // never be committed as authored records.
            pending.clear();
        }
        // Release the lock before the flag so no mutation can run while
        // the flag still reads as set.
        drop(pending);
        drop(guard);

        let report = result?;
        info!(
            loaded = report.loaded,
            failed = report.failed,
            overridden = report.overridden,
            suppressed = report.suppressed,
            total = report.total,
            "reload complete"
        );
        Ok(report)
    }

    #[cfg(test)]
    pub(crate) fn reload_flag(&self) -> &ReloadFlag {
        &self.reload
    }

    // ---- Internals ----

    fn rebuild(&self, pending: &mut PendingRecipeSet) -> EngineResult<ReloadReport> {
        let coordinator = ReloadCoordinator::new(&self.stores, &self.builtins);
        let mut report = ReloadReport::default();
        let override_ids = coordinator.stage_layers(pending, &mut report)?;
        let blacklist = self.stores.blacklist.list()?;
        let base = coordinator.resolve_base(&override_ids, &blacklist, &mut report);
        self.commit_onto(pending, &base)?;
        report.total = self.patcher.current().len();
        Ok(report)
    }

    fn add_locked(
        &self,
        pending: &mut PendingRecipeSet,
        id: RecipeId,
        descriptor: RecipeDescriptor,
    ) -> EngineResult<RecipeId> {
        pending.add(id.clone(), descriptor);
        let base = self.patcher.current();
        self.commit_onto(pending, &base)?;
        debug!(%id, "recipe added");
        Ok(id)
    }

    /// Merge `pending` into `base`, persist it, install, and clear it.
    ///
    /// While a reload holds the flag the authored layer is not written: the
    /// entries being committed were just read from it.
    fn commit_onto(&self, pending: &mut PendingRecipeSet, base: &RegistrySnapshot) -> EngineResult<PatchStats> {
        let staged: &PendingRecipeSet = pending;
        let suspended = self.reload.is_active();
        if suspended {
            debug!(staged = staged.count(), "reload in progress, persistence skipped");
        }
        let stats = self.journaled(|journal| {
            let blacklist = self.stores.blacklist.list()?;
            let mut visible = PendingRecipeSet::new();
            for (id, descriptor) in staged.iter() {
                if !suspended {
                    journal.save(Layer::Recipes, id, descriptor)?;
                    if self.stores.overrides.contains(id)? {
                        debug!(%id, "authored record shadowed by override");
                        continue;
                    }
                }
                visible.add(id.clone(), Arc::clone(descriptor));
            }
            let merged = RegistryPatcher::apply_additions(base, &visible);
            let (candidate, stats) = Patch::on(&merged).exclude(&blacklist).build();
            let stats = PatchStats {
                added: visible.count(),
                ..stats
            };
            Ok((stats, Some(candidate)))
        })?;
        pending.clear();
        debug!(
            added = stats.added,
            suppressed = stats.suppressed,
            "pending committed"
        );
        Ok(stats)
    }

    /// Run `op` against a fresh journal, then install the candidate it
    /// returns. Durable writes are reversed if `op` or the install fails.
    fn journaled<T>(
        &self,
        op: impl FnOnce(&mut Journal<'_>) -> EngineResult<(T, Option<RegistrySnapshot>)>,
    ) -> EngineResult<T> {
        let mut journal = Journal::new(&self.stores);
        let (out, candidate) = match op(&mut journal) {
            Ok(done) => done,
            Err(error) => {
                journal.rollback();
                return Err(error);
            }
        };
        if let Some(candidate) = candidate {
            self.install(candidate, journal)?;
        }
        Ok(out)
    }

    fn install(&self, candidate: RegistrySnapshot, journal: Journal<'_>) -> EngineResult<()> {
        match self.patcher.install(candidate) {
            Ok(snapshot) => {
                self.publish(&snapshot);
                Ok(())
            }
            Err(error) => {
                debug!(%error, writes = journal.len(), "install rejected");
                journal.rollback();
                Err(error.into())
            }
        }
    }

    fn publish(&self, snapshot: &Arc<RegistrySnapshot>) {
        let delivered = self.sync.broadcast(snapshot);
        let relayed = self
            .relay
            .as_ref()
            .map_or(0, |relay| relay.broadcast(snapshot));
        debug!(delivered, relayed, "snapshot published");
    }

    /// The live snapshot with each id re-resolved from the durable layers,
    /// or `None` if every id already resolves to what is live.
    fn relayer<'i>(
        &self,
        ids: impl IntoIterator<Item = &'i RecipeId>,
    ) -> EngineResult<Option<RegistrySnapshot>> {
        let live = self.patcher.current();
        let mut patch = Patch::on(&live);
        let mut changed = false;
        for id in ids {
            let resolved = self.layered(id)?;
            if resolved.as_deref() == live.get(id).map(|d| d.as_ref()) {
                continue;
            }
            changed = true;
            patch = match resolved {
                Some(descriptor) => patch.put(id.clone(), descriptor),
                None => patch.remove_all([id]),
            };
        }
        Ok(changed.then(|| patch.build().0))
    }

    fn layered(&self, id: &RecipeId) -> EngineResult<Option<Arc<RecipeDescriptor>>> {
        if self.stores.blacklist.contains(id)? {
            return Ok(None);
        }
        if let Some(descriptor) = self.stores.overrides.load(id)? {
            return Ok(Some(Arc::new(descriptor)));
        }
        if let Some(descriptor) = self.stores.recipes.load(id)? {
            return Ok(Some(Arc::new(descriptor)));
        }
        Ok(self.builtins.get(id).cloned())
    }

    fn generate_id(&self, descriptor: &RecipeDescriptor, pending: &PendingRecipeSet) -> EngineResult<RecipeId> {
        let live = self.patcher.current();
        let taken = |id: &RecipeId| -> EngineResult<bool> {
            Ok(live.contains(id)
                || pending.contains(id)
                || self.stores.recipes.contains(id)?
                || self.stores.overrides.contains(id)?)
        };
        let base = RecipeId::new(self.default_namespace.as_str(), descriptor.result().item_path())?;
        if !taken(&base)? {
            return Ok(base);
        }
        let mut n = 2u32;
        loop {
            let candidate = base.with_path(format!("{}_{n}", base.path()))?;
            if !taken(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::ShutDown)
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingRecipeSet> {
        self.pending.lock().expect("lock poisoned")
    }
}

impl std::fmt::Debug for RecipeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeService")
            .field("builtins", &self.builtins.len())
            .field("live", &self.count())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpatch_registry::{Origin, SwapHost};
    use rpatch_store::{IdSetStore, InMemoryIdSetStore, InMemoryRecipeStore, RecipeStore};
    use rpatch_types::{Ingredient, ItemStack};
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        host: Arc<SwapHost>,
        recipes: Arc<InMemoryRecipeStore>,
        overrides: Arc<InMemoryRecipeStore>,
        blacklist: Arc<InMemoryIdSetStore>,
        service: RecipeService,
    }

    fn id(s: &str) -> RecipeId {
        RecipeId::parse(s).unwrap()
    }

    fn stick(count: u32) -> RecipeDescriptor {
        RecipeDescriptor::shapeless(
            ItemStack::new("minecraft:stick", count),
            vec![Ingredient::tag("minecraft:planks")],
        )
        .unwrap()
    }

    fn fixture() -> Fixture {
        let host = Arc::new(SwapHost::new(RegistrySnapshot::from_entries([(
            id("minecraft:stick"),
            stick(4),
        )])));
        let recipes = Arc::new(InMemoryRecipeStore::new());
        let overrides = Arc::new(InMemoryRecipeStore::new());
        let blacklist = Arc::new(InMemoryIdSetStore::new());
        let stores = ServiceStores {
            recipes: recipes.clone(),
            overrides: overrides.clone(),
            blacklist: blacklist.clone(),
        };
        let service = RecipeService::init(host.clone(), stores, ServiceOptions::default());
        Fixture {
            host,
            recipes,
            overrides,
            blacklist,
            service,
        }
    }

    // ---- Recipes ----

    #[test]
    fn add_recipe_generates_unique_ids() {
        let f = fixture();
        let first = f.service.add_recipe(stick(2)).unwrap();
        let second = f.service.add_recipe(stick(3)).unwrap();
        assert_eq!(first, id("custom:stick"));
        assert_eq!(second, id("custom:stick_2"));
        assert_eq!(f.service.count(), 3);
        assert_eq!(f.recipes.len(), 2);
    }

    #[test]
    fn add_recipe_as_replaces_and_persists() {
        let f = fixture();
        f.service.add_recipe_as(id("mod:a"), stick(1)).unwrap();
        f.service.add_recipe_as(id("mod:a"), stick(7)).unwrap();
        assert_eq!(f.service.get(&id("mod:a")).unwrap().result().count, 7);
        assert_eq!(f.recipes.load(&id("mod:a")).unwrap().unwrap().result().count, 7);
        assert_eq!(f.service.pending_count(), 0);
    }

    #[test]
    fn add_record_uses_embedded_id() {
        let f = fixture();
        let record = StoredRecipe::encode(&id("mod:from_file"), &stick(2));
        assert_eq!(f.service.add_record(&record, None).unwrap(), id("mod:from_file"));

        let explicit = f.service.add_record(&record, Some(id("mod:renamed"))).unwrap();
        assert_eq!(explicit, id("mod:renamed"));

        let mut anonymous = record.clone();
        anonymous.id = String::new();
        assert_eq!(f.service.add_record(&anonymous, None).unwrap(), id("custom:stick"));
    }

    #[test]
    fn delete_unknown_id_is_false() {
        let f = fixture();
        assert!(!f.service.delete_recipe(&id("mod:nothing")).unwrap());
        assert_eq!(f.host.install_count(), 0);
    }

    #[test]
    fn delete_staged_only_id() {
        let f = fixture();
        f.service.stage_recipe(id("mod:staged"), stick(1)).unwrap();
        assert!(f.service.delete_recipe(&id("mod:staged")).unwrap());
        assert_eq!(f.service.pending_count(), 0);
        assert_eq!(f.host.install_count(), 0);
    }

    #[test]
    fn delete_builtin_returns_on_reload() {
        let f = fixture();
        assert!(f.service.delete_recipe(&id("minecraft:stick")).unwrap());
        assert_eq!(f.service.count(), 0);
        f.service.reload_from_store().unwrap();
        assert!(f.service.get(&id("minecraft:stick")).is_some());
    }

    // ---- Staging ----

    #[test]
    fn staged_entries_wait_for_commit() {
        let f = fixture();
        f.service.stage_recipe(id("mod:a"), stick(1)).unwrap();
        assert_eq!(f.service.stage_recipe(id("mod:b"), stick(1)).unwrap(), 2);
        assert_eq!(f.service.count(), 1);
        assert_eq!(f.service.commit_pending().unwrap(), 2);
        assert_eq!(f.service.count(), 3);
        assert_eq!(f.service.commit_pending().unwrap(), 0);
        assert_eq!(f.host.install_count(), 1);
    }

    #[test]
    fn clear_pending_discards() {
        let f = fixture();
        f.service.stage_recipe(id("mod:a"), stick(1)).unwrap();
        assert_eq!(f.service.clear_pending().unwrap(), 1);
        assert_eq!(f.service.commit_pending().unwrap(), 0);
        assert!(f.recipes.is_empty());
    }

    #[test]
    fn failed_commit_keeps_pending_and_rolls_back() {
        let f = fixture();
        f.service.stage_recipe(id("mod:a"), stick(1)).unwrap();
        f.host.detach();
        assert!(matches!(f.service.commit_pending(), Err(EngineError::Patch(_))));
        assert_eq!(f.service.pending_count(), 1);
        assert!(f.recipes.is_empty());

        f.host.attach();
        assert_eq!(f.service.commit_pending().unwrap(), 1);
        assert!(f.recipes.contains(&id("mod:a")).unwrap());
    }

    #[test]
    fn store_failure_leaves_snapshot_alone() {
        let f = fixture();
        f.recipes.set_read_only(true);
        let before = f.service.snapshot();
        let err = f.service.add_recipe_as(id("mod:a"), stick(1)).unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        assert!(Arc::ptr_eq(&before, &f.service.snapshot()));
    }

    // ---- Overrides ----

    #[test]
    fn override_lifecycle() {
        let f = fixture();
        assert!(f.service.add_override(&id("minecraft:stick"), stick(8)).unwrap());
        assert!(!f.service.add_override(&id("minecraft:stick"), stick(9)).unwrap());
        assert_eq!(f.service.get(&id("minecraft:stick")).unwrap().result().count, 9);
        assert_eq!(f.service.list_overrides().unwrap(), vec![id("minecraft:stick")]);

        assert!(f.service.remove_override(&id("minecraft:stick")).unwrap());
        assert!(!f.service.remove_override(&id("minecraft:stick")).unwrap());
        assert_eq!(f.service.get(&id("minecraft:stick")).unwrap().result().count, 4);
    }

    #[test]
    fn override_shadows_authored_record() {
        let f = fixture();
        f.service.add_override(&id("mod:a"), stick(5)).unwrap();
        f.service.add_recipe_as(id("mod:a"), stick(1)).unwrap();
        assert_eq!(f.service.get(&id("mod:a")).unwrap().result().count, 5);

        f.service.remove_override(&id("mod:a")).unwrap();
        assert_eq!(f.service.get(&id("mod:a")).unwrap().result().count, 1);
    }

    #[test]
    fn clear_overrides_counts_and_restores() {
        let f = fixture();
        f.service.add_override(&id("minecraft:stick"), stick(8)).unwrap();
        f.service.add_override(&id("mod:extra"), stick(1)).unwrap();
        assert_eq!(f.service.clear_overrides().unwrap(), 2);
        assert!(f.overrides.is_empty());
        assert_eq!(f.service.list_ids(), vec![id("minecraft:stick")]);
        assert_eq!(f.service.clear_overrides().unwrap(), 0);
    }

    // ---- Blacklist ----

    #[test]
    fn blacklist_lifecycle() {
        let f = fixture();
        assert!(f.service.add_to_blacklist(&id("minecraft:stick")).unwrap());
        assert!(!f.service.add_to_blacklist(&id("minecraft:stick")).unwrap());
        assert_eq!(f.service.count(), 0);
        assert!(f.blacklist.contains(&id("minecraft:stick")).unwrap());

        assert!(f.service.remove_from_blacklist(&id("minecraft:stick")).unwrap());
        assert_eq!(f.service.count(), 1);
        assert!(!f.service.remove_from_blacklist(&id("minecraft:stick")).unwrap());
    }

    #[test]
    fn blacklisted_addition_is_persisted_but_hidden() {
        let f = fixture();
        f.service.add_to_blacklist(&id("mod:a")).unwrap();
        f.service.add_recipe_as(id("mod:a"), stick(1)).unwrap();
        assert!(f.service.get(&id("mod:a")).is_none());
        assert!(f.recipes.contains(&id("mod:a")).unwrap());

        assert_eq!(f.service.clear_blacklist().unwrap(), 1);
        assert!(f.service.get(&id("mod:a")).is_some());
        assert!(f.service.list_blacklist().unwrap().is_empty());
    }

    #[test]
    fn lifting_suppression_of_absent_id_installs_nothing() {
        let f = fixture();
        let mut stream = f.service.subscribe().unwrap();
        f.service.add_to_blacklist(&id("mod:b")).unwrap();
        assert!(f.service.remove_from_blacklist(&id("mod:b")).unwrap());
        f.service.add_to_blacklist(&id("mod:c")).unwrap();
        assert_eq!(f.service.clear_blacklist().unwrap(), 1);
        assert_eq!(f.host.install_count(), 0);
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn removing_override_equal_to_base_installs_nothing() {
        let f = fixture();
        f.overrides.save(&id("minecraft:stick"), &stick(4)).unwrap();
        assert!(f.service.remove_override(&id("minecraft:stick")).unwrap());
        assert_eq!(f.host.install_count(), 0);
        assert_eq!(f.service.get(&id("minecraft:stick")).unwrap().result().count, 4);
    }

    #[test]
    fn failed_blacklist_install_rolls_back_store() {
        let f = fixture();
        f.host.detach();
        assert!(f.service.add_to_blacklist(&id("minecraft:stick")).is_err());
        assert!(!f.blacklist.contains(&id("minecraft:stick")).unwrap());
        assert_eq!(f.service.count(), 1);
    }

    // ---- Visibility ----

    #[test]
    fn visibility_reports_origin() {
        let f = fixture();
        assert_eq!(
            f.service.visibility(&id("minecraft:stick")).unwrap().origin(),
            Some(Origin::Base)
        );
        f.service.add_recipe_as(id("mod:a"), stick(1)).unwrap();
        assert_eq!(f.service.visibility(&id("mod:a")).unwrap().origin(), Some(Origin::Authored));
        f.service.add_override(&id("mod:a"), stick(2)).unwrap();
        assert_eq!(f.service.visibility(&id("mod:a")).unwrap().origin(), Some(Origin::Override));
        f.service.add_to_blacklist(&id("mod:a")).unwrap();
        assert_eq!(f.service.visibility(&id("mod:a")).unwrap(), Visibility::Absent);
    }

    // ---- Lifecycle & sync ----

    #[derive(Default)]
    struct CountingRelay(AtomicUsize);

    impl SnapshotBroadcaster for CountingRelay {
        fn broadcast(&self, _snapshot: &Arc<RegistrySnapshot>) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst);
            1
        }
    }

    #[test]
    fn one_broadcast_per_successful_patch() {
        let relay = Arc::new(CountingRelay::default());
        let f = fixture();
        let service = f.service.with_relay(relay.clone());
        let mut stream = service.subscribe().unwrap();

        service.add_recipe_as(id("mod:a"), stick(1)).unwrap();
        service.add_to_blacklist(&id("mod:a")).unwrap();
        // Already hidden: store changes, snapshot does not.
        service.add_to_blacklist(&id("mod:b")).unwrap();
        f.host.detach();
        assert!(service.delete_recipe(&id("minecraft:stick")).is_err());

        assert_eq!(relay.0.load(Ordering::SeqCst), 2);
        let first = stream.try_recv().unwrap();
        let second = stream.try_recv().unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn shutdown_rejects_mutations() {
        let f = fixture();
        f.service.stage_recipe(id("mod:a"), stick(1)).unwrap();
        f.service.shutdown();
        f.service.shutdown();
        assert!(!f.service.is_running());
        assert_eq!(f.service.pending_count(), 0);
        assert!(matches!(
            f.service.add_recipe_as(id("mod:b"), stick(1)),
            Err(EngineError::ShutDown)
        ));
        assert!(matches!(f.service.reload_from_store(), Err(EngineError::ShutDown)));
        assert!(matches!(f.service.subscribe(), Err(EngineError::ShutDown)));
        assert_eq!(f.service.count(), 1);
    }
}
