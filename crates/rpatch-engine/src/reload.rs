//! Rebuilding the registry from durable storage.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use rpatch_registry::{ConflictResolver, Patch, PendingRecipeSet, RegistrySnapshot, Resolution};
use rpatch_store::RecipeStore;
use rpatch_types::RecipeId;

use crate::error::EngineResult;
use crate::stores::{Layer, ServiceStores};

/// Summary of one rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Records decoded and staged, across both layers.
    pub loaded: usize,
    /// Records skipped because they could not be read or decoded.
    pub failed: usize,
    /// Built-in entries replaced by an override.
    pub overridden: usize,
    /// Built-in entries hidden by the blacklist.
    pub suppressed: usize,
    /// Entries visible after the rebuild.
    pub total: usize,
}

impl fmt::Display for ReloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loaded, {} failed, {} overridden, {} suppressed, {} visible",
            self.loaded, self.failed, self.overridden, self.suppressed, self.total
        )
    }
}

/// Reads both recipe layers and works out the base a rebuild starts from.
///
/// Only the read side lives here; the caller holds the reload guard and
/// commits what was staged.
pub(crate) struct ReloadCoordinator<'a> {
    stores: &'a ServiceStores,
    builtins: &'a RegistrySnapshot,
}

impl<'a> ReloadCoordinator<'a> {
    pub(crate) fn new(stores: &'a ServiceStores, builtins: &'a RegistrySnapshot) -> Self {
        Self { stores, builtins }
    }

    /// Stage every readable record, authored records first and overrides
    /// last so an override wins when both layers hold an id.
    ///
    /// Returns the ids found in the override layer.
    pub(crate) fn stage_layers(
        &self,
        pending: &mut PendingRecipeSet,
        report: &mut ReloadReport,
    ) -> EngineResult<BTreeSet<RecipeId>> {
        pending.clear();
        self.stage_layer(Layer::Recipes, pending, report)?;
        self.stage_layer(Layer::Overrides, pending, report)
    }

    /// The built-in layer minus everything an override or the blacklist
    /// displaces.
    pub(crate) fn resolve_base(
        &self,
        override_ids: &BTreeSet<RecipeId>,
        blacklist: &BTreeSet<RecipeId>,
        report: &mut ReloadReport,
    ) -> RegistrySnapshot {
        let Resolution {
            remove_from_base,
            overridden,
            suppressed,
        } = ConflictResolver::resolve_conflicts(self.builtins, override_ids, blacklist);
        report.overridden = overridden.len();
        report.suppressed = suppressed.len();
        Patch::on(self.builtins)
            .remove_all(&remove_from_base)
            .build()
            .0
    }

    fn stage_layer(
        &self,
        layer: Layer,
        pending: &mut PendingRecipeSet,
        report: &mut ReloadReport,
    ) -> EngineResult<BTreeSet<RecipeId>> {
        let store: &dyn RecipeStore = self.stores.layer(layer);
        let scan = store.scan()?;
        report.failed += scan.failures.len();

        let mut staged = BTreeSet::new();
        for record in &scan.records {
            match record.decode() {
                Ok((id, descriptor)) => {
                    pending.add(id.clone(), descriptor);
                    staged.insert(id);
                    report.loaded += 1;
                }
                Err(error) => {
                    warn!(id = %record.id, layer = layer.as_str(), %error, "skipping malformed record");
                    report.failed += 1;
                }
            }
        }
        debug!(layer = layer.as_str(), staged = staged.len(), "layer staged");
        Ok(staged)
    }
}
