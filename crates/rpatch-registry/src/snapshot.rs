use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rpatch_types::{RecipeDescriptor, RecipeId, RecipeType};

/// All recipes of one type, keyed by id.
pub type TypeTable = BTreeMap<RecipeId, Arc<RecipeDescriptor>>;

/// A full, immutable view of the host registry: `type → (id → descriptor)`.
///
/// Cloning a snapshot copies only the per-type table of `Arc`s; sub-maps are
/// shared until a patch writes to one, at which point that sub-map alone is
/// copied. An id appears in at most one type. Empty sub-maps are dropped so
/// two snapshots holding the same entries compare equal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrySnapshot {
    types: BTreeMap<RecipeType, Arc<TypeTable>>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from loose entries. Later entries replace earlier
    /// ones with the same id.
    pub fn from_entries(entries: impl IntoIterator<Item = (RecipeId, RecipeDescriptor)>) -> Self {
        let mut snapshot = Self::new();
        for (id, descriptor) in entries {
            snapshot.insert(id, Arc::new(descriptor));
        }
        snapshot
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Arc<RecipeDescriptor>> {
        self.types.values().find_map(|table| table.get(id))
    }

    /// The type an id is filed under.
    pub fn locate(&self, id: &RecipeId) -> Option<RecipeType> {
        self.types
            .iter()
            .find(|(_, table)| table.contains_key(id))
            .map(|(ty, _)| *ty)
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.locate(id).is_some()
    }

    /// Total entries across all types.
    pub fn len(&self) -> usize {
        self.types.values().map(|table| table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Every id, sorted.
    pub fn ids(&self) -> Vec<RecipeId> {
        self.id_set().into_iter().collect()
    }

    pub fn id_set(&self) -> BTreeSet<RecipeId> {
        self.types
            .values()
            .flat_map(|table| table.keys().cloned())
            .collect()
    }

    pub fn table(&self, ty: RecipeType) -> Option<&TypeTable> {
        self.types.get(&ty).map(|table| table.as_ref())
    }

    pub fn types(&self) -> impl Iterator<Item = RecipeType> + '_ {
        self.types.keys().copied()
    }

    /// All entries, grouped by type and ordered by id within a type.
    pub fn iter(&self) -> impl Iterator<Item = (RecipeType, &RecipeId, &Arc<RecipeDescriptor>)> {
        self.types
            .iter()
            .flat_map(|(ty, table)| table.iter().map(move |(id, d)| (*ty, id, d)))
    }

    /// Whether both snapshots share the same sub-map allocation for `ty`.
    pub fn shares_table(&self, other: &Self, ty: RecipeType) -> bool {
        match (self.types.get(&ty), other.types.get(&ty)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// File `descriptor` under its type, dropping the id from any other type.
    pub(crate) fn insert(&mut self, id: RecipeId, descriptor: Arc<RecipeDescriptor>) {
        let ty = descriptor.recipe_type();
        self.remove_except(&id, Some(ty));
        Arc::make_mut(self.types.entry(ty).or_default()).insert(id, descriptor);
    }

    /// Remove an id from whichever type holds it. Returns whether it existed.
    pub(crate) fn remove(&mut self, id: &RecipeId) -> bool {
        self.remove_except(id, None)
    }

    fn remove_except(&mut self, id: &RecipeId, keep: Option<RecipeType>) -> bool {
        // Scan every type: an id is expected in at most one, but a stale
        // duplicate must not survive a patch.
        let holders: Vec<RecipeType> = self
            .types
            .iter()
            .filter(|(ty, table)| Some(**ty) != keep && table.contains_key(id))
            .map(|(ty, _)| *ty)
            .collect();
        for ty in &holders {
            if let Some(table) = self.types.get_mut(ty) {
                Arc::make_mut(table).remove(id);
                if table.is_empty() {
                    self.types.remove(ty);
                }
            }
        }
        !holders.is_empty()
    }
}
