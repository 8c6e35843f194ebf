use std::collections::BTreeMap;
use std::sync::Arc;

use rpatch_types::{RecipeDescriptor, RecipeId};

/// Recipes staged for the next patch.
///
/// A plain accumulator: the last write for an id wins and nothing is
/// validated here. Iteration is ordered by id so a commit always applies
/// entries in the same order.
#[derive(Clone, Debug, Default)]
pub struct PendingRecipeSet {
    entries: BTreeMap<RecipeId, Arc<RecipeDescriptor>>,
}

impl PendingRecipeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: RecipeId, descriptor: impl Into<Arc<RecipeDescriptor>>) {
        self.entries.insert(id, descriptor.into());
    }

    pub fn remove(&mut self, id: &RecipeId) -> Option<Arc<RecipeDescriptor>> {
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Arc<RecipeDescriptor>> {
        self.entries.get(id)
    }

    pub fn all(&self) -> Vec<(RecipeId, Arc<RecipeDescriptor>)> {
        self.entries
            .iter()
            .map(|(id, d)| (id.clone(), Arc::clone(d)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecipeId, &Arc<RecipeDescriptor>)> {
        self.entries.iter()
    }
}
