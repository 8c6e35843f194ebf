//! Undo log for the durable writes of one operation.
//!
//! An operation that writes to more than one place, or writes before the
//! host accepts its snapshot, records how to reverse each write here. If a
//! later step fails the journal replays the reversals newest first.

use tracing::{debug, warn};

use rpatch_store::{StoreResult, StoredRecipe};
use rpatch_types::{RecipeDescriptor, RecipeId};

use crate::stores::{Layer, ServiceStores};

enum Undo {
    /// Put back a record that was overwritten or deleted.
    Restore { layer: Layer, record: StoredRecipe },
    /// Remove a record that did not exist before.
    Remove { layer: Layer, id: RecipeId },
    Unlist(RecipeId),
    Relist(RecipeId),
}

pub(crate) struct Journal<'a> {
    stores: &'a ServiceStores,
    undo: Vec<Undo>,
}

impl<'a> Journal<'a> {
    pub(crate) fn new(stores: &'a ServiceStores) -> Self {
        Self {
            stores,
            undo: Vec::new(),
        }
    }

    /// Persist a descriptor. Returns `true` if the layer had no record for `id`.
    pub(crate) fn save(
        &mut self,
        layer: Layer,
        id: &RecipeId,
        descriptor: &RecipeDescriptor,
    ) -> StoreResult<bool> {
        let store = self.stores.layer(layer);
        let prior = store.read_record(id)?;
        store.save(id, descriptor)?;
        let created = prior.is_none();
        self.undo.push(match prior {
            Some(record) => Undo::Restore { layer, record },
            None => Undo::Remove {
                layer,
                id: id.clone(),
            },
        });
        Ok(created)
    }

    /// Delete a record. Returns `true` if one existed.
    pub(crate) fn delete(&mut self, layer: Layer, id: &RecipeId) -> StoreResult<bool> {
        let store = self.stores.layer(layer);
        // An unreadable record can still be deleted; it just cannot be put back.
        let prior = match store.read_record(id) {
            Ok(prior) => prior,
            Err(error) => {
                warn!(%id, layer = layer.as_str(), %error, "deleting unreadable record");
                None
            }
        };
        if !store.delete(id)? {
            return Ok(false);
        }
        if let Some(record) = prior {
            self.undo.push(Undo::Restore { layer, record });
        }
        Ok(true)
    }

    pub(crate) fn blacklist_insert(&mut self, id: &RecipeId) -> StoreResult<bool> {
        let added = self.stores.blacklist.insert(id)?;
        if added {
            self.undo.push(Undo::Unlist(id.clone()));
        }
        Ok(added)
    }

    pub(crate) fn blacklist_remove(&mut self, id: &RecipeId) -> StoreResult<bool> {
        let removed = self.stores.blacklist.remove(id)?;
        if removed {
            self.undo.push(Undo::Relist(id.clone()));
        }
        Ok(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.undo.len()
    }

    /// Reverse every recorded write, newest first.
    ///
    /// Best effort: a reversal that fails is logged and the rest still run.
    pub(crate) fn rollback(self) {
        let total = self.undo.len();
        let mut failed = 0usize;
        for undo in self.undo.into_iter().rev() {
            let outcome = match &undo {
                Undo::Restore { layer, record } => {
                    self.stores.layer(*layer).write_record(record)
                }
                Undo::Remove { layer, id } => self.stores.layer(*layer).delete(id).map(|_| ()),
                Undo::Unlist(id) => self.stores.blacklist.remove(id).map(|_| ()),
                Undo::Relist(id) => self.stores.blacklist.insert(id).map(|_| ()),
            };
            if let Err(error) = outcome {
                failed += 1;
                warn!(%error, "rollback step failed");
            }
        }
        debug!(total, failed, "rolled back durable writes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rpatch_store::{IdSetStore, InMemoryIdSetStore, InMemoryRecipeStore, RecipeStore};
    use rpatch_types::{Ingredient, ItemStack};

    fn id(s: &str) -> RecipeId {
        RecipeId::parse(s).unwrap()
    }

    fn recipe(count: u32) -> RecipeDescriptor {
        RecipeDescriptor::shapeless(ItemStack::new("mod:x", count), vec![Ingredient::item("a:b")])
            .unwrap()
    }

    fn stores() -> (ServiceStores, Arc<InMemoryRecipeStore>, Arc<InMemoryIdSetStore>) {
        let recipes = Arc::new(InMemoryRecipeStore::new());
        let blacklist = Arc::new(InMemoryIdSetStore::new());
        let stores = ServiceStores {
            recipes: recipes.clone(),
            overrides: Arc::new(InMemoryRecipeStore::new()),
            blacklist: blacklist.clone(),
        };
        (stores, recipes, blacklist)
    }

    #[test]
    fn rollback_restores_prior_state() {
        let (stores, recipes, blacklist) = stores();
        recipes.save(&id("mod:kept"), &recipe(1)).unwrap();
        recipes.save(&id("mod:gone"), &recipe(1)).unwrap();

        let mut journal = Journal::new(&stores);
        assert!(!journal.save(Layer::Recipes, &id("mod:kept"), &recipe(5)).unwrap());
        assert!(journal.save(Layer::Recipes, &id("mod:new"), &recipe(1)).unwrap());
        assert!(journal.delete(Layer::Recipes, &id("mod:gone")).unwrap());
        assert!(journal.blacklist_insert(&id("mod:banned")).unwrap());
        assert_eq!(journal.len(), 4);
        journal.rollback();

        assert_eq!(recipes.load(&id("mod:kept")).unwrap().unwrap().result().count, 1);
        assert!(recipes.load(&id("mod:new")).unwrap().is_none());
        assert!(recipes.contains(&id("mod:gone")).unwrap());
        assert!(!blacklist.contains(&id("mod:banned")).unwrap());
    }

    #[test]
    fn no_op_writes_are_not_journaled() {
        let (stores, _, _) = stores();
        let mut journal = Journal::new(&stores);
        assert!(!journal.delete(Layer::Overrides, &id("mod:none")).unwrap());
        assert!(!journal.blacklist_remove(&id("mod:none")).unwrap());
        assert_eq!(journal.len(), 0);
    }

    #[test]
    fn failed_write_records_nothing() {
        let (stores, recipes, _) = stores();
        recipes.set_read_only(true);
        let mut journal = Journal::new(&stores);
        assert!(journal.save(Layer::Recipes, &id("mod:a"), &recipe(1)).is_err());
        assert_eq!(journal.len(), 0);
    }
}
