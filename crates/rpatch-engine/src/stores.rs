use std::sync::Arc;

use tracing::debug;

use rpatch_store::{
    FileIdSetStore, FileRecipeStore, IdSetStore, InMemoryIdSetStore, InMemoryRecipeStore,
    RecipeStore,
};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Which durable recipe layer a record lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    /// Records authored through `add_recipe` and friends.
    Recipes,
    /// Records that replace a built-in entry under the same id.
    Overrides,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recipes => "recipes",
            Self::Overrides => "overrides",
        }
    }
}

/// The three durable layers a service owns.
#[derive(Clone)]
pub struct ServiceStores {
    pub recipes: Arc<dyn RecipeStore>,
    pub overrides: Arc<dyn RecipeStore>,
    pub blacklist: Arc<dyn IdSetStore>,
}

impl ServiceStores {
    /// Open (creating as needed) the file-backed stores under the config's root.
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        let recipes = FileRecipeStore::open(config.recipes_path())?;
        let overrides = FileRecipeStore::open(config.overrides_path())?;
        let blacklist = FileIdSetStore::open(config.blacklist_path())?;
        debug!(root = %config.store_root.display(), "opened file stores");
        Ok(Self {
            recipes: Arc::new(recipes),
            overrides: Arc::new(overrides),
            blacklist: Arc::new(blacklist),
        })
    }

    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            recipes: Arc::new(InMemoryRecipeStore::new()),
            overrides: Arc::new(InMemoryRecipeStore::new()),
            blacklist: Arc::new(InMemoryIdSetStore::new()),
        }
    }

    pub fn layer(&self, layer: Layer) -> &dyn RecipeStore {
        match layer {
            Layer::Recipes => self.recipes.as_ref(),
            Layer::Overrides => self.overrides.as_ref(),
        }
    }
}

impl std::fmt::Debug for ServiceStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStores").finish_non_exhaustive()
    }
}
