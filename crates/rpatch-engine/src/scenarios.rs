//! End-to-end behavior of the service over in-memory stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use rpatch_registry::{Origin, RegistryHost, RegistrySnapshot, SwapHost, Visibility};
use rpatch_store::{
    FileIdSetStore, FileRecipeStore, IdSetStore, InMemoryIdSetStore, InMemoryRecipeStore,
    RecipeStore, StoredRecipe,
};
use rpatch_types::{
    CookingMethod, Ingredient, ItemStack, RecipeDescriptor, RecipeId, RecipeType, ValidationError,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::service::{RecipeService, ServiceOptions};
use crate::stores::ServiceStores;

struct World {
    host: Arc<SwapHost>,
    recipes: Arc<InMemoryRecipeStore>,
    overrides: Arc<InMemoryRecipeStore>,
    blacklist: Arc<InMemoryIdSetStore>,
    service: RecipeService,
}

impl World {
    fn new(base: RegistrySnapshot) -> Self {
        let host = Arc::new(SwapHost::new(base));
        let recipes = Arc::new(InMemoryRecipeStore::new());
        let overrides = Arc::new(InMemoryRecipeStore::new());
        let blacklist = Arc::new(InMemoryIdSetStore::new());
        let stores = ServiceStores {
            recipes: recipes.clone(),
            overrides: overrides.clone(),
            blacklist: blacklist.clone(),
        };
        let service = RecipeService::init(host.clone(), stores, ServiceOptions::default());
        Self {
            host,
            recipes,
            overrides,
            blacklist,
            service,
        }
    }

    fn writes(&self) -> u64 {
        self.recipes.write_count() + self.overrides.write_count() + self.blacklist.write_count()
    }
}

fn id(s: &str) -> RecipeId {
    RecipeId::parse(s).unwrap()
}

fn shapeless(item: &str, count: u32) -> RecipeDescriptor {
    RecipeDescriptor::shapeless(
        ItemStack::new(item, count),
        vec![Ingredient::tag("minecraft:planks"), Ingredient::tag("minecraft:planks")],
    )
    .unwrap()
}

fn shaped_sword() -> RecipeDescriptor {
    let key: BTreeMap<char, Ingredient> = [
        ('D', Ingredient::item("minecraft:diamond")),
        ('S', Ingredient::item("minecraft:stick")),
    ]
    .into();
    RecipeDescriptor::shaped(
        ItemStack::new("minecraft:diamond_sword", 1),
        vec![" D ".into(), " D ".into(), " S ".into()],
        key,
    )
    .unwrap()
}

fn glass() -> RecipeDescriptor {
    RecipeDescriptor::cooking(
        CookingMethod::Smelting,
        ItemStack::new("minecraft:glass", 1),
        Ingredient::tag("minecraft:sand"),
        200,
        0.1,
    )
    .unwrap()
}

fn vanilla() -> RegistrySnapshot {
    RegistrySnapshot::from_entries([
        (id("minecraft:stick"), shapeless("minecraft:stick", 4)),
        (id("minecraft:diamond_sword"), shapeless("minecraft:diamond_sword", 1)),
        (id("minecraft:glass"), glass()),
    ])
}

// ---- Scenario A: override replaces a differently shaped base entry ----

#[test]
fn override_replaces_base_entry_once() {
    let w = World::new(vanilla());
    let sword = id("minecraft:diamond_sword");
    w.service.add_override(&sword, shaped_sword()).unwrap();
    w.service.reload_from_store().unwrap();

    let ids = w.service.list_ids();
    assert_eq!(ids.iter().filter(|i| **i == sword).count(), 1);
    assert_eq!(w.service.count(), 3);
    assert_eq!(w.service.get(&sword).unwrap().kind_name(), "shaped");
    assert_eq!(w.service.visibility(&sword).unwrap().origin(), Some(Origin::Override));
}

#[test]
fn override_moving_entry_between_types() {
    let w = World::new(vanilla());
    let glass_id = id("minecraft:glass");
    w.service
        .add_override(&glass_id, shapeless("minecraft:glass", 2))
        .unwrap();
    let report = w.service.reload_from_store().unwrap();
    assert_eq!(report.overridden, 1);

    let live = w.service.snapshot();
    assert_eq!(live.locate(&glass_id), Some(RecipeType::Crafting));
    assert!(live.table(RecipeType::Smelting).is_none());
}

// ---- Scenario B: blacklist beats base and override after reload ----

#[test]
fn blacklist_beats_base_and_override() {
    let w = World::new(vanilla());
    let stick = id("minecraft:stick");
    w.service.add_override(&stick, shapeless("minecraft:stick", 16)).unwrap();
    w.service.add_to_blacklist(&stick).unwrap();
    let report = w.service.reload_from_store().unwrap();

    assert!(w.service.get(&stick).is_none());
    assert!(!w.service.list_ids().contains(&stick));
    assert_eq!(w.service.visibility(&stick).unwrap(), Visibility::Absent);
    assert_eq!(report.suppressed, 1);
    assert_eq!(report.total, 2);
}

#[test]
fn blacklist_hides_authored_records_too() {
    let w = World::new(vanilla());
    w.service
        .add_recipe_as(id("mod:planks"), shapeless("minecraft:oak_planks", 4))
        .unwrap();
    w.service.add_to_blacklist(&id("mod:planks")).unwrap();
    w.service.reload_from_store().unwrap();
    assert!(w.service.get(&id("mod:planks")).is_none());
}

// ---- Scenario C: malformed shaped pattern is rejected ----

#[test]
fn two_row_shaped_pattern_is_rejected() {
    let w = World::new(vanilla());
    let before_ids = w.service.list_ids();
    let before_writes = w.writes();

    let mut record = StoredRecipe::encode(&id("mod:short_sword"), &shaped_sword());
    record.pattern.pop();
    let err = w.service.add_record(&record, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::PatternRows {
            expected: 3,
            actual: 2
        })
    ));

    assert_eq!(w.service.list_ids(), before_ids);
    assert_eq!(w.service.count(), 3);
    assert_eq!(w.service.pending_count(), 0);
    assert_eq!(w.writes(), before_writes);
    assert_eq!(w.host.install_count(), 0);
}

// ---- Scenario D: deleting an override-only id ----

#[test]
fn delete_override_only_id() {
    let w = World::new(vanilla());
    let custom = id("mod:ruby_sword");
    w.service.add_override(&custom, shaped_sword()).unwrap();
    assert!(w.service.get(&custom).is_some());

    assert!(w.service.delete_recipe(&custom).unwrap());
    assert!(w.service.get(&custom).is_none());
    assert!(!w.overrides.contains(&custom).unwrap());

    w.service.reload_from_store().unwrap();
    assert!(w.service.get(&custom).is_none());
}

// ---- Reload ----

#[test]
fn reload_is_idempotent_and_writes_nothing() {
    let w = World::new(vanilla());
    w.service
        .add_recipe_as(id("mod:planks"), shapeless("minecraft:oak_planks", 4))
        .unwrap();
    w.service
        .add_override(&id("minecraft:stick"), shapeless("minecraft:stick", 8))
        .unwrap();
    w.service.add_to_blacklist(&id("minecraft:glass")).unwrap();

    let writes = w.writes();
    w.service.reload_from_store().unwrap();
    let first = w.service.snapshot();
    w.service.reload_from_store().unwrap();
    let second = w.service.snapshot();

    assert_eq!(*first, *second);
    assert_eq!(w.writes(), writes);
}

#[test]
fn reload_restores_state_into_fresh_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::rooted_at(dir.path());
    let open = || {
        let host = Arc::new(SwapHost::new(vanilla()));
        let service = RecipeService::open(&config, host.clone()).unwrap();
        (host, service)
    };

    let (_, first) = open();
    first
        .add_recipe_as(id("mod:planks"), shapeless("minecraft:oak_planks", 4))
        .unwrap();
    first
        .add_override(&id("minecraft:stick"), shapeless("minecraft:stick", 8))
        .unwrap();
    first.add_to_blacklist(&id("minecraft:glass")).unwrap();
    let expected = first.snapshot();
    first.shutdown();

    let (host, second) = open();
    assert_eq!(second.count(), 3);
    let report = second.reload_from_store().unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(*host.current_snapshot(), *expected);
}

#[test]
fn reload_skips_malformed_records() {
    let w = World::new(vanilla());
    w.service
        .add_recipe_as(id("mod:good"), shapeless("minecraft:oak_planks", 4))
        .unwrap();
    let mut bad = StoredRecipe::encode(&id("mod:bad"), &glass());
    bad.kind = "teleporting".into();
    w.recipes.insert_raw(id("mod:bad"), bad);
    w.recipes
        .save(&id("mod:unreadable"), &shapeless("minecraft:torch", 4))
        .unwrap();
    w.recipes.fail_reads_for(&id("mod:unreadable"));

    let report = w.service.reload_from_store().unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.failed, 2);
    assert!(w.service.get(&id("mod:good")).is_some());
    assert!(w.service.get(&id("mod:bad")).is_none());
}

#[test]
fn reload_while_guard_held_fails() {
    let w = World::new(vanilla());
    let guard = w.service.reload_flag().try_acquire().unwrap();
    assert!(matches!(
        w.service.reload_from_store(),
        Err(EngineError::ReloadInProgress)
    ));
    drop(guard);
    assert!(w.service.reload_from_store().is_ok());
}

#[test]
fn failed_reload_install_keeps_snapshot() {
    let w = World::new(vanilla());
    w.overrides
        .save(&id("minecraft:stick"), &shapeless("minecraft:stick", 8))
        .unwrap();
    let before = w.service.snapshot();
    w.host.detach();
    assert!(matches!(
        w.service.reload_from_store(),
        Err(EngineError::Patch(_))
    ));
    assert!(Arc::ptr_eq(&before, &w.service.snapshot()));
    assert!(!w.service.reload_flag().is_active());
    assert_eq!(w.service.pending_count(), 0);

    w.host.attach();
    w.service.reload_from_store().unwrap();
    assert_eq!(w.service.get(&id("minecraft:stick")).unwrap().result().count, 8);
}

#[test]
fn commit_after_failed_reload_does_not_copy_overrides() {
    let w = World::new(vanilla());
    w.overrides
        .save(&id("minecraft:stick"), &shapeless("minecraft:stick", 9))
        .unwrap();
    w.host.detach();
    assert!(w.service.reload_from_store().is_err());
    w.host.attach();

    let writes = w.writes();
    assert_eq!(w.service.commit_pending().unwrap(), 0);
    assert_eq!(w.writes(), writes);
    assert!(!w.recipes.contains(&id("minecraft:stick")).unwrap());

    w.service.reload_from_store().unwrap();
    assert!(w.service.remove_override(&id("minecraft:stick")).unwrap());
    assert_eq!(w.service.get(&id("minecraft:stick")).unwrap().result().count, 4);
}

// ---- Atomicity ----

#[test]
fn failed_patch_has_no_durable_effect() {
    let w = World::new(vanilla());
    let before = w.service.snapshot();
    w.host.detach();

    assert!(w.service.add_recipe_as(id("mod:a"), glass()).is_err());
    assert!(w.service.add_override(&id("minecraft:stick"), glass()).is_err());
    assert!(w.service.add_to_blacklist(&id("minecraft:glass")).is_err());

    assert!(Arc::ptr_eq(&before, &w.service.snapshot()));
    assert!(w.recipes.is_empty());
    assert!(w.overrides.is_empty());
    assert!(w.blacklist.list().unwrap().is_empty());
    assert_eq!(w.service.pending_count(), 1);
}

#[test]
fn precedence_is_independent_of_operation_order() {
    let stick = id("minecraft:stick");
    let a = World::new(vanilla());
    a.service.add_to_blacklist(&stick).unwrap();
    a.service.add_override(&stick, shapeless("minecraft:stick", 8)).unwrap();
    a.service
        .add_recipe_as(stick.clone(), shapeless("minecraft:stick", 2))
        .unwrap();

    let b = World::new(vanilla());
    b.service
        .add_recipe_as(stick.clone(), shapeless("minecraft:stick", 2))
        .unwrap();
    b.service.add_override(&stick, shapeless("minecraft:stick", 8)).unwrap();
    b.service.add_to_blacklist(&stick).unwrap();

    assert_eq!(*a.service.snapshot(), *b.service.snapshot());
    a.service.reload_from_store().unwrap();
    b.service.reload_from_store().unwrap();
    assert_eq!(*a.service.snapshot(), *b.service.snapshot());
    assert!(a.service.get(&stick).is_none());
}

// ---- File-backed layers ----

#[test]
fn file_stores_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let stores = || ServiceStores {
        recipes: Arc::new(FileRecipeStore::open(dir.path().join("recipes")).unwrap()),
        overrides: Arc::new(FileRecipeStore::open(dir.path().join("overrides")).unwrap()),
        blacklist: Arc::new(FileIdSetStore::open(dir.path().join("blacklist.json")).unwrap()),
    };

    let first = RecipeService::init(
        Arc::new(SwapHost::new(vanilla())),
        stores(),
        ServiceOptions::default(),
    );
    let added = first.add_recipe(shaped_sword()).unwrap();
    assert_eq!(added, id("custom:diamond_sword"));
    first.add_to_blacklist(&id("minecraft:stick")).unwrap();

    let second = RecipeService::init(
        Arc::new(SwapHost::new(vanilla())),
        stores(),
        ServiceOptions::default(),
    );
    second.reload_from_store().unwrap();
    assert_eq!(second.get(&added).unwrap().kind_name(), "shaped");
    assert!(second.get(&id("minecraft:stick")).is_none());
    assert_eq!(second.list_blacklist().unwrap().len(), 1);
}
