//! Seeding a standalone host from a JSON file of records.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use rpatch_registry::{RegistrySnapshot, SwapHost};
use rpatch_store::StoredRecipe;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Read a JSON array of records into a snapshot.
///
/// Records that fail to decode are logged and left out.
pub fn load_base_snapshot(path: impl AsRef<Path>) -> EngineResult<RegistrySnapshot> {
    let path = path.as_ref();
    let config_err = |reason: String| EngineError::Config {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
    let records: Vec<StoredRecipe> =
        serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))?;

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        match record.decode() {
            Ok(entry) => entries.push(entry),
            Err(error) => warn!(id = %record.id, %error, "skipping malformed base record"),
        }
    }
    let snapshot = RegistrySnapshot::from_entries(entries);
    info!(path = %path.display(), entries = snapshot.len(), "loaded base snapshot");
    Ok(snapshot)
}

/// A [`SwapHost`] holding the config's base snapshot, or an empty one.
pub fn standalone_host(config: &EngineConfig) -> EngineResult<Arc<SwapHost>> {
    let snapshot = match &config.base_snapshot {
        Some(path) => load_base_snapshot(path)?,
        None => RegistrySnapshot::new(),
    };
    Ok(Arc::new(SwapHost::new(snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpatch_registry::RegistryHost;
    use rpatch_types::RecipeId;

    #[test]
    fn loads_records_and_skips_bad_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.json");
        std::fs::write(
            &path,
            r##"[
                {"id": "minecraft:stick", "kind": "shapeless",
                 "result": {"item": "minecraft:stick", "count": 4},
                 "ingredients": ["#minecraft:planks", "#minecraft:planks"]},
                {"id": "minecraft:glass", "kind": "smelting",
                 "result": {"item": "minecraft:glass", "count": 1},
                 "ingredients": ["minecraft:sand"], "cookTime": 200, "yieldFactor": 0.1},
                {"id": "minecraft:broken", "kind": "teleporting",
                 "result": {"item": "minecraft:stone", "count": 1}}
            ]"##,
        )
        .unwrap();

        let snapshot = load_base_snapshot(&path).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&RecipeId::parse("minecraft:glass").unwrap()));
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_base_snapshot(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn standalone_host_without_base_is_empty() {
        let host = standalone_host(&EngineConfig::default()).unwrap();
        assert!(host.current_snapshot().is_empty());
    }
}
