use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Engine settings, usually read from a TOML file.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding all durable state.
    pub store_root: PathBuf,
    /// Authored recipe records, relative to `store_root`.
    pub recipes_dir: PathBuf,
    /// Override records, relative to `store_root`.
    pub overrides_dir: PathBuf,
    /// Blacklist document, relative to `store_root`.
    pub blacklist_file: PathBuf,
    /// Namespace for ids generated by `add_recipe`.
    pub default_namespace: String,
    /// Per-observer sync channel capacity.
    pub channel_capacity: usize,
    /// JSON array of records used to seed a standalone host.
    pub base_snapshot: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("rpatch-data"),
            recipes_dir: PathBuf::from("recipes"),
            overrides_dir: PathBuf::from("overrides"),
            blacklist_file: PathBuf::from("blacklist.json"),
            default_namespace: "custom".into(),
            channel_capacity: 16,
            base_snapshot: None,
        }
    }
}

impl EngineConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        Self::parse(text, Path::new("<inline>"))
    }

    /// A default config rooted at `store_root`.
    pub fn rooted_at(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            ..Self::default()
        }
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.store_root.join(&self.recipes_dir)
    }

    pub fn overrides_path(&self) -> PathBuf {
        self.store_root.join(&self.overrides_dir)
    }

    pub fn blacklist_path(&self) -> PathBuf {
        self.store_root.join(&self.blacklist_file)
    }

    fn parse(text: &str, path: &Path) -> EngineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if config.default_namespace.is_empty() {
            return Err(EngineError::Config {
                path: path.to_path_buf(),
                reason: "default_namespace must not be empty".into(),
            });
        }
        Ok(config)
    }
}
