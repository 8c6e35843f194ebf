//! Durable id sets, used for the blacklist.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use rpatch_types::RecipeId;

use crate::error::{StoreError, StoreResult};
use crate::traits::IdSetStore;

/// On-disk form of an id set.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IdSetDocument {
    ids: Vec<String>,
}

/// An id set persisted as one JSON document.
///
/// The whole document is rewritten through a temporary file and renamed
/// into place on every change, and the in-memory copy is only updated once
/// that succeeds. Entries that do not parse as ids are logged on open and
/// written back verbatim, so they never match but are not lost.
#[derive(Debug)]
pub struct FileIdSetStore {
    path: PathBuf,
    ids: RwLock<BTreeSet<RecipeId>>,
    unparsed: Vec<String>,
}

impl FileIdSetStore {
    /// Open the set at `path`, creating an empty one if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let doc = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<IdSetDocument>(&bytes).map_err(|e| {
                StoreError::Serialization {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => IdSetDocument::default(),
            Err(e) => return Err(e.into()),
        };

        let mut ids = BTreeSet::new();
        let mut unparsed = Vec::new();
        for raw in doc.ids {
            match RecipeId::parse(&raw) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(error) => {
                    warn!(path = %path.display(), id = %raw, %error, "keeping unparsable id as is");
                    unparsed.push(raw);
                }
            }
        }

        debug!(
            path = %path.display(),
            count = ids.len(),
            unparsed = unparsed.len(),
            "opened id set"
        );
        Ok(Self {
            path,
            ids: RwLock::new(ids),
            unparsed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries from the file that are not valid ids.
    pub fn unparsed(&self) -> &[String] {
        &self.unparsed
    }

    fn persist(&self, ids: &BTreeSet<RecipeId>) -> StoreResult<()> {
        let doc = IdSetDocument {
            ids: ids
                .iter()
                .map(ToString::to_string)
                .chain(self.unparsed.iter().cloned())
                .collect(),
        };
        let payload = serde_json::to_vec_pretty(&doc).map_err(|e| StoreError::Serialization {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Apply `change` to a copy of the set; persist and publish it only if
    /// the change did something.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut BTreeSet<RecipeId>) -> (bool, T),
    ) -> StoreResult<T> {
        let mut ids = self.ids.write().expect("lock poisoned");
        let mut next = ids.clone();
        let (changed, out) = change(&mut next);
        if changed {
            self.persist(&next)?;
            *ids = next;
        }
        Ok(out)
    }
}

impl IdSetStore for FileIdSetStore {
    fn insert(&self, id: &RecipeId) -> StoreResult<bool> {
        self.update(|ids| {
            let added = ids.insert(id.clone());
            (added, added)
        })
    }

    fn remove(&self, id: &RecipeId) -> StoreResult<bool> {
        self.update(|ids| {
            let removed = ids.remove(id);
            (removed, removed)
        })
    }

    fn contains(&self, id: &RecipeId) -> StoreResult<bool> {
        Ok(self.ids.read().expect("lock poisoned").contains(id))
    }

    fn list(&self) -> StoreResult<BTreeSet<RecipeId>> {
        Ok(self.ids.read().expect("lock poisoned").clone())
    }

    fn clear(&self) -> StoreResult<usize> {
        self.update(|ids| {
            let count = ids.len();
            ids.clear();
            (count > 0, count)
        })
    }
}

/// In-memory id set with the same failure switches as
/// [`InMemoryRecipeStore`](crate::InMemoryRecipeStore).
#[derive(Debug, Default)]
pub struct InMemoryIdSetStore {
    ids: RwLock<BTreeSet<RecipeId>>,
    read_only: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryIdSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut BTreeSet<RecipeId>) -> (bool, T)) -> StoreResult<T> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        let mut ids = self.ids.write().expect("lock poisoned");
        let (changed, out) = change(&mut ids);
        if changed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(out)
    }
}

impl IdSetStore for InMemoryIdSetStore {
    fn insert(&self, id: &RecipeId) -> StoreResult<bool> {
        self.mutate(|ids| {
            let added = ids.insert(id.clone());
            (added, added)
        })
    }

    fn remove(&self, id: &RecipeId) -> StoreResult<bool> {
        self.mutate(|ids| {
            let removed = ids.remove(id);
            (removed, removed)
        })
    }

    fn contains(&self, id: &RecipeId) -> StoreResult<bool> {
        Ok(self.ids.read().expect("lock poisoned").contains(id))
    }

    fn list(&self) -> StoreResult<BTreeSet<RecipeId>> {
        Ok(self.ids.read().expect("lock poisoned").clone())
    }

    fn clear(&self) -> StoreResult<usize> {
        self.mutate(|ids| {
            let count = ids.len();
            ids.clear();
            (count > 0, count)
        })
    }
}
