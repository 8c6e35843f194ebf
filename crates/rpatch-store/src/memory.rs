use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use rpatch_types::RecipeId;

use crate::error::{StoreError, StoreResult};
use crate::record::StoredRecipe;
use crate::traits::RecipeStore;

/// In-memory, `BTreeMap`-based recipe store.
///
/// Intended for tests and embedding. Besides the [`RecipeStore`] contract it
/// counts durable writes and can be switched read-only or told to fail reads
/// for specific ids, which lets callers exercise their error paths.
pub struct InMemoryRecipeStore {
    records: RwLock<BTreeMap<RecipeId, StoredRecipe>>,
    unreadable: RwLock<BTreeSet<RecipeId>>,
    read_only: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            unreadable: RwLock::new(BTreeSet::new()),
            read_only: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Number of successful mutating calls (writes and effective deletes).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reject every subsequent mutation with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Make reads of `id` fail with an I/O error.
    pub fn fail_reads_for(&self, id: &RecipeId) {
        self.unreadable
            .write()
            .expect("lock poisoned")
            .insert(id.clone());
    }

    /// Store a record under an explicit key without any checks.
    ///
    /// Lets tests plant records whose body is malformed.
    pub fn insert_raw(&self, id: RecipeId, record: StoredRecipe) {
        self.records.write().expect("lock poisoned").insert(id, record);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRecipeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeStore for InMemoryRecipeStore {
    fn write_record(&self, record: &StoredRecipe) -> StoreResult<()> {
        self.check_writable()?;
        let id = record
            .recipe_id()
            .map_err(|source| StoreError::CorruptRecord {
                id: record.id.clone(),
                source,
            })?;
        self.records
            .write()
            .expect("lock poisoned")
            .insert(id, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_record(&self, id: &RecipeId) -> StoreResult<Option<StoredRecipe>> {
        if self.unreadable.read().expect("lock poisoned").contains(id) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record {id} is unreadable"),
            )));
        }
        Ok(self.records.read().expect("lock poisoned").get(id).cloned())
    }

    fn delete(&self, id: &RecipeId) -> StoreResult<bool> {
        self.check_writable()?;
        let removed = self
            .records
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    fn list_ids(&self) -> StoreResult<Vec<RecipeId>> {
        Ok(self
            .records
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryRecipeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecipeStore")
            .field("record_count", &self.len())
            .field("write_count", &self.write_count())
            .finish()
    }
}
