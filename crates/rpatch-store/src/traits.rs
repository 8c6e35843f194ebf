use std::collections::BTreeSet;

use tracing::warn;

use rpatch_types::{RecipeDescriptor, RecipeId};

use crate::error::{StoreError, StoreResult};
use crate::record::StoredRecipe;

/// A record that could not be read during a bulk scan.
#[derive(Debug)]
pub struct ScanFailure {
    /// Canonical id when known, otherwise the storage key.
    pub key: String,
    pub error: StoreError,
}

/// Outcome of a bulk scan: every readable record plus the ones skipped.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<StoredRecipe>,
    pub failures: Vec<ScanFailure>,
}

/// Durable per-id storage of recipe records.
///
/// All implementations must satisfy these invariants:
/// - Each id maps to at most one record.
/// - A failed write leaves any prior record for that id untouched.
/// - The `id` embedded in a record is the canonical identifier.
/// - Single-record operations propagate every error; bulk scans skip and
///   report unreadable records instead of aborting.
pub trait RecipeStore: Send + Sync {
    /// Write (create or replace) the record keyed by its embedded id.
    fn write_record(&self, record: &StoredRecipe) -> StoreResult<()>;

    /// Read the raw record for an id.
    ///
    /// Returns `Ok(None)` if no record exists.
    fn read_record(&self, id: &RecipeId) -> StoreResult<Option<StoredRecipe>>;

    /// Delete the record for an id. Returns `true` if it existed.
    fn delete(&self, id: &RecipeId) -> StoreResult<bool>;

    /// All ids with a record, sorted.
    fn list_ids(&self) -> StoreResult<Vec<RecipeId>>;

    /// Encode and persist a descriptor.
    fn save(&self, id: &RecipeId, descriptor: &RecipeDescriptor) -> StoreResult<()> {
        self.write_record(&StoredRecipe::encode(id, descriptor))
    }

    /// Load and decode the descriptor for an id.
    fn load(&self, id: &RecipeId) -> StoreResult<Option<RecipeDescriptor>> {
        let Some(record) = self.read_record(id)? else {
            return Ok(None);
        };
        let (found, descriptor) = record.decode().map_err(|source| StoreError::CorruptRecord {
            id: id.to_string(),
            source,
        })?;
        if &found != id {
            return Err(StoreError::IdMismatch {
                expected: id.to_string(),
                found: found.to_string(),
            });
        }
        Ok(Some(descriptor))
    }

    /// Whether a record exists for an id.
    fn contains(&self, id: &RecipeId) -> StoreResult<bool> {
        Ok(self.read_record(id)?.is_some())
    }

    /// Read every record.
    ///
    /// Default implementation lists ids and reads each one; a record that
    /// fails to read is logged and reported, and the scan continues.
    fn scan(&self) -> StoreResult<ScanReport> {
        let mut report = ScanReport::default();
        for id in self.list_ids()? {
            match self.read_record(&id) {
                Ok(Some(record)) => report.records.push(record),
                Ok(None) => {}
                Err(error) => {
                    warn!(%id, %error, "skipping unreadable recipe record");
                    report.failures.push(ScanFailure {
                        key: id.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Durable set of recipe ids (the blacklist).
///
/// Mutations persist before they become visible; a failed write leaves the
/// set unchanged.
pub trait IdSetStore: Send + Sync {
    /// Add an id. Returns `true` if it was not already present.
    fn insert(&self, id: &RecipeId) -> StoreResult<bool>;

    /// Remove an id. Returns `true` if it was present.
    fn remove(&self, id: &RecipeId) -> StoreResult<bool>;

    fn contains(&self, id: &RecipeId) -> StoreResult<bool>;

    /// Snapshot of every id in the set.
    fn list(&self) -> StoreResult<BTreeSet<RecipeId>>;

    /// Remove every id. Returns how many were removed.
    fn clear(&self) -> StoreResult<usize>;
}
