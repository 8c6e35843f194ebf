use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use rpatch_types::RecipeId;

use crate::error::{StoreError, StoreResult};
use crate::record::StoredRecipe;
use crate::traits::{RecipeStore, ScanFailure, ScanReport};

/// Extension of record files.
const RECORD_EXT: &str = "json";

/// Length in bytes of the id digest appended to file names.
const DIGEST_LEN: usize = 4;

/// File-backed recipe store: one JSON file per record.
///
/// Layout:
/// ```text
/// <root>/<namespace>/<sanitized path>-<8 hex digest>.json
/// ```
/// Characters outside `a-z0-9_-` are replaced with `_`, so distinct ids can
/// sanitize to the same stem; the digest of the canonical id keeps their
/// file names apart. The `id` inside the file is authoritative.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so a failed write never clobbers the previous record.
#[derive(Debug)]
pub struct FileRecipeStore {
    root: PathBuf,
}

impl FileRecipeStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened recipe store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the record for `id` lives.
    pub fn record_path(&self, id: &RecipeId) -> PathBuf {
        let digest = blake3::hash(id.to_string().as_bytes());
        let stem = format!(
            "{}-{}",
            sanitize(id.path()),
            hex::encode(&digest.as_bytes()[..DIGEST_LEN])
        );
        self.root
            .join(sanitize(id.namespace()))
            .join(stem)
            .with_extension(RECORD_EXT)
    }

    fn read_file(path: &Path) -> StoreResult<StoredRecipe> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|e| StoreError::Serialization {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Replace every character that is unsafe in a file name with `_`.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' | '_' | '-' => ch,
            _ => '_',
        })
        .collect()
}

impl RecipeStore for FileRecipeStore {
    fn write_record(&self, record: &StoredRecipe) -> StoreResult<()> {
        let id = record
            .recipe_id()
            .map_err(|source| StoreError::CorruptRecord {
                id: record.id.clone(),
                source,
            })?;
        let path = self.record_path(&id);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let payload =
            serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(%id, path = %path.display(), "recipe record written");
        Ok(())
    }

    fn read_record(&self, id: &RecipeId) -> StoreResult<Option<StoredRecipe>> {
        let path = self.record_path(id);
        let record = match Self::read_file(&path) {
            Ok(record) => record,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if record.id != id.to_string() {
            return Err(StoreError::IdMismatch {
                expected: id.to_string(),
                found: record.id,
            });
        }
        Ok(Some(record))
    }

    fn delete(&self, id: &RecipeId) -> StoreResult<bool> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        // Drop the namespace directory once its last record is gone.
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
        }
        debug!(%id, "recipe record deleted");
        Ok(true)
    }

    fn list_ids(&self) -> StoreResult<Vec<RecipeId>> {
        let report = self.scan()?;
        let mut ids = report
            .records
            .iter()
            .filter_map(|record| record.recipe_id().ok())
            .collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }

    /// Walk the namespace directories once, reading every record file.
    ///
    /// Unreadable files, records with an unparsable id, and records that sit
    /// at a path other than the one their id maps to are skipped and
    /// reported.
    fn scan(&self) -> StoreResult<ScanReport> {
        let mut report = ScanReport::default();
        let walker = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let key = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| self.root.display().to_string());
                    warn!(%key, error = %e, "skipping unreadable store entry");
                    report.failures.push(ScanFailure {
                        key,
                        error: StoreError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())),
                    });
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT)
            {
                continue;
            }

            let key = path.display().to_string();
            let record = match Self::read_file(path) {
                Ok(record) => record,
                Err(error) => {
                    warn!(%key, %error, "skipping unreadable recipe record");
                    report.failures.push(ScanFailure { key, error });
                    continue;
                }
            };
            let id = match record.recipe_id() {
                Ok(id) => id,
                Err(source) => {
                    warn!(%key, error = %source, "skipping record with invalid id");
                    report.failures.push(ScanFailure {
                        key,
                        error: StoreError::CorruptRecord {
                            id: record.id,
                            source,
                        },
                    });
                    continue;
                }
            };
            if self.record_path(&id) != path {
                warn!(%key, %id, "skipping misplaced recipe record");
                report.failures.push(ScanFailure {
                    key: key.clone(),
                    error: StoreError::IdMismatch {
                        expected: key,
                        found: id.to_string(),
                    },
                });
                continue;
            }
            report.records.push(record);
        }

        report.records.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(
            records = report.records.len(),
            failures = report.failures.len(),
            "recipe store scan complete"
        );
        Ok(report)
    }
}
