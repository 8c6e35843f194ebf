//! Durable storage for authored recipe layers.
//!
//! Every authored recipe (user additions and overrides alike) is persisted as
//! one self-describing JSON record per [`RecipeId`](rpatch_types::RecipeId).
//! The blacklist is persisted as a single document of canonical ids.
//!
//! # Record Format
//!
//! See [`StoredRecipe`]. The `id` field embedded in each record is the
//! authoritative identifier; file names are only a sanitized storage key.
//!
//! # Storage Backends
//!
//! Recipe records implement [`RecipeStore`]:
//!
//! - [`FileRecipeStore`] -- one file per record, grouped by namespace
//! - [`InMemoryRecipeStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! Id sets implement [`IdSetStore`]:
//!
//! - [`FileIdSetStore`] -- one JSON document, rewritten atomically
//! - [`InMemoryIdSetStore`] -- for tests and embedding
//!
//! # Design Rules
//!
//! 1. A failed write leaves the prior record for that id untouched.
//! 2. Bulk scans skip unreadable records and report them; they never abort.
//! 3. Single-record operations propagate every I/O error.

pub mod error;
pub mod file;
pub mod idset;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{RecordError, StoreError, StoreResult};
pub use file::FileRecipeStore;
pub use idset::{FileIdSetStore, InMemoryIdSetStore};
pub use memory::InMemoryRecipeStore;
pub use record::{IngredientEntry, RecordKind, StoredRecipe};
pub use traits::{IdSetStore, RecipeStore, ScanFailure, ScanReport};
