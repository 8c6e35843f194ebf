//! The host registry as a replaceable snapshot.
//!
//! The host exposes its recipe registry only as a whole value that can be
//! read and replaced. This crate builds every change on a private copy and
//! swaps it in with a single reference replacement, so readers observe either
//! the state before a patch or the state after it, never a mix.
//!
//! # Modules
//!
//! - [`snapshot`]: [`RegistrySnapshot`], the `type → (id → descriptor)` map
//! - [`host`]: the [`RegistryHost`] capability and the [`SwapHost`] handle
//! - [`pending`]: [`PendingRecipeSet`], additions staged before a commit
//! - [`patcher`]: [`RegistryPatcher`], copy-then-install patch building
//! - [`resolver`]: [`ConflictResolver`], precedence between layers

pub mod error;
pub mod host;
pub mod patcher;
pub mod pending;
pub mod resolver;
pub mod snapshot;

pub use error::{PatchError, PatchResult};
pub use host::{RegistryHost, SwapHost};
pub use patcher::{Patch, PatchStats, RegistryPatcher};
pub use pending::PendingRecipeSet;
pub use resolver::{ConflictResolver, Origin, Resolution, Visibility};
pub use snapshot::{RegistrySnapshot, TypeTable};
