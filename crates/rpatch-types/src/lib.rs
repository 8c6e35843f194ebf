//! Foundation types for rpatch.
//!
//! This crate provides the identifier and recipe model shared by every other
//! rpatch crate. Nothing here performs I/O; the types are plain values that
//! can be cloned, compared, and serialized.
//!
//! # Key Types
//!
//! - [`RecipeId`]: `namespace:path` identifier, the join key across all layers
//! - [`ItemStack`]: recipe result (item, count, optional metadata blob)
//! - [`Ingredient`]: a single item or an item tag
//! - [`RecipeDescriptor`]: an immutable, validated description of one recipe
//! - [`RecipeType`]: the registry sub-map a descriptor belongs to
//! - [`Tier`]: grid size class of the extreme crafting kinds

pub mod descriptor;
pub mod error;
pub mod id;
pub mod item;

pub use descriptor::{CookingMethod, GridKey, RecipeBody, RecipeDescriptor, RecipeType, Tier};
pub use error::{TypeError, ValidationError};
pub use id::{RecipeId, DEFAULT_NAMESPACE};
pub use item::{Ingredient, ItemStack};
