//! Recipe descriptors.
//!
//! A [`RecipeDescriptor`] is a result plus a [`RecipeBody`] whose variant is
//! the recipe kind. Descriptors are validated on construction and have no
//! setters: changing a recipe means building a replacement and submitting it
//! under the same id.
//!
//! Grid sizes:
//! - shaped: 3×3
//! - extreme shaped: `(2·tier + 1)` square, so 3, 5, 7 or 9

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::item::{Ingredient, ItemStack};

/// Symbol → ingredient mapping of a shaped pattern.
pub type GridKey = BTreeMap<char, Ingredient>;

/// Grid size of the vanilla shaped and shapeless kinds.
const CRAFTING_GRID: usize = 3;

/// Size class of an extreme crafting recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(tier: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&tier) {
            Ok(Self(tier))
        } else {
            Err(ValidationError::InvalidTier(tier))
        }
    }

    /// Infer a tier from a raw ingredient count.
    ///
    /// `≤9 ⇒ 1`, `≤25 ⇒ 2`, `≤49 ⇒ 3`, otherwise 4. A tier-2 recipe that
    /// uses nine or fewer ingredients is classified as tier 1 by this rule,
    /// so an explicit tier should be preferred whenever one is available.
    pub fn infer_from_count(count: usize) -> Self {
        match count {
            0..=9 => Self(1),
            10..=25 => Self(2),
            26..=49 => Self(3),
            _ => Self(4),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Side length of the square grid for this tier.
    pub fn grid_size(self) -> usize {
        2 * self.0 as usize + 1
    }

    /// Number of cells in the grid for this tier.
    pub fn capacity(self) -> usize {
        self.grid_size() * self.grid_size()
    }
}

impl TryFrom<u8> for Tier {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}

/// Furnace-style conversion methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookingMethod {
    Smelting,
    Blasting,
    Smoking,
    CampfireCooking,
}

impl CookingMethod {
    pub const ALL: [CookingMethod; 4] = [
        Self::Smelting,
        Self::Blasting,
        Self::Smoking,
        Self::CampfireCooking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smelting => "smelting",
            Self::Blasting => "blasting",
            Self::Smoking => "smoking",
            Self::CampfireCooking => "campfire_cooking",
        }
    }
}

/// The registry sub-map a descriptor is filed under.
///
/// Shaped and shapeless recipes share `Crafting`; both extreme kinds share
/// `ExtremeCrafting`. An id may move between types when its kind changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeType {
    Crafting,
    Smelting,
    Blasting,
    Smoking,
    CampfireCooking,
    ExtremeCrafting,
}

impl RecipeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crafting => "crafting",
            Self::Smelting => "smelting",
            Self::Blasting => "blasting",
            Self::Smoking => "smoking",
            Self::CampfireCooking => "campfire_cooking",
            Self::ExtremeCrafting => "extreme_crafting",
        }
    }
}

impl fmt::Display for RecipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CookingMethod> for RecipeType {
    fn from(method: CookingMethod) -> Self {
        match method {
            CookingMethod::Smelting => Self::Smelting,
            CookingMethod::Blasting => Self::Blasting,
            CookingMethod::Smoking => Self::Smoking,
            CookingMethod::CampfireCooking => Self::CampfireCooking,
        }
    }
}

/// Kind-specific inputs of a recipe.
#[derive(Clone, Debug, PartialEq)]
pub enum RecipeBody {
    Shaped {
        pattern: Vec<String>,
        key: GridKey,
    },
    Shapeless {
        ingredients: Vec<Ingredient>,
    },
    Cooking {
        method: CookingMethod,
        ingredient: Ingredient,
        cook_time: u32,
        yield_factor: f32,
    },
    ExtremeShaped {
        tier: Tier,
        pattern: Vec<String>,
        key: GridKey,
    },
    ExtremeShapeless {
        tier: Tier,
        ingredients: Vec<Ingredient>,
    },
}

/// An immutable, validated recipe.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipeDescriptor {
    result: ItemStack,
    body: RecipeBody,
}

impl RecipeDescriptor {
    /// Validate and build a descriptor.
    pub fn new(result: ItemStack, body: RecipeBody) -> Result<Self, ValidationError> {
        result.validate()?;
        validate_body(&body)?;
        Ok(Self { result, body })
    }

    pub fn shaped(
        result: ItemStack,
        pattern: Vec<String>,
        key: GridKey,
    ) -> Result<Self, ValidationError> {
        Self::new(result, RecipeBody::Shaped { pattern, key })
    }

    pub fn shapeless(
        result: ItemStack,
        ingredients: Vec<Ingredient>,
    ) -> Result<Self, ValidationError> {
        Self::new(result, RecipeBody::Shapeless { ingredients })
    }

    pub fn cooking(
        method: CookingMethod,
        result: ItemStack,
        ingredient: Ingredient,
        cook_time: u32,
        yield_factor: f32,
    ) -> Result<Self, ValidationError> {
        Self::new(
            result,
            RecipeBody::Cooking {
                method,
                ingredient,
                cook_time,
                yield_factor,
            },
        )
    }

    pub fn extreme_shaped(
        tier: Tier,
        result: ItemStack,
        pattern: Vec<String>,
        key: GridKey,
    ) -> Result<Self, ValidationError> {
        Self::new(result, RecipeBody::ExtremeShaped { tier, pattern, key })
    }

    pub fn extreme_shapeless(
        tier: Tier,
        result: ItemStack,
        ingredients: Vec<Ingredient>,
    ) -> Result<Self, ValidationError> {
        Self::new(result, RecipeBody::ExtremeShapeless { tier, ingredients })
    }

    pub fn result(&self) -> &ItemStack {
        &self.result
    }

    pub fn body(&self) -> &RecipeBody {
        &self.body
    }

    /// Stable kind tag, matching the durable record `kind` field.
    pub fn kind_name(&self) -> &'static str {
        match &self.body {
            RecipeBody::Shaped { .. } => "shaped",
            RecipeBody::Shapeless { .. } => "shapeless",
            RecipeBody::Cooking { method, .. } => method.as_str(),
            RecipeBody::ExtremeShaped { .. } => "extreme_shaped",
            RecipeBody::ExtremeShapeless { .. } => "extreme_shapeless",
        }
    }

    pub fn recipe_type(&self) -> RecipeType {
        match &self.body {
            RecipeBody::Shaped { .. } | RecipeBody::Shapeless { .. } => RecipeType::Crafting,
            RecipeBody::Cooking { method, .. } => (*method).into(),
            RecipeBody::ExtremeShaped { .. } | RecipeBody::ExtremeShapeless { .. } => {
                RecipeType::ExtremeCrafting
            }
        }
    }

    /// Number of ingredient slots actually filled.
    pub fn ingredient_count(&self) -> usize {
        match &self.body {
            RecipeBody::Shaped { pattern, .. } | RecipeBody::ExtremeShaped { pattern, .. } => {
                filled_cells(pattern)
            }
            RecipeBody::Shapeless { ingredients }
            | RecipeBody::ExtremeShapeless { ingredients, .. } => ingredients.len(),
            RecipeBody::Cooking { .. } => 1,
        }
    }
}

fn filled_cells(pattern: &[String]) -> usize {
    pattern
        .iter()
        .flat_map(|row| row.chars())
        .filter(|ch| *ch != ' ')
        .count()
}

fn validate_body(body: &RecipeBody) -> Result<(), ValidationError> {
    match body {
        RecipeBody::Shaped { pattern, key } => validate_grid(pattern, key, CRAFTING_GRID),
        RecipeBody::Shapeless { ingredients } => {
            validate_list(ingredients, CRAFTING_GRID * CRAFTING_GRID)
        }
        RecipeBody::Cooking {
            cook_time,
            yield_factor,
            ..
        } => {
            if *cook_time == 0 {
                return Err(ValidationError::InvalidCookTime);
            }
            if !yield_factor.is_finite() || *yield_factor < 0.0 {
                return Err(ValidationError::InvalidYieldFactor(*yield_factor));
            }
            Ok(())
        }
        RecipeBody::ExtremeShaped { tier, pattern, key } => {
            validate_grid(pattern, key, tier.grid_size())
        }
        RecipeBody::ExtremeShapeless { tier, ingredients } => {
            validate_list(ingredients, tier.capacity())
        }
    }
}

fn validate_list(ingredients: &[Ingredient], max: usize) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::NoIngredients);
    }
    if ingredients.len() > max {
        return Err(ValidationError::TooManyIngredients {
            max,
            actual: ingredients.len(),
        });
    }
    Ok(())
}

fn validate_grid(pattern: &[String], key: &GridKey, size: usize) -> Result<(), ValidationError> {
    if pattern.len() != size {
        return Err(ValidationError::PatternRows {
            expected: size,
            actual: pattern.len(),
        });
    }

    let mut used = BTreeSet::new();
    for (row, line) in pattern.iter().enumerate() {
        let width = line.chars().count();
        if width != size {
            return Err(ValidationError::PatternWidth {
                row,
                expected: size,
                actual: width,
            });
        }
        for ch in line.chars().filter(|ch| *ch != ' ') {
            if !key.contains_key(&ch) {
                return Err(ValidationError::UnmappedSymbol(ch));
            }
            used.insert(ch);
        }
    }

    if used.is_empty() {
        return Err(ValidationError::EmptyPattern);
    }
    if let Some(unused) = key.keys().find(|symbol| !used.contains(*symbol)) {
        return Err(ValidationError::UnusedSymbol(*unused));
    }
    Ok(())
}
