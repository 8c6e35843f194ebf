//! The durable record format and the per-kind builders that decode it.
//!
//! On-disk JSON (one record per id):
//! ```text
//! {
//!   "id": "mod:sword",
//!   "kind": "shaped",
//!   "result": { "item": "minecraft:diamond_sword", "count": 1, "nbt": "{...}" },
//!   "pattern": [" D ", " D ", " S "],
//!   "ingredients": [{ "symbol": "D", "item": "minecraft:diamond" }, ...],
//!   "tier": 2,
//!   "cookTime": 200,
//!   "yieldFactor": 0.1
//! }
//! ```
//! Fields that a kind does not use are omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rpatch_types::{
    CookingMethod, GridKey, Ingredient, ItemStack, RecipeBody, RecipeDescriptor, RecipeId, Tier,
};

use crate::error::RecordError;

/// One ingredient slot in a stored record.
///
/// Grid kinds store `{symbol, item}` pairs; list kinds store plain strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientEntry {
    Keyed { symbol: char, item: String },
    Plain(String),
}

/// A recipe as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecipe {
    /// Canonical `namespace:path` id. Authoritative over the storage key.
    pub id: String,
    pub kind: String,
    pub result: ItemStack,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pattern: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<IngredientEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_factor: Option<f32>,
}

impl StoredRecipe {
    /// Encode a descriptor under the given id.
    pub fn encode(id: &RecipeId, descriptor: &RecipeDescriptor) -> Self {
        let mut record = Self {
            id: id.to_string(),
            kind: descriptor.kind_name().to_string(),
            result: descriptor.result().clone(),
            pattern: Vec::new(),
            ingredients: Vec::new(),
            tier: None,
            cook_time: None,
            yield_factor: None,
        };
        match descriptor.body() {
            RecipeBody::Shaped { pattern, key } => {
                record.pattern = pattern.clone();
                record.ingredients = keyed(key);
            }
            RecipeBody::Shapeless { ingredients } => {
                record.ingredients = plain(ingredients);
            }
            RecipeBody::Cooking {
                ingredient,
                cook_time,
                yield_factor,
                ..
            } => {
                record.ingredients = vec![IngredientEntry::Plain(ingredient.to_string())];
                record.cook_time = Some(*cook_time);
                record.yield_factor = Some(*yield_factor);
            }
            RecipeBody::ExtremeShaped { tier, pattern, key } => {
                record.tier = Some(tier.get());
                record.pattern = pattern.clone();
                record.ingredients = keyed(key);
            }
            RecipeBody::ExtremeShapeless { tier, ingredients } => {
                record.tier = Some(tier.get());
                record.ingredients = plain(ingredients);
            }
        }
        record
    }

    /// Parse the embedded id.
    pub fn recipe_id(&self) -> Result<RecipeId, RecordError> {
        Ok(RecipeId::parse(&self.id)?)
    }

    /// Decode into `(id, descriptor)` by dispatching on the kind tag.
    pub fn decode(&self) -> Result<(RecipeId, RecipeDescriptor), RecordError> {
        let id = self.recipe_id()?;
        Ok((id, self.descriptor()?))
    }

    /// Decode the body alone. The embedded id is not looked at, so records
    /// written by hand may leave it empty.
    pub fn descriptor(&self) -> Result<RecipeDescriptor, RecordError> {
        let kind = RecordKind::parse(&self.kind)?;
        (kind.builder())(self)
    }
}

fn keyed(key: &GridKey) -> Vec<IngredientEntry> {
    key.iter()
        .map(|(symbol, ingredient)| IngredientEntry::Keyed {
            symbol: *symbol,
            item: ingredient.to_string(),
        })
        .collect()
}

fn plain(ingredients: &[Ingredient]) -> Vec<IngredientEntry> {
    ingredients
        .iter()
        .map(|ingredient| IngredientEntry::Plain(ingredient.to_string()))
        .collect()
}

/// Decodes one kind of record.
pub type BuildFn = fn(&StoredRecipe) -> Result<RecipeDescriptor, RecordError>;

/// Every recipe kind a record can carry.
///
/// Each variant owns exactly one builder; adding a kind means adding a
/// variant here and its builder below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Shaped,
    Shapeless,
    Smelting,
    Blasting,
    Smoking,
    CampfireCooking,
    ExtremeShaped,
    ExtremeShapeless,
}

impl RecordKind {
    pub const ALL: [RecordKind; 8] = [
        Self::Shaped,
        Self::Shapeless,
        Self::Smelting,
        Self::Blasting,
        Self::Smoking,
        Self::CampfireCooking,
        Self::ExtremeShaped,
        Self::ExtremeShapeless,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shaped => "shaped",
            Self::Shapeless => "shapeless",
            Self::Smelting => CookingMethod::Smelting.as_str(),
            Self::Blasting => CookingMethod::Blasting.as_str(),
            Self::Smoking => CookingMethod::Smoking.as_str(),
            Self::CampfireCooking => CookingMethod::CampfireCooking.as_str(),
            Self::ExtremeShaped => "extreme_shaped",
            Self::ExtremeShapeless => "extreme_shapeless",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, RecordError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| RecordError::UnknownKind(tag.to_string()))
    }

    pub fn builder(self) -> BuildFn {
        match self {
            Self::Shaped => build_shaped,
            Self::Shapeless => build_shapeless,
            Self::Smelting => |r| build_cooking(r, CookingMethod::Smelting),
            Self::Blasting => |r| build_cooking(r, CookingMethod::Blasting),
            Self::Smoking => |r| build_cooking(r, CookingMethod::Smoking),
            Self::CampfireCooking => |r| build_cooking(r, CookingMethod::CampfireCooking),
            Self::ExtremeShaped => build_extreme_shaped,
            Self::ExtremeShapeless => build_extreme_shapeless,
        }
    }
}

fn build_shaped(record: &StoredRecipe) -> Result<RecipeDescriptor, RecordError> {
    let kind = RecordKind::Shaped.as_str();
    let pattern = require_pattern(record, kind)?;
    let key = grid_key(record, kind)?;
    Ok(RecipeDescriptor::shaped(record.result.clone(), pattern, key)?)
}

fn build_shapeless(record: &StoredRecipe) -> Result<RecipeDescriptor, RecordError> {
    let ingredients = ingredient_list(record, RecordKind::Shapeless.as_str())?;
    Ok(RecipeDescriptor::shapeless(record.result.clone(), ingredients)?)
}

fn build_cooking(
    record: &StoredRecipe,
    method: CookingMethod,
) -> Result<RecipeDescriptor, RecordError> {
    let kind = method.as_str();
    let mut ingredients = ingredient_list(record, kind)?;
    if ingredients.len() != 1 {
        return Err(RecordError::MalformedIngredients {
            kind,
            reason: format!("expected exactly one ingredient, found {}", ingredients.len()),
        });
    }
    let cook_time = record.cook_time.ok_or(RecordError::MissingField {
        kind,
        field: "cookTime",
    })?;
    let yield_factor = record.yield_factor.unwrap_or(0.0);
    Ok(RecipeDescriptor::cooking(
        method,
        record.result.clone(),
        ingredients.remove(0),
        cook_time,
        yield_factor,
    )?)
}

fn build_extreme_shaped(record: &StoredRecipe) -> Result<RecipeDescriptor, RecordError> {
    let kind = RecordKind::ExtremeShaped.as_str();
    let pattern = require_pattern(record, kind)?;
    let key = grid_key(record, kind)?;
    let filled = pattern
        .iter()
        .flat_map(|row| row.chars())
        .filter(|ch| *ch != ' ')
        .count();
    let tier = tier_or_inferred(record, filled)?;
    Ok(RecipeDescriptor::extreme_shaped(
        tier,
        record.result.clone(),
        pattern,
        key,
    )?)
}

fn build_extreme_shapeless(record: &StoredRecipe) -> Result<RecipeDescriptor, RecordError> {
    let ingredients = ingredient_list(record, RecordKind::ExtremeShapeless.as_str())?;
    let tier = tier_or_inferred(record, ingredients.len())?;
    Ok(RecipeDescriptor::extreme_shapeless(
        tier,
        record.result.clone(),
        ingredients,
    )?)
}

fn tier_or_inferred(record: &StoredRecipe, count: usize) -> Result<Tier, RecordError> {
    match record.tier {
        Some(tier) => Ok(Tier::new(tier)?),
        None => Ok(Tier::infer_from_count(count)),
    }
}

fn require_pattern(record: &StoredRecipe, kind: &'static str) -> Result<Vec<String>, RecordError> {
    if record.pattern.is_empty() {
        return Err(RecordError::MissingField {
            kind,
            field: "pattern",
        });
    }
    Ok(record.pattern.clone())
}

fn grid_key(record: &StoredRecipe, kind: &'static str) -> Result<GridKey, RecordError> {
    let mut key = BTreeMap::new();
    for entry in &record.ingredients {
        match entry {
            IngredientEntry::Keyed { symbol, item } => {
                key.insert(*symbol, Ingredient::parse(item)?);
            }
            IngredientEntry::Plain(item) => {
                return Err(RecordError::MalformedIngredients {
                    kind,
                    reason: format!("ingredient {item:?} has no symbol"),
                });
            }
        }
    }
    Ok(key)
}

fn ingredient_list(
    record: &StoredRecipe,
    kind: &'static str,
) -> Result<Vec<Ingredient>, RecordError> {
    record
        .ingredients
        .iter()
        .map(|entry| match entry {
            IngredientEntry::Plain(item) => Ok(Ingredient::parse(item)?),
            IngredientEntry::Keyed { symbol, .. } => Err(RecordError::MalformedIngredients {
                kind,
                reason: format!("unexpected symbol {symbol:?} in ingredient list"),
            }),
        })
        .collect()
}
