use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, ValidationError};
use crate::id::RecipeId;

/// The output of a recipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item identifier in `namespace:path` form.
    pub item: String,
    pub count: u32,
    /// Opaque metadata blob (enchantments, names, ...) carried verbatim so
    /// identity-preserving attributes survive a save/load cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbt: Option<String>,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
            nbt: None,
        }
    }

    pub fn with_nbt(mut self, nbt: impl Into<String>) -> Self {
        self.nbt = Some(nbt.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.item.trim().is_empty() {
            return Err(ValidationError::MissingResult);
        }
        RecipeId::parse(&self.item)?;
        if self.count == 0 {
            return Err(ValidationError::InvalidCount(self.count));
        }
        Ok(())
    }

    /// Path part of the item id, used to derive recipe ids.
    pub fn item_path(&self) -> &str {
        match self.item.split_once(':') {
            Some((_, path)) => path,
            None => &self.item,
        }
    }
}

/// A recipe input: one concrete item or every item in a tag.
///
/// Serialized as a plain string; tags carry a leading `#`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Ingredient {
    Item(String),
    Tag(String),
}

impl Ingredient {
    pub fn item(id: impl Into<String>) -> Self {
        Self::Item(id.into())
    }

    pub fn tag(id: impl Into<String>) -> Self {
        Self::Tag(id.into())
    }

    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (tag, body) = match s.strip_prefix('#') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if RecipeId::parse(body).is_err() {
            return Err(TypeError::InvalidIngredient(s.to_string()));
        }
        Ok(if tag {
            Self::Tag(body.to_string())
        } else {
            Self::Item(body.to_string())
        })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }
}

impl TryFrom<String> for Ingredient {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ingredient> for String {
    fn from(ingredient: Ingredient) -> Self {
        ingredient.to_string()
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "{id}"),
            Self::Tag(id) => write!(f, "#{id}"),
        }
    }
}

impl fmt::Debug for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ingredient({self})")
    }
}
