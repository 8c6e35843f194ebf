//! Recipe identifiers.
//!
//! A [`RecipeId`] is a two-part `namespace:path` identifier. Valid ids:
//! - Namespace and path must be non-empty
//! - Namespace uses only `a-z`, `0-9`, `_`, `.`, `-`
//! - Path additionally allows `/`
//! - A string without `:` lives in [`DEFAULT_NAMESPACE`]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Namespace assumed when a string id carries no `namespace:` prefix.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Identifier of one registry entry, unique regardless of recipe type.
///
/// Ordering is by namespace, then path, which gives every id-keyed map in
/// rpatch a stable iteration order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipeId {
    namespace: String,
    path: String,
}

impl RecipeId {
    /// Build an id from its two parts, validating both.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self, TypeError> {
        let namespace = namespace.into();
        let path = path.into();
        let display = format!("{namespace}:{path}");
        validate_part(&display, &namespace, false)?;
        validate_part(&display, &path, true)?;
        Ok(Self { namespace, path })
    }

    /// Parse the canonical `namespace:path` form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, s),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Same namespace, different path. Used to derive fresh ids.
    pub fn with_path(&self, path: impl Into<String>) -> Result<Self, TypeError> {
        Self::new(self.namespace.clone(), path)
    }
}

fn validate_part(id: &str, part: &str, allow_slash: bool) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidId {
        id: id.to_string(),
        reason,
    };
    if part.is_empty() {
        let which = if allow_slash { "path" } else { "namespace" };
        return Err(invalid(format!("{which} must not be empty")));
    }
    for ch in part.chars() {
        let ok = matches!(ch, 'a'..='z' | '0'..='9' | '_' | '.' | '-') || (allow_slash && ch == '/');
        if !ok {
            return Err(invalid(format!("contains forbidden character: {ch:?}")));
        }
    }
    Ok(())
}

impl FromStr for RecipeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecipeId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecipeId> for String {
    fn from(id: RecipeId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl fmt::Debug for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipeId({self})")
    }
}
