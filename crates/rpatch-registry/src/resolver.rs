//! Precedence between the built-in layer and the authored layers.
//!
//! Fixed order, highest first: blacklist, override, authored record,
//! built-in. The result depends only on set membership, never on the order
//! a map happens to iterate in.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rpatch_types::{RecipeDescriptor, RecipeId};

use crate::snapshot::RegistrySnapshot;

/// What a reload must strip from the built-in layer before merging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Built-in ids that an override or a blacklist entry displaces.
    pub remove_from_base: BTreeSet<RecipeId>,
    /// Override ids that also exist in the built-in layer.
    pub overridden: BTreeSet<RecipeId>,
    /// Blacklisted ids that the built-in layer holds.
    pub suppressed: BTreeSet<RecipeId>,
}

/// Which layer a visible entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    Base,
    Authored,
    Override,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Authored => "authored",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved state of a single id.
#[derive(Clone, Debug, PartialEq)]
pub enum Visibility {
    Absent,
    Visible {
        descriptor: Arc<RecipeDescriptor>,
        origin: Origin,
    },
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible { .. })
    }

    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::Absent => None,
            Self::Visible { origin, .. } => Some(*origin),
        }
    }
}

/// Stateless precedence rules.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Work out which built-in entries the override and blacklist layers
    /// displace.
    pub fn resolve_conflicts(
        base: &RegistrySnapshot,
        override_ids: &BTreeSet<RecipeId>,
        blacklist: &BTreeSet<RecipeId>,
    ) -> Resolution {
        let overridden: BTreeSet<RecipeId> = override_ids
            .iter()
            .filter(|id| base.contains(id))
            .cloned()
            .collect();
        let suppressed: BTreeSet<RecipeId> = blacklist
            .iter()
            .filter(|id| base.contains(id))
            .cloned()
            .collect();
        let remove_from_base = overridden.union(&suppressed).cloned().collect();
        Resolution {
            remove_from_base,
            overridden,
            suppressed,
        }
    }

    /// Resolve one id against every layer.
    pub fn visibility(
        id: &RecipeId,
        base: &RegistrySnapshot,
        authored: Option<Arc<RecipeDescriptor>>,
        overridden: Option<Arc<RecipeDescriptor>>,
        blacklisted: bool,
    ) -> Visibility {
        if blacklisted {
            return Visibility::Absent;
        }
        let layered = overridden
            .map(|d| (d, Origin::Override))
            .or_else(|| authored.map(|d| (d, Origin::Authored)))
            .or_else(|| base.get(id).map(|d| (Arc::clone(d), Origin::Base)));
        match layered {
            Some((descriptor, origin)) => Visibility::Visible { descriptor, origin },
            None => Visibility::Absent,
        }
    }
}
