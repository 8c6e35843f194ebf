use thiserror::Error;

/// Errors produced while parsing identifiers and item references.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid recipe id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid ingredient {0:?}")]
    InvalidIngredient(String),
}

/// A descriptor failed structural validation.
///
/// Raised before anything is staged, so a rejected descriptor never changes
/// registry or store state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("recipe result is missing an item")]
    MissingResult,

    #[error("result count must be at least 1, got {0}")]
    InvalidCount(u32),

    #[error("pattern has {actual} rows, expected {expected}")]
    PatternRows { expected: usize, actual: usize },

    #[error("pattern row {row} is {actual} wide, expected {expected}")]
    PatternWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("pattern symbol {0:?} has no key entry")]
    UnmappedSymbol(char),

    #[error("key symbol {0:?} is not used by the pattern")]
    UnusedSymbol(char),

    #[error("pattern contains no ingredients")]
    EmptyPattern,

    #[error("recipe has no ingredients")]
    NoIngredients,

    #[error("{actual} ingredients exceed the {max} allowed")]
    TooManyIngredients { max: usize, actual: usize },

    #[error("invalid tier {0}, expected 1..=4")]
    InvalidTier(u8),

    #[error("cook time must be positive")]
    InvalidCookTime,

    #[error("yield factor must be finite and non-negative, got {0}")]
    InvalidYieldFactor(f32),

    #[error(transparent)]
    Type(#[from] TypeError),
}
