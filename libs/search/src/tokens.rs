//! Token types produced by the query parser
//!
//! Every token carries a `negated` flag set by a leading `-` on its term.

use serde::Serialize;

/// Free text matched against the domain's default field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymousToken {
    pub criterion: String,
    pub negated: bool,
}

/// A `name:criterion` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedToken {
    pub name: String,
    pub criterion: String,
    pub negated: bool,
}

/// A `special:value` flag filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialToken {
    pub value: String,
    pub negated: bool,
}

/// A `sort:column[,asc|,desc]` ordering request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortToken {
    pub name: String,
    pub direction: SortDirection,
    pub negated: bool,
}

/// Direction requested by a sort token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
    /// Use the column's configured default.
    Default,
    /// Flip the column's configured default.
    NegatedDefault,
}

/// A concrete ordering, as configured per sortable column and as handed to
/// the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

impl SortDirection {
    /// Resolve against the column's configured default.
    pub fn resolve(self, default: SortOrder) -> SortOrder {
        match self {
            Self::Ascending => SortOrder::Ascending,
            Self::Descending => SortOrder::Descending,
            Self::Default => default,
            Self::NegatedDefault => default.reversed(),
        }
    }

    /// The direction a `-sort:...` term asks for.
    pub fn negated(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
            Self::Default => Self::NegatedDefault,
            Self::NegatedDefault => Self::Default,
        }
    }
}

impl From<SortOrder> for SortDirection {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Ascending => Self::Ascending,
            SortOrder::Descending => Self::Descending,
        }
    }
}
