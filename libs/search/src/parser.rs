//! Query text parsing
//!
//! Turns a raw query such as `-name:foo* sort:usages,desc special:unused bar`
//! into a [`ParsedQuery`]. Parsing never fails: terms that would not make sense
//! for a domain are still turned into tokens and rejected later, when the
//! executor checks them against the domain's search config.
//!
//! Grammar:
//! - terms are separated by whitespace
//! - each leading `-` toggles negation of the term
//! - `name:value` is a named term when `name` is made of ASCII alphanumerics,
//!   `_` or `-`; `sort:` and `special:` names are reserved
//! - everything else is an anonymous term

use crate::tokens::{AnonymousToken, NamedToken, SortDirection, SortToken, SpecialToken};
use serde::Serialize;

const SORT_KEY: &str = "sort";
const SPECIAL_KEY: &str = "special";

/// Tokens of a parsed query, grouped by kind, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub anonymous_tokens: Vec<AnonymousToken>,
    pub named_tokens: Vec<NamedToken>,
    pub special_tokens: Vec<SpecialToken>,
    /// First token is the primary sort key.
    pub sort_tokens: Vec<SortToken>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.anonymous_tokens.is_empty()
            && self.named_tokens.is_empty()
            && self.special_tokens.is_empty()
            && self.sort_tokens.is_empty()
    }

    /// Number of tokens of all kinds.
    pub fn len(&self) -> usize {
        self.anonymous_tokens.len()
            + self.named_tokens.len()
            + self.special_tokens.len()
            + self.sort_tokens.len()
    }
}

/// Parse query text into tokens.
pub fn parse(text: &str) -> ParsedQuery {
    let mut query = ParsedQuery::default();

    for term in text.split_whitespace() {
        let (negated, term) = strip_negation(term);
        if term.is_empty() {
            continue;
        }

        match split_named(term) {
            Some((SORT_KEY, value)) => query.sort_tokens.push(parse_sort(value, negated)),
            Some((SPECIAL_KEY, value)) => query.special_tokens.push(SpecialToken {
                value: value.to_string(),
                negated,
            }),
            Some((name, value)) => query.named_tokens.push(NamedToken {
                name: name.to_string(),
                criterion: value.to_string(),
                negated,
            }),
            None => query.anonymous_tokens.push(AnonymousToken {
                criterion: term.to_string(),
                negated,
            }),
        }
    }

    tracing::trace!(tokens = query.len(), "Parsed search query");
    query
}

fn strip_negation(mut term: &str) -> (bool, &str) {
    let mut negated = false;
    while let Some(rest) = term.strip_prefix('-') {
        negated = !negated;
        term = rest;
    }
    (negated, term)
}

fn split_named(term: &str) -> Option<(&str, &str)> {
    let (name, value) = term.split_once(':')?;
    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }
    Some((name, value))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse the value of a `sort:` term (`column`, `column,asc`, `column,desc`).
///
/// Any other shape keeps the whole value as the column name so that it is
/// reported as an unknown sort column.
fn parse_sort(value: &str, negated: bool) -> SortToken {
    let (name, direction) = match value.split_once(',') {
        None => (value, SortDirection::Default),
        Some((column, suffix)) => match suffix {
            "asc" => (column, SortDirection::Ascending),
            "desc" => (column, SortDirection::Descending),
            "" => (column, SortDirection::Default),
            _ => (value, SortDirection::Default),
        },
    };

    let direction = if negated {
        direction.negated()
    } else {
        direction
    };

    SortToken {
        name: name.to_string(),
        direction,
        negated,
    }
}
