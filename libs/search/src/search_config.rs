//! Per-domain search capability
//!
//! Each searchable entity type (users, tags, ...) implements [`SearchConfig`]
//! once. The executor never interprets criteria itself; it only routes tokens
//! to the handlers registered here.

use crate::query::BackingQuery;
use crate::tokens::SortOrder;
use crate::Result;
use std::collections::BTreeMap;

/// Handler for anonymous and named tokens: `(query, criterion, negated)`.
pub type CriterionFilter<Q> = Box<dyn Fn(Q, &str, bool) -> Result<Q> + Send + Sync>;

/// Handler for special tokens: `(query, negated)`.
pub type FlagFilter<Q> = Box<dyn Fn(Q, bool) -> Result<Q> + Send + Sync>;

/// Named handlers keyed by token name. Ordered so that listings are sorted.
pub type FilterMap<F> = BTreeMap<String, F>;

/// A sortable column and the order used when the query does not pick one.
#[derive(Debug, Clone)]
pub struct SortColumn<C> {
    pub column: C,
    pub default_order: SortOrder,
}

impl<C> SortColumn<C> {
    pub fn new(column: C, default_order: SortOrder) -> Self {
        Self {
            column,
            default_order,
        }
    }
}

pub type SortColumns<C> = BTreeMap<String, SortColumn<C>>;

/// Search capability of one entity type.
pub trait SearchConfig: Send + Sync {
    type Query: BackingQuery;

    /// Short name of the domain, used in logs and metrics (`"user"`, `"tag"`).
    fn domain(&self) -> &str;

    /// Query producing the rows of a result page.
    fn create_filter_query(&self) -> Self::Query;

    /// Query producing the total count.
    fn create_count_query(&self) -> Self::Query;

    /// Handler for tokens without a name. `None` rejects anonymous tokens.
    fn anonymous_filter(&self) -> Option<&CriterionFilter<Self::Query>> {
        None
    }

    fn named_filters(&self) -> &FilterMap<CriterionFilter<Self::Query>>;

    fn special_filters(&self) -> &FilterMap<FlagFilter<Self::Query>>;

    fn sort_columns(&self) -> &SortColumns<<Self::Query as BackingQuery>::Column>;

    /// Last adjustment applied to both queries after filters and sorting.
    fn finalize_query(&self, query: Self::Query) -> Self::Query {
        query
    }
}
