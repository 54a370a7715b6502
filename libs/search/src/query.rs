//! Contract between the executor and a backing data source
//!
//! A backing query is a builder: filters narrow it down (AND-accumulating
//! predicates), the executor adds ordering and pagination, and finally runs it
//! either as a row fetch or as a scalar count. Any storage can implement this
//! trait (SQL query builder, in-memory collection, remote index, ...).

use crate::tokens::SortOrder;
use crate::Result;
use chrono::NaiveDate;

pub trait BackingQuery: Sized {
    /// Row type produced by [`BackingQuery::fetch`].
    type Entity;

    /// Reference to a sortable column.
    type Column;

    /// Hint that related data should not be loaded eagerly.
    ///
    /// The default does nothing.
    fn disable_eager_loading(self) -> Self {
        self
    }

    /// Day that relative criteria such as `today` resolve against.
    ///
    /// The executor pins one day for both queries of a search. The default
    /// ignores it.
    fn reference_day(self, _day: NaiveDate) -> Self {
        self
    }

    /// Append an ordering key. Keys added first take precedence.
    fn order_by(self, column: &Self::Column, order: SortOrder) -> Self;

    /// Drop all ordering keys.
    fn clear_ordering(self) -> Self;

    fn offset(self, offset: u64) -> Self;

    fn limit(self, limit: u64) -> Self;

    /// Run the query and return the matching rows in query order.
    fn fetch(self) -> Result<Vec<Self::Entity>>;

    /// Run the query as a count of matching rows.
    ///
    /// Ordering, offset and limit must not influence the result.
    fn count(self) -> Result<u64>;
}
