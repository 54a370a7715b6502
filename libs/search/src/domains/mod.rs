//! Reference search domains backed by [`MemoryCollection`](crate::memory::MemoryCollection)

pub mod tags;
pub mod users;

pub use tags::{serialize_tag, Tag, TagSearchConfig};
pub use users::{serialize_user, User, UserSearchConfig};

use crate::search_config::{FilterMap, SortColumn, SortColumns};
use crate::tokens::SortOrder;

fn filter_map<F>(entries: impl IntoIterator<Item = (&'static str, F)>) -> FilterMap<F> {
    entries
        .into_iter()
        .map(|(name, filter)| (name.to_string(), filter))
        .collect()
}

fn sort_columns<C>(
    entries: impl IntoIterator<Item = (&'static str, C, SortOrder)>,
) -> SortColumns<C> {
    entries
        .into_iter()
        .map(|(name, column, order)| (name.to_string(), SortColumn::new(column, order)))
        .collect()
}
