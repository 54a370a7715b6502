//! Booru search engine
//!
//! Turns a free-form query string into a filtered, sorted and paginated result
//! set for one searchable domain.
//!
//! # Architecture Overview
//!
//! ```text
//! Query text
//!      |
//!   Parser -> ParsedQuery (anonymous, named, special and sort tokens)
//!      |
//!   Executor -> SearchConfig handlers -> BackingQuery (page + count)
//!      |
//!   ResultCache -> SearchResult { total, entities }
//! ```
//!
//! Domains implement [`SearchConfig`] over any storage implementing
//! [`BackingQuery`]. The [`memory`] backend and the reference [`domains`]
//! (users and tags) show a complete wiring.

pub mod cache;
pub mod criteria;
pub mod domains;
pub mod error;
pub mod executor;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod pagination;
pub mod parser;
pub mod query;
pub mod search_config;
pub mod settings;
pub mod tokens;

// Re-export main types
pub use cache::{CacheMode, CachePolicy, ResultCache};
pub use criteria::Criterion;
pub use error::{Error, Result};
pub use executor::{EntityOf, Executor, SearchResult};
pub use pagination::{PageRequest, SearchPage};
pub use parser::{parse, ParsedQuery};
pub use query::BackingQuery;
pub use search_config::{
    CriterionFilter, FilterMap, FlagFilter, SearchConfig, SortColumn, SortColumns,
};
pub use settings::Settings;
pub use tokens::{AnonymousToken, NamedToken, SortDirection, SortOrder, SortToken, SpecialToken};
