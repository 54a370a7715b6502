//! Search execution
//!
//! The executor ties the pieces together:
//! 1. look the search up in the result cache
//! 2. parse the query text into tokens
//! 3. route the tokens to the domain's filter handlers, building two queries:
//!    one for the requested page (with sorting, offset and limit) and one for
//!    the total count (without sorting)
//! 4. run both and cache the `(total, entities)` pair
//!
//! Token application order is anonymous, named, special, then sort tokens, and
//! is the same for both queries so that they share one predicate set.

use crate::cache::{CacheKey, ConfigId, ResultCache};
use crate::criteria::utc_today;
use crate::error::format_names;
use crate::metrics;
use crate::pagination::{PageRequest, SearchPage};
use crate::parser::{self, ParsedQuery};
use crate::query::BackingQuery;
use crate::search_config::{CriterionFilter, FlagFilter, SearchConfig, SortColumn};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;

/// Entity type searched by a config.
pub type EntityOf<C> = <<C as SearchConfig>::Query as BackingQuery>::Entity;

type ColumnOf<C> = <<C as SearchConfig>::Query as BackingQuery>::Column;

/// Total number of matches and the entities of the requested page.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<E> {
    pub total: u64,
    pub entities: Vec<E>,
}

/// Executes searches for one domain.
pub struct Executor<C: SearchConfig> {
    config: Arc<C>,
    config_id: ConfigId,
    cache: Arc<ResultCache>,
}

impl<C> Clone for Executor<C>
where
    C: SearchConfig,
{
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_id: self.config_id.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C> Executor<C>
where
    C: SearchConfig + 'static,
    EntityOf<C>: Send + Sync + 'static,
{
    /// Create an executor. The cache may be shared with executors of other domains.
    pub fn new(config: Arc<C>, cache: Arc<ResultCache>) -> Self {
        let config_id = ConfigId::of(&config);
        Self {
            config,
            config_id,
            cache,
        }
    }

    pub fn config(&self) -> &Arc<C> {
        &self.config
    }

    pub fn config_id(&self) -> &ConfigId {
        &self.config_id
    }

    /// Return the total match count and the entities of the requested page.
    ///
    /// Identical `(query_text, page)` requests are served from the result
    /// cache without touching the backend.
    pub fn execute(
        &self,
        query_text: &str,
        page: PageRequest,
    ) -> Result<Arc<SearchResult<EntityOf<C>>>> {
        let domain = self.config.domain();
        let span = tracing::debug_span!(
            "search.execute",
            domain,
            query = query_text,
            page = page.page(),
            page_size = page.page_size()
        );
        let _enter = span.enter();

        let key = CacheKey {
            config: self.config_id.clone(),
            query_text: query_text.to_string(),
            page: page.page(),
            page_size: page.page_size(),
        };

        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let _claim = self.cache.claim(&key);
        // Another caller may have stored the result while we waited for the claim.
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }
        metrics::record_cache_lookup(domain, false);

        let started = Instant::now();
        let result = match self.run(query_text, page) {
            Ok(result) => {
                metrics::record_execution(domain, "ok", started.elapsed());
                Arc::new(result)
            }
            Err(e) => {
                let outcome = if e.is_client_error() {
                    "client_error"
                } else {
                    "error"
                };
                metrics::record_execution(domain, outcome, started.elapsed());
                tracing::debug!(error = %e, "Search failed");
                return Err(e);
            }
        };

        tracing::debug!(
            total = result.total,
            returned = result.entities.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search executed"
        );

        self.cache.put(key, result.clone());
        Ok(result)
    }

    /// Execute and map the page's entities into a serializable envelope.
    pub fn execute_and_serialize<S, F>(
        &self,
        query_text: &str,
        page: PageRequest,
        serializer: F,
    ) -> Result<SearchPage<S>>
    where
        F: FnMut(&EntityOf<C>) -> S,
    {
        let result = self.execute(query_text, page)?;
        Ok(SearchPage {
            query: query_text.to_string(),
            page: page.page(),
            page_size: page.page_size(),
            total: result.total,
            results: result.entities.iter().map(serializer).collect(),
        })
    }

    /// Parse the query and check every token against the config without
    /// running anything.
    pub fn parse_and_validate(&self, query_text: &str) -> Result<ParsedQuery> {
        let search_query = parser::parse(query_text);
        if !search_query.anonymous_tokens.is_empty() {
            self.anonymous_filter()?;
        }
        for token in &search_query.named_tokens {
            self.named_filter(&token.name)?;
        }
        for token in &search_query.special_tokens {
            self.special_filter(&token.value)?;
        }
        for token in &search_query.sort_tokens {
            self.sort_column(&token.name)?;
        }
        Ok(search_query)
    }

    /// Drop all cached results of this executor's config.
    pub fn invalidate(&self) -> usize {
        let removed = self.cache.invalidate_config(&self.config_id);
        tracing::debug!(domain = self.config.domain(), removed, "Invalidated cached searches");
        removed
    }

    fn cached(&self, key: &CacheKey) -> Option<Arc<SearchResult<EntityOf<C>>>> {
        let hit = self.cache.get_typed::<SearchResult<EntityOf<C>>>(key)?;
        metrics::record_cache_lookup(self.config.domain(), true);
        tracing::trace!("Search served from cache");
        Some(hit)
    }

    fn run(&self, query_text: &str, page: PageRequest) -> Result<SearchResult<EntityOf<C>>> {
        let search_query = parser::parse(query_text);
        // both queries see the same day even across midnight
        let today = utc_today();

        let filter_query = self
            .config
            .create_filter_query()
            .disable_eager_loading()
            .reference_day(today);
        let filter_query = self.prepare_query(filter_query, &search_query, true)?;
        let entities = filter_query
            .offset(page.offset())
            .limit(page.page_size())
            .fetch()?;

        let count_query = self
            .config
            .create_count_query()
            .disable_eager_loading()
            .reference_day(today);
        let count_query = self.prepare_query(count_query, &search_query, false)?;
        let total = count_query.clear_ordering().count()?;

        Ok(SearchResult { total, entities })
    }

    fn prepare_query(
        &self,
        mut query: C::Query,
        search_query: &ParsedQuery,
        use_sort: bool,
    ) -> Result<C::Query> {
        for token in &search_query.anonymous_tokens {
            let filter = self.anonymous_filter()?;
            query = filter(query, &token.criterion, token.negated)?;
        }

        for token in &search_query.named_tokens {
            let filter = self.named_filter(&token.name)?;
            query = filter(query, &token.criterion, token.negated)?;
        }

        for token in &search_query.special_tokens {
            let filter = self.special_filter(&token.value)?;
            query = filter(query, token.negated)?;
        }

        if use_sort {
            for token in &search_query.sort_tokens {
                let sort = self.sort_column(&token.name)?;
                let order = token.direction.resolve(sort.default_order);
                query = query.order_by(&sort.column, order);
            }
        }

        Ok(self.config.finalize_query(query))
    }

    fn anonymous_filter(&self) -> Result<&CriterionFilter<C::Query>> {
        self.config.anonymous_filter().ok_or_else(|| {
            Error::Search("Anonymous tokens are not valid in this context.".to_string())
        })
    }

    fn named_filter(&self, name: &str) -> Result<&CriterionFilter<C::Query>> {
        let filters = self.config.named_filters();
        filters.get(name).ok_or_else(|| {
            Error::Search(format!(
                "Unknown named token: {:?}. Available named tokens: {}.",
                name,
                format_names(filters.keys())
            ))
        })
    }

    fn special_filter(&self, value: &str) -> Result<&FlagFilter<C::Query>> {
        let filters = self.config.special_filters();
        filters.get(value).ok_or_else(|| {
            Error::Search(format!(
                "Unknown special token: {:?}. Available special tokens: {}.",
                value,
                format_names(filters.keys())
            ))
        })
    }

    fn sort_column(&self, name: &str) -> Result<&SortColumn<ColumnOf<C>>> {
        let columns = self.config.sort_columns();
        columns.get(name).ok_or_else(|| {
            Error::Search(format!(
                "Unknown sort token: {:?}. Available sort tokens: {}.",
                name,
                format_names(columns.keys())
            ))
        })
    }
}
