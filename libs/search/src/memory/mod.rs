//! In-memory backing source
//!
//! [`MemoryCollection`] holds rows in process memory and hands out
//! [`MemoryQuery`] builders implementing [`BackingQuery`]. Predicates are
//! AND-ed, ordering keys are applied in insertion order with a stable sort, and
//! every fetch or count is counted so callers can observe backend traffic.

pub mod filters;

use crate::criteria::utc_today;
use crate::query::BackingQuery;
use crate::tokens::SortOrder;
use crate::Result;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Rows searchable through [`MemoryQuery`].
pub struct MemoryCollection<T> {
    rows: RwLock<Arc<Vec<T>>>,
    executions: AtomicUsize,
}

impl<T> fmt::Debug for MemoryCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("len", &self.len())
            .field("executions", &self.executions())
            .finish()
    }
}

impl<T> MemoryCollection<T> {
    pub fn new(rows: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            rows: RwLock::new(Arc::new(rows)),
            executions: AtomicUsize::new(0),
        })
    }

    /// Start a query over the collection. Rows are read when the query runs.
    pub fn query(self: &Arc<Self>) -> MemoryQuery<T> {
        MemoryQuery {
            source: Arc::clone(self),
            predicates: Vec::new(),
            ordering: Vec::new(),
            offset: 0,
            limit: None,
            eager_loading: true,
            today: utc_today(),
        }
    }

    /// Replace all rows. Cached search results are not affected.
    pub fn replace(&self, rows: Vec<T>) {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(rows);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches and counts run so far.
    pub fn executions(&self) -> usize {
        self.executions.load(AtomicOrdering::SeqCst)
    }

    fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.rows.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A named ordering over rows of `T`.
pub struct MemoryColumn<T> {
    name: &'static str,
    compare: Comparator<T>,
}

impl<T> Clone for MemoryColumn<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for MemoryColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryColumn").field(&self.name).finish()
    }
}

impl<T> MemoryColumn<T> {
    /// Order rows by a key extracted from each row.
    pub fn by_key<K, F>(name: &'static str, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            name,
            compare: Arc::new(move |a, b| key(a).cmp(&key(b))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Query builder over a [`MemoryCollection`].
pub struct MemoryQuery<T> {
    source: Arc<MemoryCollection<T>>,
    predicates: Vec<Predicate<T>>,
    ordering: Vec<(MemoryColumn<T>, SortOrder)>,
    offset: u64,
    limit: Option<u64>,
    eager_loading: bool,
    today: NaiveDate,
}

impl<T> fmt::Debug for MemoryQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("predicates", &self.predicates.len())
            .field("ordering", &self.ordering)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("eager_loading", &self.eager_loading)
            .field("today", &self.today)
            .finish()
    }
}

impl<T> MemoryQuery<T> {
    /// Keep only rows matching `predicate`, in addition to earlier filters.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    pub fn ordering(&self) -> impl Iterator<Item = (&'static str, SortOrder)> + '_ {
        self.ordering.iter().map(|(column, order)| (column.name, *order))
    }

    pub fn eager_loading(&self) -> bool {
        self.eager_loading
    }

    /// Day that `today` and `yesterday` criteria refer to.
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn matches(&self, row: &T) -> bool {
        self.predicates.iter().all(|p| p(row))
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        for (column, order) in &self.ordering {
            let ord = (column.compare)(a, b);
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl<T: Clone> BackingQuery for MemoryQuery<T> {
    type Entity = T;
    type Column = MemoryColumn<T>;

    fn disable_eager_loading(mut self) -> Self {
        self.eager_loading = false;
        self
    }

    fn reference_day(mut self, day: NaiveDate) -> Self {
        self.today = day;
        self
    }

    fn order_by(mut self, column: &MemoryColumn<T>, order: SortOrder) -> Self {
        self.ordering.push((column.clone(), order));
        self
    }

    fn clear_ordering(mut self) -> Self {
        self.ordering.clear();
        self
    }

    fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn fetch(self) -> Result<Vec<T>> {
        self.source.executions.fetch_add(1, AtomicOrdering::SeqCst);
        let rows = self.source.snapshot();

        let mut matched: Vec<&T> = rows.iter().filter(|row| self.matches(row)).collect();
        if !self.ordering.is_empty() {
            matched.sort_by(|a, b| self.compare(a, b));
        }

        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = self
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(skip).take(take).cloned().collect())
    }

    fn count(self) -> Result<u64> {
        self.source.executions.fetch_add(1, AtomicOrdering::SeqCst);
        let rows = self.source.snapshot();
        Ok(rows.iter().filter(|row| self.matches(row)).count() as u64)
    }
}
