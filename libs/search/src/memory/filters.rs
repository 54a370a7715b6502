//! Filter handlers over [`MemoryQuery`]
//!
//! Each builder takes a field accessor and returns a boxed handler ready to be
//! registered in a [`SearchConfig`](crate::search_config::SearchConfig).
//! Criteria are parsed when the handler runs, so a malformed value surfaces as
//! a search error instead of an empty result.

use super::MemoryQuery;
use crate::criteria::{matches_day, parse_day_range, parse_integer, Criterion};
use crate::search_config::{CriterionFilter, FlagFilter};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Fold case and strip combining marks (`"Éva"` -> `"eva"`).
pub fn normalize_text(input: &str) -> String {
    input
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[derive(Debug)]
enum Pattern {
    Exact(String),
    Wildcard(Regex),
}

impl Pattern {
    fn new(value: &str) -> Result<Self> {
        let value = normalize_text(value);
        if !value.contains('*') {
            return Ok(Pattern::Exact(value));
        }
        let body = value
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Regex::new(&format!("^{body}$"))
            .map(Pattern::Wildcard)
            .map_err(|e| Error::Search(format!("Invalid pattern {:?}: {}.", value, e)))
    }

    fn matches(&self, normalized: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == normalized,
            Pattern::Wildcard(re) => re.is_match(normalized),
        }
    }
}

/// Case- and diacritic-insensitive string matcher with `*` wildcards.
///
/// Arrays match when any alternative matches. Ranges are rejected.
#[derive(Debug)]
pub struct TextMatcher {
    patterns: Vec<Pattern>,
}

impl TextMatcher {
    pub fn new(criterion: &str) -> Result<Self> {
        let patterns = match Criterion::parse(criterion) {
            Criterion::Plain(value) => vec![Pattern::new(&value)?],
            Criterion::Array(values) => values
                .iter()
                .map(|v| Pattern::new(v))
                .collect::<Result<Vec<_>>>()?,
            Criterion::Range { .. } => {
                return Err(Error::Search(
                    "Ranged criterion is invalid in this context.".to_string(),
                ))
            }
        };
        Ok(Self { patterns })
    }

    pub fn matches(&self, value: &str) -> bool {
        let normalized = normalize_text(value);
        self.patterns.iter().any(|p| p.matches(&normalized))
    }
}

/// Match a single string field.
pub fn text_filter<T, F>(field: F) -> CriterionFilter<MemoryQuery<T>>
where
    T: 'static,
    F: Fn(&T) -> &str + Send + Sync + 'static,
{
    let field = Arc::new(field);
    Box::new(move |query: MemoryQuery<T>, criterion: &str, negated: bool| {
        let matcher = TextMatcher::new(criterion)?;
        let field = Arc::clone(&field);
        Ok(query.filter(move |row| matcher.matches(field(row)) != negated))
    })
}

/// Match when any string of a list field matches.
pub fn text_list_filter<T, F>(field: F) -> CriterionFilter<MemoryQuery<T>>
where
    T: 'static,
    F: Fn(&T) -> &[String] + Send + Sync + 'static,
{
    let field = Arc::new(field);
    Box::new(move |query: MemoryQuery<T>, criterion: &str, negated: bool| {
        let matcher = TextMatcher::new(criterion)?;
        let field = Arc::clone(&field);
        Ok(query.filter(move |row| {
            field(row).iter().any(|value| matcher.matches(value)) != negated
        }))
    })
}

/// Match an integer field. Plain, range and array criteria are supported.
pub fn number_filter<T, F>(field: F) -> CriterionFilter<MemoryQuery<T>>
where
    T: 'static,
    F: Fn(&T) -> i64 + Send + Sync + 'static,
{
    let field = Arc::new(field);
    Box::new(move |query: MemoryQuery<T>, criterion: &str, negated: bool| {
        let criterion = Criterion::parse(criterion).try_map(parse_integer)?;
        let field = Arc::clone(&field);
        Ok(query.filter(move |row| criterion.matches(&field(row)) != negated))
    })
}

/// Match a timestamp field by the calendar days a criterion covers.
///
/// `today` and `yesterday` resolve against the query's reference day. Rows
/// without a timestamp never match a positive criterion.
pub fn date_filter<T, F>(field: F) -> CriterionFilter<MemoryQuery<T>>
where
    T: 'static,
    F: Fn(&T) -> Option<DateTime<Utc>> + Send + Sync + 'static,
{
    let field = Arc::new(field);
    Box::new(move |query: MemoryQuery<T>, criterion: &str, negated: bool| {
        let today = query.today();
        let criterion = Criterion::parse(criterion).try_map(|v| parse_day_range(&v, today))?;
        let field = Arc::clone(&field);
        Ok(query.filter(move |row| {
            let hit = field(row).map_or(false, |t| matches_day(&criterion, t.date_naive()));
            hit != negated
        }))
    })
}

/// Special token handler keeping rows for which `predicate` holds.
pub fn flag_filter<T, F>(predicate: F) -> FlagFilter<MemoryQuery<T>>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    Box::new(move |query: MemoryQuery<T>, negated: bool| {
        let predicate = Arc::clone(&predicate);
        Ok(query.filter(move |row| predicate(row) != negated))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCollection;
    use crate::query::BackingQuery;
    use chrono::{NaiveDate, TimeZone};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        aliases: Vec<String>,
        score: i64,
        seen: Option<DateTime<Utc>>,
    }

    fn row(name: &'static str, score: i64, seen: Option<(i32, u32, u32)>) -> Row {
        Row {
            name,
            aliases: vec![format!("{name}_alias")],
            score,
            seen: seen.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
        }
    }

    fn names(rows: Vec<Row>) -> Vec<&'static str> {
        rows.into_iter().map(|r| r.name).collect()
    }

    fn rows() -> Arc<MemoryCollection<Row>> {
        MemoryCollection::new(vec![
            row("Émile", 3, Some((2015, 6, 1))),
            row("emma", 10, Some((2016, 2, 29))),
            row("bob", 0, None),
        ])
    }

    #[test]
    fn normalization_folds_case_and_diacritics() {
        assert_eq!(normalize_text("  Émile "), "emile");
        assert_eq!(normalize_text("ŁÓDŹ"), "łodz");
    }

    #[test]
    fn text_matching_with_wildcards_and_arrays() {
        let filter = text_filter(|r: &Row| r.name);
        let source = rows();

        let got = filter(source.query(), "EMILE", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile"]);

        let got = filter(source.query(), "em*", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile", "emma"]);

        let got = filter(source.query(), "bob,emma", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["emma", "bob"]);

        let got = filter(source.query(), "em*", true).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["bob"]);

        // regex metacharacters are literal
        let got = filter(source.query(), "b.*", false).unwrap().fetch().unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn text_ranges_are_rejected() {
        let filter = text_filter(|r: &Row| r.name);
        let err = filter(rows().query(), "a..b", false).unwrap_err();
        assert!(matches!(err, Error::Search(msg) if msg.contains("Ranged criterion")));
    }

    #[test]
    fn list_matching_uses_any_element() {
        let filter = text_list_filter(|r: &Row| r.aliases.as_slice());
        let got = filter(rows().query(), "*_alias", false).unwrap().fetch().unwrap();
        assert_eq!(got.len(), 3);
        let got = filter(rows().query(), "bob_alias", true).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile", "emma"]);
    }

    #[test]
    fn number_matching() {
        let filter = number_filter(|r: &Row| r.score);
        let got = filter(rows().query(), "1..10", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile", "emma"]);
        let got = filter(rows().query(), "..0", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["bob"]);
        assert!(filter(rows().query(), "many", false).is_err());
    }

    #[test]
    fn date_matching() {
        let filter = date_filter(|r: &Row| r.seen);
        let got = filter(rows().query(), "2016", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["emma"]);
        let got = filter(rows().query(), "2015-06..2016-02", false)
            .unwrap()
            .fetch()
            .unwrap();
        assert_eq!(names(got), vec!["Émile", "emma"]);
        let got = filter(rows().query(), "2016", true).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile", "bob"]);
        assert!(filter(rows().query(), "last-week", false).is_err());
    }

    #[test]
    fn relative_days_follow_the_reference_day() {
        let filter = date_filter(|r: &Row| r.seen);
        let query = |day: (i32, u32, u32)| {
            rows()
                .query()
                .reference_day(NaiveDate::from_ymd_opt(day.0, day.1, day.2).unwrap())
        };

        let got = filter(query((2016, 2, 29)), "today", false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["emma"]);
        let got = filter(query((2016, 3, 1)), "yesterday", false)
            .unwrap()
            .fetch()
            .unwrap();
        assert_eq!(names(got), vec!["emma"]);
        let got = filter(query((2016, 3, 1)), "today", false).unwrap().fetch().unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn flag_matching() {
        let filter = flag_filter(|r: &Row| r.score == 0);
        let got = filter(rows().query(), false).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["bob"]);
        let got = filter(rows().query(), true).unwrap().fetch().unwrap();
        assert_eq!(names(got), vec!["Émile", "emma"]);
    }
}
