use super::{filter_map, sort_columns};
use crate::memory::filters::{
    date_filter, flag_filter, normalize_text, number_filter, text_filter, text_list_filter,
};
use crate::memory::{MemoryCollection, MemoryColumn, MemoryQuery};
use crate::search_config::{CriterionFilter, FilterMap, FlagFilter, SearchConfig, SortColumns};
use crate::tokens::SortOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Primary name first, then aliases.
    pub names: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub usages: i64,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub implications: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Tag {
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }
}

pub type TagQuery = MemoryQuery<Tag>;

pub fn serialize_tag(tag: &Tag) -> Value {
    json!({
        "names": tag.names,
        "category": tag.category,
        "usages": tag.usages,
        "creationTime": tag.creation_time,
        "implications": tag.implications,
        "suggestions": tag.suggestions,
    })
}

pub struct TagSearchConfig {
    tags: Arc<MemoryCollection<Tag>>,
    anonymous: CriterionFilter<TagQuery>,
    named: FilterMap<CriterionFilter<TagQuery>>,
    special: FilterMap<FlagFilter<TagQuery>>,
    sorts: SortColumns<MemoryColumn<Tag>>,
}

impl TagSearchConfig {
    pub fn new(tags: Arc<MemoryCollection<Tag>>) -> Self {
        let name = MemoryColumn::by_key("name", |t: &Tag| normalize_text(t.primary_name()));
        let category = MemoryColumn::by_key("category", |t: &Tag| normalize_text(&t.category));
        let usages = MemoryColumn::by_key("usages", |t: &Tag| t.usages);
        let created = MemoryColumn::by_key("creation_time", |t: &Tag| t.creation_time);
        let implications = MemoryColumn::by_key("implications", |t: &Tag| t.implications.len());
        let suggestions = MemoryColumn::by_key("suggestions", |t: &Tag| t.suggestions.len());

        Self {
            tags,
            anonymous: text_list_filter(|t: &Tag| t.names.as_slice()),
            named: filter_map([
                ("name", text_list_filter(|t: &Tag| t.names.as_slice())),
                ("category", text_filter(|t: &Tag| t.category.as_str())),
                ("usages", number_filter(|t: &Tag| t.usages)),
                ("usage-count", number_filter(|t: &Tag| t.usages)),
                ("creation-date", date_filter(|t: &Tag| Some(t.creation_time))),
                ("creation-time", date_filter(|t: &Tag| Some(t.creation_time))),
                ("implication-count", number_filter(|t: &Tag| len_i64(&t.implications))),
                ("suggestion-count", number_filter(|t: &Tag| len_i64(&t.suggestions))),
            ]),
            special: filter_map([
                ("unused", flag_filter(|t: &Tag| t.usages == 0)),
                ("implied", flag_filter(|t: &Tag| !t.implications.is_empty())),
            ]),
            sorts: sort_columns([
                ("name", name, SortOrder::Ascending),
                ("category", category, SortOrder::Ascending),
                ("usages", usages.clone(), SortOrder::Descending),
                ("usage-count", usages, SortOrder::Descending),
                ("creation-date", created.clone(), SortOrder::Descending),
                ("creation-time", created, SortOrder::Descending),
                ("implication-count", implications, SortOrder::Descending),
                ("suggestion-count", suggestions, SortOrder::Descending),
            ]),
        }
    }
}

fn len_i64(items: &[String]) -> i64 {
    i64::try_from(items.len()).unwrap_or(i64::MAX)
}

impl SearchConfig for TagSearchConfig {
    type Query = TagQuery;

    fn domain(&self) -> &str {
        "tag"
    }

    fn create_filter_query(&self) -> TagQuery {
        self.tags.query()
    }

    fn create_count_query(&self) -> TagQuery {
        self.tags.query()
    }

    fn anonymous_filter(&self) -> Option<&CriterionFilter<TagQuery>> {
        Some(&self.anonymous)
    }

    fn named_filters(&self) -> &FilterMap<CriterionFilter<TagQuery>> {
        &self.named
    }

    fn special_filters(&self) -> &FilterMap<FlagFilter<TagQuery>> {
        &self.special
    }

    fn sort_columns(&self) -> &SortColumns<MemoryColumn<Tag>> {
        &self.sorts
    }
}
