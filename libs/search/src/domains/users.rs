use super::{filter_map, sort_columns};
use crate::memory::filters::{date_filter, normalize_text, text_filter};
use crate::memory::{MemoryCollection, MemoryColumn, MemoryQuery};
use crate::search_config::{CriterionFilter, FilterMap, FlagFilter, SearchConfig, SortColumns};
use crate::tokens::SortOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub rank: String,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub last_login_time: Option<DateTime<Utc>>,
}

pub type UserQuery = MemoryQuery<User>;

/// Public view of a user. The email address is never exposed.
pub fn serialize_user(user: &User) -> Value {
    json!({
        "name": user.name,
        "rank": user.rank,
        "creationTime": user.creation_time,
        "lastLoginTime": user.last_login_time,
    })
}

pub struct UserSearchConfig {
    users: Arc<MemoryCollection<User>>,
    anonymous: CriterionFilter<UserQuery>,
    named: FilterMap<CriterionFilter<UserQuery>>,
    special: FilterMap<FlagFilter<UserQuery>>,
    sorts: SortColumns<MemoryColumn<User>>,
}

impl UserSearchConfig {
    pub fn new(users: Arc<MemoryCollection<User>>) -> Self {
        let name = MemoryColumn::by_key("name", |u: &User| normalize_text(&u.name));
        let rank = MemoryColumn::by_key("rank", |u: &User| u.rank.clone());
        let created = MemoryColumn::by_key("creation_time", |u: &User| u.creation_time);
        let last_login = MemoryColumn::by_key("last_login_time", |u: &User| u.last_login_time);

        Self {
            users,
            anonymous: text_filter(|u: &User| u.name.as_str()),
            named: filter_map([
                ("name", text_filter(|u: &User| u.name.as_str())),
                ("rank", text_filter(|u: &User| u.rank.as_str())),
                ("creation-date", date_filter(|u: &User| Some(u.creation_time))),
                ("creation-time", date_filter(|u: &User| Some(u.creation_time))),
                ("last-login-date", date_filter(|u: &User| u.last_login_time)),
                ("last-login-time", date_filter(|u: &User| u.last_login_time)),
            ]),
            special: FilterMap::new(),
            sorts: sort_columns([
                ("name", name, SortOrder::Ascending),
                ("rank", rank, SortOrder::Ascending),
                ("creation-date", created.clone(), SortOrder::Descending),
                ("creation-time", created, SortOrder::Descending),
                ("last-login-date", last_login.clone(), SortOrder::Descending),
                ("last-login-time", last_login, SortOrder::Descending),
            ]),
        }
    }
}

impl SearchConfig for UserSearchConfig {
    type Query = UserQuery;

    fn domain(&self) -> &str {
        "user"
    }

    fn create_filter_query(&self) -> UserQuery {
        self.users.query()
    }

    fn create_count_query(&self) -> UserQuery {
        self.users.query()
    }

    fn anonymous_filter(&self) -> Option<&CriterionFilter<UserQuery>> {
        Some(&self.anonymous)
    }

    fn named_filters(&self) -> &FilterMap<CriterionFilter<UserQuery>> {
        &self.named
    }

    fn special_filters(&self) -> &FilterMap<FlagFilter<UserQuery>> {
        &self.special
    }

    fn sort_columns(&self) -> &SortColumns<MemoryColumn<User>> {
        &self.sorts
    }
}
