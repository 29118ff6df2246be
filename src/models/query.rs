//! Feed filter and query key model

use serde::{Deserialize, Serialize};

use super::event::EventStatus;

/// Category value meaning "no category restriction"
pub const ALL_CATEGORIES: &str = "All";

/// The active filter set of the feed, in canonical form.
///
/// Two filters that compare equal always produce interchangeable fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedFilter {
    pub status: EventStatus,
    pub category: String,
    /// Empty means anywhere
    pub location: String,
    pub search: String,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            status: EventStatus::Upcoming,
            category: ALL_CATEGORIES.to_string(),
            location: String::new(),
            search: String::new(),
        }
    }
}

impl FeedFilter {
    pub fn new(
        status: EventStatus,
        category: impl AsRef<str>,
        location: impl AsRef<str>,
        search: impl AsRef<str>,
    ) -> Self {
        Self {
            status,
            category: canonical_category(category.as_ref()),
            location: canonical_location(location.as_ref()),
            search: canonical_search(search.as_ref()),
        }
    }

    pub fn category_param(&self) -> Option<&str> {
        (self.category != ALL_CATEGORIES).then_some(self.category.as_str())
    }

    pub fn location_param(&self) -> Option<&str> {
        (!self.location.is_empty()).then_some(self.location.as_str())
    }

    pub fn search_param(&self) -> Option<&str> {
        (!self.search.is_empty()).then_some(self.search.as_str())
    }
}

impl std::fmt::Display for FeedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{:?},{:?},{:?})",
            self.status, self.category, self.location, self.search
        )
    }
}

pub(crate) fn canonical_category(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_CATEGORIES) {
        ALL_CATEGORIES.to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn canonical_location(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(ALL_CATEGORIES) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn canonical_search(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identifies one page request: the filter plus the paging cursor (an offset)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub filter: FeedFilter,
    pub offset: usize,
}

impl QueryKey {
    pub fn first_page(filter: FeedFilter) -> Self {
        Self { filter, offset: 0 }
    }

    pub fn page_at(filter: FeedFilter, offset: usize) -> Self {
        Self { filter, offset }
    }

    pub fn is_first_page(&self) -> bool {
        self.offset == 0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.filter, self.offset)
    }
}
