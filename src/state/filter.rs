//! Filter controller
//!
//! Owns the applied filter state and turns discrete changes into canonical
//! query keys. Free-text search reaches it already debounced.

use serde::{Deserialize, Serialize};

use crate::models::query::{canonical_category, canonical_location, canonical_search};
use crate::models::{EventStatus, FeedFilter, QueryKey};

/// A single change to the feed filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterChange {
    Status(EventStatus),
    Category(String),
    Location(String),
    Search(String),
}

#[derive(Debug, Clone, Default)]
pub struct FilterController {
    filter: FeedFilter,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &FeedFilter {
        &self.filter
    }

    /// First-page key for the current filter
    pub fn query_key(&self) -> QueryKey {
        QueryKey::first_page(self.filter.clone())
    }

    /// Apply a change. Returns the new key only when the canonical filter changed.
    pub fn apply(&mut self, change: FilterChange) -> Option<QueryKey> {
        let mut next = self.filter.clone();
        match change {
            FilterChange::Status(status) => next.status = status,
            FilterChange::Category(category) => next.category = canonical_category(&category),
            FilterChange::Location(location) => next.location = canonical_location(&location),
            FilterChange::Search(search) => next.search = canonical_search(&search),
        }

        if next == self.filter {
            return None;
        }

        self.filter = next;
        Some(self.query_key())
    }
}
