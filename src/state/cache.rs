//! Entity cache
//!
//! Holds the three independently fetched collections: event pages keyed by
//! filter, and the bookmark set and registration list keyed by user. The
//! store is an explicit object constructed per engine; reads are public while
//! writes are crate-private and only issued by the fetch orchestrator and the
//! mutation coordinator.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::models::{Event, FeedFilter, Registration};

/// A fetched, possibly multi-page, list of events for one filter
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// The last page returned fewer items than the page size
    pub exhausted: bool,
    pub fetched_at: Instant,
    pub stale: bool,
}

/// A collection scoped to one user
#[derive(Debug, Clone)]
pub struct UserScoped<T> {
    pub user_id: String,
    pub value: T,
}

/// Category of a fetch failure shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    /// Backend unreachable or not ready; manual retry makes sense
    Transient,
    Rejected,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedFault {
    pub kind: FaultKind,
    pub message: String,
}

/// Observable loading/error flags of the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub active: FeedFilter,
    pub loading: bool,
    pub loading_more: bool,
    pub exhausted: bool,
    pub item_count: usize,
    pub fault: Option<FeedFault>,
}

#[derive(Debug)]
pub struct EntityCache {
    pages: HashMap<FeedFilter, EventPage>,
    active: FeedFilter,
    session_user: Option<String>,
    bookmarks: Option<UserScoped<HashSet<String>>>,
    /// The bookmark set was merged from a server listing at least once
    bookmarks_loaded: bool,
    registrations: Option<UserScoped<Vec<Registration>>>,
    details: HashMap<String, Event>,
    pending_bookmarks: HashSet<String>,
    joining: HashSet<String>,
    loading: HashSet<FeedFilter>,
    loading_more: HashSet<FeedFilter>,
    fault: Option<FeedFault>,
    stale_after: Duration,
}

impl EntityCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            pages: HashMap::new(),
            active: FeedFilter::default(),
            session_user: None,
            bookmarks: None,
            bookmarks_loaded: false,
            registrations: None,
            details: HashMap::new(),
            pending_bookmarks: HashSet::new(),
            joining: HashSet::new(),
            loading: HashSet::new(),
            loading_more: HashSet::new(),
            fault: None,
            stale_after,
        }
    }

    // ---- reads ----

    pub fn active_filter(&self) -> &FeedFilter {
        &self.active
    }

    pub fn is_active(&self, filter: &FeedFilter) -> bool {
        &self.active == filter
    }

    /// User whose bookmarks and registrations the cache currently tracks
    pub fn session_user(&self) -> Option<&str> {
        self.session_user.as_deref()
    }

    pub fn page(&self, filter: &FeedFilter) -> Option<&EventPage> {
        self.pages.get(filter)
    }

    /// Events of the active filter; empty while the first page is still loading
    pub fn active_events(&self) -> &[Event] {
        self.pages
            .get(&self.active)
            .map(|page| page.events.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_event(&self, event_id: &str) -> Option<&Event> {
        self.details.get(event_id).or_else(|| {
            self.pages
                .get(&self.active)
                .and_then(|page| page.events.iter().find(|e| e.id == event_id))
                .or_else(|| {
                    self.pages
                        .values()
                        .flat_map(|page| page.events.iter())
                        .find(|e| e.id == event_id)
                })
        })
    }

    pub fn detail(&self, event_id: &str) -> Option<&Event> {
        self.details.get(event_id)
    }

    /// Whether the page for `filter` can be served without a request
    pub fn is_fresh(&self, filter: &FeedFilter, now: Instant) -> bool {
        self.pages
            .get(filter)
            .map(|page| !page.stale && now.saturating_duration_since(page.fetched_at) < self.stale_after)
            .unwrap_or(false)
    }

    pub fn bookmarks_for(&self, user_id: &str) -> Option<&HashSet<String>> {
        self.bookmarks
            .as_ref()
            .filter(|scoped| scoped.user_id == user_id)
            .map(|scoped| &scoped.value)
    }

    /// Whether `user_id`'s bookmark set came from the server, as opposed to
    /// only holding optimistic toggles
    pub fn has_loaded_bookmarks(&self, user_id: &str) -> bool {
        self.bookmarks_loaded && self.bookmarks_for(user_id).is_some()
    }

    pub fn is_bookmarked(&self, user_id: &str, event_id: &str) -> bool {
        self.bookmarks_for(user_id)
            .map(|ids| ids.contains(event_id))
            .unwrap_or(false)
    }

    pub fn registrations_for(&self, user_id: &str) -> Option<&[Registration]> {
        self.registrations
            .as_ref()
            .filter(|scoped| scoped.user_id == user_id)
            .map(|scoped| scoped.value.as_slice())
    }

    pub fn is_bookmark_pending(&self, event_id: &str) -> bool {
        self.pending_bookmarks.contains(event_id)
    }

    pub fn is_joining(&self, event_id: &str) -> bool {
        self.joining.contains(event_id)
    }

    pub fn status(&self) -> FeedStatus {
        let page = self.pages.get(&self.active);
        FeedStatus {
            active: self.active.clone(),
            loading: self.loading.contains(&self.active),
            loading_more: self.loading_more.contains(&self.active),
            exhausted: page.map(|p| p.exhausted).unwrap_or(false),
            item_count: page.map(|p| p.events.len()).unwrap_or(0),
            fault: self.fault.clone(),
        }
    }

    // ---- writes: fetch orchestrator ----

    pub(crate) fn set_active(&mut self, filter: FeedFilter) {
        self.active = filter;
        self.fault = None;
    }

    pub(crate) fn set_loading(&mut self, filter: &FeedFilter, loading: bool) {
        toggle_membership(&mut self.loading, filter, loading);
    }

    pub(crate) fn set_loading_more(&mut self, filter: &FeedFilter, loading_more: bool) {
        toggle_membership(&mut self.loading_more, filter, loading_more);
    }

    pub(crate) fn set_fault(&mut self, fault: Option<FeedFault>) {
        self.fault = fault;
    }

    /// Replace the page for `filter` with a fresh first page
    pub(crate) fn store_first_page(
        &mut self,
        filter: FeedFilter,
        events: Vec<Event>,
        page_size: usize,
        now: Instant,
    ) {
        let exhausted = events.len() < page_size;
        debug!(filter = %filter, count = events.len(), exhausted = exhausted, "Storing first page");
        self.pages.insert(
            filter,
            EventPage {
                events: dedup_by_id(events),
                exhausted,
                fetched_at: now,
                stale: false,
            },
        );
    }

    /// Append a follow-up page fetched at `offset`.
    ///
    /// Returns false when the cached page no longer has `offset` items, meaning
    /// the response belongs to a superseded load.
    pub(crate) fn append_page(
        &mut self,
        filter: &FeedFilter,
        offset: usize,
        events: Vec<Event>,
        page_size: usize,
    ) -> bool {
        let Some(page) = self.pages.get_mut(filter) else {
            return false;
        };
        if page.events.len() != offset {
            return false;
        }

        page.exhausted = events.len() < page_size;
        let mut seen: HashSet<String> = page.events.iter().map(|e| e.id.clone()).collect();
        for event in events {
            if seen.insert(event.id.clone()) {
                page.events.push(event);
            }
        }
        true
    }

    pub(crate) fn mark_pages_stale(&mut self) {
        for page in self.pages.values_mut() {
            page.stale = true;
        }
    }

    pub(crate) fn store_detail(&mut self, event: Event) {
        self.details.insert(event.id.clone(), event);
    }

    /// Replace the bookmark set with a fetched one, keeping the local membership
    /// of ids whose toggle has not settled yet
    pub(crate) fn merge_fetched_bookmarks(&mut self, user_id: &str, fetched: Vec<String>) {
        let mut ids: HashSet<String> = fetched.into_iter().collect();
        if let Some(current) = self.bookmarks_for(user_id) {
            for pending in &self.pending_bookmarks {
                if current.contains(pending) {
                    ids.insert(pending.clone());
                } else {
                    ids.remove(pending);
                }
            }
        }
        self.bookmarks = Some(UserScoped {
            user_id: user_id.to_string(),
            value: ids,
        });
        self.bookmarks_loaded = true;
    }

    pub(crate) fn store_registrations(&mut self, user_id: &str, registrations: Vec<Registration>) {
        self.registrations = Some(UserScoped {
            user_id: user_id.to_string(),
            value: registrations,
        });
    }

    /// Switch the tracked user. Returns true and drops every user-scoped
    /// collection when the user actually changed.
    pub(crate) fn set_session_user(&mut self, user_id: Option<String>) -> bool {
        if self.session_user == user_id {
            return false;
        }
        debug!(user = ?user_id, "Switching session user");
        self.session_user = user_id;
        self.clear_user_state();
        true
    }

    /// Drop every user-scoped collection
    pub(crate) fn clear_user_state(&mut self) {
        self.bookmarks = None;
        self.bookmarks_loaded = false;
        self.registrations = None;
        self.details.clear();
        self.pending_bookmarks.clear();
        self.joining.clear();
    }

    // ---- writes: mutation coordinator ----

    /// Set membership of `event_id`, returning the previous membership
    pub(crate) fn set_bookmarked(&mut self, user_id: &str, event_id: &str, bookmarked: bool) -> bool {
        let scoped = self.bookmarks.get_or_insert_with(|| UserScoped {
            user_id: user_id.to_string(),
            value: HashSet::new(),
        });
        if scoped.user_id != user_id {
            *scoped = UserScoped {
                user_id: user_id.to_string(),
                value: HashSet::new(),
            };
            self.bookmarks_loaded = false;
        }

        let previous = scoped.value.contains(event_id);
        if bookmarked {
            scoped.value.insert(event_id.to_string());
        } else {
            scoped.value.remove(event_id);
        }
        previous
    }

    pub(crate) fn set_bookmark_pending(&mut self, event_id: &str, pending: bool) {
        if pending {
            self.pending_bookmarks.insert(event_id.to_string());
        } else {
            self.pending_bookmarks.remove(event_id);
        }
    }

    pub(crate) fn set_joining(&mut self, event_id: &str, joining: bool) {
        if joining {
            self.joining.insert(event_id.to_string());
        } else {
            self.joining.remove(event_id);
        }
    }

    /// Insert a confirmed registration, replacing any record for the same
    /// (event, user) pair
    pub(crate) fn upsert_registration(&mut self, registration: Registration) {
        let user_id = registration.user_id.clone();
        let scoped = self.registrations.get_or_insert_with(|| UserScoped {
            user_id: user_id.clone(),
            value: Vec::new(),
        });
        if scoped.user_id != user_id {
            return;
        }
        scoped
            .value
            .retain(|r| !(r.event_id == registration.event_id && r.user_id == registration.user_id));
        scoped.value.push(registration);
    }
}

fn toggle_membership(set: &mut HashSet<FeedFilter>, filter: &FeedFilter, present: bool) {
    if present {
        set.insert(filter.clone());
    } else {
        set.remove(filter);
    }
}

fn dedup_by_id(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect()
}

/// Shared handle to the entity cache that publishes status on every write
#[derive(Debug)]
pub struct EntityStore {
    cache: RwLock<EntityCache>,
    status_tx: watch::Sender<FeedStatus>,
}

impl EntityStore {
    pub fn new(stale_after: Duration) -> Self {
        let cache = EntityCache::new(stale_after);
        let (status_tx, _) = watch::channel(cache.status());
        Self {
            cache: RwLock::new(cache),
            status_tx,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, EntityCache> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access, then publish the resulting status.
    /// The lock is never held across a suspension point.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut EntityCache) -> R) -> R {
        let (result, status) = {
            let mut guard: RwLockWriteGuard<'_, EntityCache> =
                self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            let result = f(&mut guard);
            (result, guard.status())
        };
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
        result
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedStatus> {
        self.status_tx.subscribe()
    }
}
