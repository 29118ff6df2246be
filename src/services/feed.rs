//! Fetch orchestrator
//!
//! Issues event, bookmark and registration fetches against the remote source,
//! runs them through the retry policy and writes the results into the entity
//! cache. Responses for a filter that is no longer active are never shown.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{Event, FeedFilter, QueryKey, Viewer};
use crate::services::retry::{run_with_retry, RetryOutcome, RetryPolicy};
use crate::services::source::RemoteEventSource;
use crate::state::{EntityStore, FaultKind, FeedFault, Scheduler};
use crate::utils::errors::{ApiError, Result, VolunteerHubError};
use crate::utils::logging;

/// Shown when the backend does not answer, typically while it wakes up
pub const WAKE_UP_MESSAGE: &str =
    "The server is taking a moment to wake up. Please wait 30 seconds and refresh.";

pub const MALFORMED_MESSAGE: &str = "The server sent an unexpected response. Please try again later.";

/// What a fetch request ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FetchOutcome {
    /// Fresh results were written to the cache
    Loaded { count: usize },
    /// The cached page was fresh; no request was made
    Cached,
    /// Another filter became active before the response arrived
    Superseded,
    /// An identical request is already running
    AlreadyInFlight,
    /// No more pages for this filter
    Exhausted,
    /// The filter did not actually change
    Unchanged,
    Failed(FeedFault),
}

/// Map a final fetch error to what the user sees
pub fn fault_from(error: &ApiError) -> FeedFault {
    if error.is_transient() {
        return FeedFault {
            kind: FaultKind::Transient,
            message: WAKE_UP_MESSAGE.to_string(),
        };
    }
    match error {
        ApiError::InvalidResponse(_) => FeedFault {
            kind: FaultKind::Malformed,
            message: MALFORMED_MESSAGE.to_string(),
        },
        other => FeedFault {
            kind: FaultKind::Rejected,
            message: other.backend_detail().map(str::to_string).unwrap_or_else(|| other.to_string()),
        },
    }
}

/// Removes its key from the in-flight set when dropped
struct InFlight<'a> {
    keys: &'a Mutex<HashSet<QueryKey>>,
    key: QueryKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.remove(&self.key);
    }
}

#[derive(Debug)]
pub struct FeedOrchestrator {
    source: Arc<dyn RemoteEventSource>,
    store: Arc<EntityStore>,
    scheduler: Arc<dyn Scheduler>,
    policy: RetryPolicy,
    page_size: usize,
    in_flight: Mutex<HashSet<QueryKey>>,
}

impl FeedOrchestrator {
    pub fn new(
        source: Arc<dyn RemoteEventSource>,
        store: Arc<EntityStore>,
        scheduler: Arc<dyn Scheduler>,
        policy: RetryPolicy,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            scheduler,
            policy,
            page_size,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, key: QueryKey) -> Option<InFlight<'_>> {
        let mut keys = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keys.insert(key.clone()) {
            debug!(key = %key, "Request already in flight");
            return None;
        }
        Some(InFlight {
            keys: &self.in_flight,
            key,
        })
    }

    /// Make `filter` the active filter and make sure its first page is loaded
    pub async fn activate(&self, filter: FeedFilter, viewer: Option<&Viewer>) -> FetchOutcome {
        let now = self.scheduler.now();
        let fresh = self.store.write(|cache| {
            cache.set_active(filter.clone());
            cache.is_fresh(&filter, now)
        });

        if fresh {
            debug!(filter = %filter, "Serving cached page");
            if let Some(viewer) = viewer {
                self.sync_relations(viewer, false).await;
            }
            return FetchOutcome::Cached;
        }

        self.fetch_first_page(filter, viewer, false).await
    }

    /// Refetch the active filter and, for a signed-in viewer, both relations
    pub async fn refresh(&self, viewer: Option<&Viewer>) -> FetchOutcome {
        let filter = self.store.write(|cache| {
            cache.set_fault(None);
            cache.active_filter().clone()
        });
        info!(filter = %filter, "Refreshing feed");
        self.fetch_first_page(filter, viewer, true).await
    }

    async fn fetch_first_page(&self, filter: FeedFilter, viewer: Option<&Viewer>, force: bool) -> FetchOutcome {
        let Some(_guard) = self.claim(QueryKey::first_page(filter.clone())) else {
            return FetchOutcome::AlreadyInFlight;
        };

        self.store.write(|cache| cache.set_loading(&filter, true));
        let started = self.scheduler.now();

        let source = &self.source;
        let store = &self.store;
        let wanted = &filter;
        let limit = self.page_size;

        let events = run_with_retry(
            self.policy,
            self.scheduler.as_ref(),
            "list_events",
            || store.read().is_active(wanted),
            move || source.list_events(wanted, 0, limit),
        );
        let relations = async {
            if let Some(viewer) = viewer {
                self.sync_relations(viewer, force).await;
            }
        };
        let (events, ()) = futures::join!(events, relations);

        let now = self.scheduler.now();
        let outcome = match events {
            RetryOutcome::Succeeded(events) => {
                logging::log_fetch(&filter.to_string(), 0, events.len(), now.duration_since(started));
                self.store.write(|cache| {
                    let count = events.len();
                    let active = cache.is_active(&filter);
                    cache.store_first_page(filter.clone(), events, limit, now);
                    if active {
                        cache.set_fault(None);
                        FetchOutcome::Loaded { count }
                    } else {
                        FetchOutcome::Superseded
                    }
                })
            }
            RetryOutcome::Abandoned { attempts } => {
                debug!(filter = %filter, attempts = attempts, "Fetch abandoned for inactive filter");
                FetchOutcome::Superseded
            }
            RetryOutcome::Failed { error, attempts } => {
                let fault = fault_from(&error);
                warn!(filter = %filter, attempts = attempts, error = %error, "Event fetch failed");
                self.store.write(|cache| {
                    if cache.is_active(&filter) {
                        cache.set_fault(Some(fault.clone()));
                        FetchOutcome::Failed(fault)
                    } else {
                        FetchOutcome::Superseded
                    }
                })
            }
        };

        self.store.write(|cache| cache.set_loading(&filter, false));
        outcome
    }

    /// Fetch the next page of the active filter
    pub async fn load_more(&self) -> FetchOutcome {
        let (filter, offset, exhausted, loading) = {
            let cache = self.store.read();
            let filter = cache.active_filter().clone();
            match cache.page(&filter) {
                Some(page) => (filter, page.events.len(), page.exhausted, cache.status().loading),
                None => return FetchOutcome::Unchanged,
            }
        };

        if exhausted {
            return FetchOutcome::Exhausted;
        }
        if loading {
            return FetchOutcome::AlreadyInFlight;
        }
        let Some(_guard) = self.claim(QueryKey::page_at(filter.clone(), offset)) else {
            return FetchOutcome::AlreadyInFlight;
        };

        self.store.write(|cache| cache.set_loading_more(&filter, true));
        let started = self.scheduler.now();

        let source = &self.source;
        let store = &self.store;
        let wanted = &filter;
        let limit = self.page_size;

        let result = run_with_retry(
            self.policy,
            self.scheduler.as_ref(),
            "list_events",
            || store.read().is_active(wanted),
            move || source.list_events(wanted, offset, limit),
        )
        .await;

        let outcome = match result {
            RetryOutcome::Succeeded(events) => {
                let count = events.len();
                logging::log_fetch(&filter.to_string(), offset, count, self.scheduler.now().duration_since(started));
                self.store.write(|cache| {
                    if cache.is_active(&filter) && cache.append_page(&filter, offset, events, limit) {
                        FetchOutcome::Loaded { count }
                    } else {
                        FetchOutcome::Superseded
                    }
                })
            }
            RetryOutcome::Abandoned { .. } => FetchOutcome::Superseded,
            RetryOutcome::Failed { error, attempts } => {
                let fault = fault_from(&error);
                warn!(filter = %filter, offset = offset, attempts = attempts, error = %error, "Next page fetch failed");
                self.store.write(|cache| {
                    if cache.is_active(&filter) {
                        cache.set_fault(Some(fault.clone()));
                        FetchOutcome::Failed(fault)
                    } else {
                        FetchOutcome::Superseded
                    }
                })
            }
        };

        self.store.write(|cache| cache.set_loading_more(&filter, false));
        outcome
    }

    /// Load the viewer's bookmark set and registration list.
    ///
    /// Without `force`, each collection is only fetched when it is not cached
    /// for this user yet. Failures are logged and leave the previous value in
    /// place; the feed still renders without them.
    pub async fn sync_relations(&self, viewer: &Viewer, force: bool) {
        let user_id = viewer.user_id.as_str();
        let (need_bookmarks, need_registrations) = {
            let cache = self.store.read();
            (
                force || !cache.has_loaded_bookmarks(user_id),
                force || cache.registrations_for(user_id).is_none(),
            )
        };

        let source = &self.source;
        let store = &self.store;
        let still_signed_in = || store.read().session_user() == Some(user_id);

        let bookmarks = async {
            if !need_bookmarks {
                return None;
            }
            Some(
                run_with_retry(
                    self.policy,
                    self.scheduler.as_ref(),
                    "list_user_bookmarks",
                    still_signed_in,
                    move || source.list_user_bookmarks(user_id),
                )
                .await,
            )
        };
        let registrations = async {
            if !need_registrations {
                return None;
            }
            Some(
                run_with_retry(
                    self.policy,
                    self.scheduler.as_ref(),
                    "list_user_registrations",
                    still_signed_in,
                    move || source.list_user_registrations(user_id),
                )
                .await,
            )
        };
        let (bookmarks, registrations) = futures::join!(bookmarks, registrations);

        self.store.write(|cache| {
            if cache.session_user() != Some(user_id) {
                debug!(user = user_id, "Dropping relations for signed-out user");
                return;
            }
            match bookmarks {
                Some(RetryOutcome::Succeeded(ids)) => cache.merge_fetched_bookmarks(user_id, ids),
                Some(RetryOutcome::Failed { error, .. }) => {
                    warn!(user = user_id, error = %error, "Could not load bookmarks")
                }
                _ => {}
            }
            match registrations {
                Some(RetryOutcome::Succeeded(list)) => cache.store_registrations(user_id, list),
                Some(RetryOutcome::Failed { error, .. }) => {
                    warn!(user = user_id, error = %error, "Could not load registrations")
                }
                _ => {}
            }
        });
    }

    /// Fetch a single event and keep it in the detail cache
    pub async fn fetch_detail(&self, event_id: &str) -> Result<Event> {
        let source = &self.source;
        let outcome = run_with_retry(
            self.policy,
            self.scheduler.as_ref(),
            "get_event",
            || true,
            move || source.get_event(event_id),
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded(event) => {
                self.store.write(|cache| cache.store_detail(event.clone()));
                Ok(event)
            }
            RetryOutcome::Failed { error, .. } => match error {
                ApiError::Rejected { status: 404, .. } => Err(VolunteerHubError::EventNotFound {
                    event_id: event_id.to_string(),
                }),
                other => Err(other.into()),
            },
            RetryOutcome::Abandoned { .. } => Err(ApiError::ServiceUnavailable("request abandoned".to_string()).into()),
        }
    }
}
