//! Feed engine
//!
//! The surface the presentation layer talks to. It wires the filter
//! controller, fetch orchestrator, mutation coordinator and organizer desk
//! around one entity store, and projects the cached state for the current
//! viewer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{FeedConfig, RetryConfig, Settings};
use crate::models::{Event, EventStatus, FeedFilter, Registration, RegistrationStatus, Viewer};
use crate::services::engagement::{project_cache, EngagementView};
use crate::services::feed::{FeedOrchestrator, FetchOutcome};
use crate::services::mutation::MutationCoordinator;
use crate::services::organizer::OrganizerDesk;
use crate::services::retry::RetryPolicy;
use crate::services::source::RemoteEventSource;
use crate::state::{debounced, EntityStore, FeedStatus, FilterChange, FilterController, Scheduler, TokioScheduler};
use crate::utils::errors::Result;

#[derive(Debug)]
struct EngineInner {
    store: Arc<EntityStore>,
    filters: Mutex<FilterController>,
    viewer: RwLock<Option<Viewer>>,
    orchestrator: FeedOrchestrator,
    mutations: MutationCoordinator,
    desk: OrganizerDesk,
    feed_config: FeedConfig,
}

/// Cheap to clone; clones share the same cache and in-flight state
#[derive(Debug, Clone)]
pub struct FeedEngine {
    inner: Arc<EngineInner>,
}

impl FeedEngine {
    pub fn new(source: Arc<dyn RemoteEventSource>, settings: &Settings) -> Self {
        Self::with_scheduler(
            source,
            settings.feed.clone(),
            settings.retry.clone(),
            Arc::new(TokioScheduler),
        )
    }

    pub fn with_scheduler(
        source: Arc<dyn RemoteEventSource>,
        feed_config: FeedConfig,
        retry_config: RetryConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let store = Arc::new(EntityStore::new(feed_config.stale_after()));
        let orchestrator = FeedOrchestrator::new(
            source.clone(),
            store.clone(),
            scheduler,
            RetryPolicy::from_config(&retry_config),
            feed_config.page_size,
        );
        let mutations = MutationCoordinator::new(source.clone(), store.clone());
        let desk = OrganizerDesk::new(source, store.clone());

        Self {
            inner: Arc::new(EngineInner {
                store,
                filters: Mutex::new(FilterController::new()),
                viewer: RwLock::new(None),
                orchestrator,
                mutations,
                desk,
                feed_config,
            }),
        }
    }

    // ---- session ----

    /// Sign a viewer in or out. Switching users drops the previous user's
    /// bookmarks and registrations and loads the new user's.
    pub async fn set_viewer(&self, viewer: Option<Viewer>) {
        let user_id = viewer.as_ref().map(|v| v.user_id.clone());
        let changed = self.inner.store.write(|cache| cache.set_session_user(user_id));
        {
            let mut current = self.inner.viewer.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = viewer.clone();
        }

        if changed {
            info!(user = ?viewer.as_ref().map(|v| v.user_id.as_str()), "Viewer changed");
            if let Some(viewer) = viewer {
                self.inner.orchestrator.sync_relations(&viewer, false).await;
            }
        }
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.inner
            .viewer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // ---- feed ----

    pub fn current_filter(&self) -> FeedFilter {
        self.filters().current().clone()
    }

    fn filters(&self) -> std::sync::MutexGuard<'_, FilterController> {
        self.inner.filters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the first page for the current filter
    pub async fn start(&self) -> FetchOutcome {
        let filter = self.current_filter();
        self.activate(filter).await
    }

    async fn activate(&self, filter: FeedFilter) -> FetchOutcome {
        let viewer = self.viewer();
        self.inner.orchestrator.activate(filter, viewer.as_ref()).await
    }

    fn apply_filter(&self, change: FilterChange) -> Option<FeedFilter> {
        self.filters().apply(change).map(|key| key.filter)
    }

    /// Apply a filter change immediately. Search text should normally arrive
    /// through [`FeedEngine::follow_search`] so that it is debounced.
    pub async fn change_filter(&self, change: FilterChange) -> FetchOutcome {
        match self.apply_filter(change) {
            Some(filter) => self.activate(filter).await,
            None => FetchOutcome::Unchanged,
        }
    }

    /// Feed raw search input; a query is issued only once the input has been
    /// quiet for the configured window. Returns when `input` ends.
    pub async fn follow_search<S>(&self, input: S)
    where
        S: Stream<Item = String> + Send,
    {
        let settled = debounced(input, self.inner.feed_config.search_debounce());
        let mut settled = std::pin::pin!(settled);

        while let Some(text) = settled.next().await {
            debug!(search = %text, "Search input settled");
            if let Some(filter) = self.apply_filter(FilterChange::Search(text)) {
                let engine = self.clone();
                tokio::spawn(async move {
                    engine.activate(filter).await;
                });
            }
        }
    }

    pub async fn load_more(&self) -> FetchOutcome {
        self.inner.orchestrator.load_more().await
    }

    /// Manual retry after a persistent fault; refetches everything
    pub async fn retry(&self) -> FetchOutcome {
        self.refresh().await
    }

    pub async fn refresh(&self) -> FetchOutcome {
        let viewer = self.viewer();
        self.inner.orchestrator.refresh(viewer.as_ref()).await
    }

    // ---- mutations ----

    /// Returns whether the event ends up bookmarked
    pub async fn toggle_bookmark(&self, event_id: &str) -> Result<bool> {
        let viewer = self.viewer();
        self.inner.mutations.toggle_bookmark(viewer.as_ref(), event_id).await
    }

    /// Request to join; on success the active page is refetched so the
    /// participant count comes from the backend
    pub async fn request_join(&self, event_id: &str) -> Result<Registration> {
        let viewer = self.viewer();
        let registration = self.inner.mutations.request_join(viewer.as_ref(), event_id).await?;
        self.refresh().await;
        Ok(registration)
    }

    // ---- details ----

    pub async fn event_details(&self, event_id: &str) -> Result<Event> {
        self.inner.orchestrator.fetch_detail(event_id).await
    }

    /// Best cached copy of an event, available before details are fetched
    pub fn event_preview(&self, event_id: &str) -> Option<Event> {
        self.inner.store.read().find_event(event_id).cloned()
    }

    // ---- reads ----

    /// Projected view of the active page for the current viewer
    pub fn feed(&self) -> Vec<EngagementView> {
        let viewer = self.viewer();
        let cache = self.inner.store.read();
        project_cache(&cache, viewer.as_ref(), self.inner.feed_config.hide_full_events)
    }

    pub fn status(&self) -> FeedStatus {
        self.inner.store.read().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedStatus> {
        self.inner.store.subscribe()
    }

    pub fn is_bookmarked(&self, event_id: &str) -> bool {
        match self.viewer() {
            Some(viewer) => self.inner.store.read().is_bookmarked(&viewer.user_id, event_id),
            None => false,
        }
    }

    /// The viewer's bookmark set as currently cached
    pub fn bookmarks(&self) -> HashSet<String> {
        let Some(viewer) = self.viewer() else {
            return HashSet::new();
        };
        self.inner
            .store
            .read()
            .bookmarks_for(&viewer.user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        let Some(viewer) = self.viewer() else {
            return Vec::new();
        };
        self.inner
            .store
            .read()
            .registrations_for(&viewer.user_id)
            .map(<[Registration]>::to_vec)
            .unwrap_or_default()
    }

    // ---- organizer ----

    pub async fn participants(&self, event_id: &str) -> Result<Vec<Registration>> {
        let viewer = self.viewer();
        self.inner.desk.participants(viewer.as_ref(), event_id).await
    }

    pub async fn review_registration(
        &self,
        registration: &Registration,
        decision: RegistrationStatus,
    ) -> Result<Registration> {
        let viewer = self.viewer();
        let updated = self
            .inner
            .desk
            .review(viewer.as_ref(), registration, decision)
            .await?;
        self.refresh().await;
        Ok(updated)
    }

    pub async fn set_event_status(&self, event_id: &str, status: EventStatus) -> Result<Event> {
        let viewer = self.viewer();
        let event = self
            .inner
            .desk
            .set_event_status(viewer.as_ref(), event_id, status)
            .await?;
        self.refresh().await;
        Ok(event)
    }
}
