//! Mutation coordinator
//!
//! Bookmark toggles and join requests run as command objects. Each command
//! applies its local change to the entity cache, calls the remote source, and
//! then either confirms with the server's answer or rolls back. Commands on
//! the same resource key are serialized in arrival order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{JoinEventRequest, Registration, Viewer};
use crate::services::source::RemoteEventSource;
use crate::state::{EntityCache, EntityStore};
use crate::utils::errors::{ApiError, ApiResult, Result, VolunteerHubError};
use crate::utils::logging;

/// Lifecycle of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Optimistic,
    Confirmed,
    RolledBack,
}

impl MutationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationState::Idle => "idle",
            MutationState::Optimistic => "optimistic",
            MutationState::Confirmed => "confirmed",
            MutationState::RolledBack => "rolled_back",
        }
    }

    pub fn can_transition_to(&self, next: MutationState) -> bool {
        matches!(
            (self, next),
            (MutationState::Idle, MutationState::Optimistic)
                | (MutationState::Optimistic, MutationState::Confirmed)
                | (MutationState::Optimistic, MutationState::RolledBack)
        )
    }
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local change that is confirmed or undone by a remote call
#[async_trait]
pub trait OptimisticCommand: Send + Sync + Debug {
    type Output: Send;

    fn kind(&self) -> &'static str;

    /// Commands sharing a key never interleave
    fn resource_key(&self) -> String;

    fn event_id(&self) -> &str;

    fn user_id(&self) -> &str;

    /// Refuse the command before anything changes
    fn check(&self, _cache: &EntityCache) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, cache: &mut EntityCache);

    async fn execute(&self, source: &dyn RemoteEventSource) -> ApiResult<Self::Output>;

    fn confirm(&self, cache: &mut EntityCache, output: &Self::Output);

    fn rollback(&self, cache: &mut EntityCache);

    /// Error returned to the caller when the remote call fails
    fn failure(&self, error: ApiError) -> VolunteerHubError;
}

/// A command together with its lifecycle state
#[derive(Debug)]
pub struct Mutation<C> {
    id: Uuid,
    command: C,
    state: MutationState,
}

impl<C: OptimisticCommand> Mutation<C> {
    pub fn new(command: C) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    fn transition(&mut self, next: MutationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(VolunteerHubError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        logging::log_mutation(
            self.command.kind(),
            self.command.event_id(),
            self.command.user_id(),
            next.as_str(),
        );
        Ok(())
    }

    pub fn apply(&mut self, cache: &mut EntityCache) -> Result<()> {
        self.command.check(cache)?;
        self.transition(MutationState::Optimistic)?;
        self.command.apply(cache);
        Ok(())
    }

    pub fn confirm(&mut self, cache: &mut EntityCache, output: &C::Output) -> Result<()> {
        self.transition(MutationState::Confirmed)?;
        self.command.confirm(cache, output);
        Ok(())
    }

    pub fn rollback(&mut self, cache: &mut EntityCache) -> Result<()> {
        self.transition(MutationState::RolledBack)?;
        self.command.rollback(cache);
        Ok(())
    }
}

/// Flip one event's bookmark membership for a user
#[derive(Debug, Clone)]
pub struct BookmarkToggle {
    user_id: String,
    event_id: String,
    previous: Option<bool>,
}

impl BookmarkToggle {
    pub fn new(user_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            event_id: event_id.into(),
            previous: None,
        }
    }
}

#[async_trait]
impl OptimisticCommand for BookmarkToggle {
    type Output = Vec<String>;

    fn kind(&self) -> &'static str {
        "bookmark_toggle"
    }

    fn resource_key(&self) -> String {
        format!("bookmark:{}", self.event_id)
    }

    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn check(&self, cache: &EntityCache) -> Result<()> {
        if cache.session_user() != Some(self.user_id.as_str()) {
            return Err(VolunteerHubError::NotSignedIn);
        }
        Ok(())
    }

    fn apply(&mut self, cache: &mut EntityCache) {
        let previous = cache.is_bookmarked(&self.user_id, &self.event_id);
        cache.set_bookmarked(&self.user_id, &self.event_id, !previous);
        cache.set_bookmark_pending(&self.event_id, true);
        self.previous = Some(previous);
    }

    async fn execute(&self, source: &dyn RemoteEventSource) -> ApiResult<Vec<String>> {
        source.toggle_bookmark(&self.user_id, &self.event_id).await
    }

    /// Adopt the server's membership for this event. A set that was never
    /// loaded takes the whole returned list, keeping other unsettled toggles.
    fn confirm(&self, cache: &mut EntityCache, ids: &Vec<String>) {
        cache.set_bookmark_pending(&self.event_id, false);
        if cache.session_user() != Some(self.user_id.as_str()) {
            return;
        }
        if cache.has_loaded_bookmarks(&self.user_id) {
            let bookmarked = ids.iter().any(|id| id == &self.event_id);
            cache.set_bookmarked(&self.user_id, &self.event_id, bookmarked);
        } else {
            cache.merge_fetched_bookmarks(&self.user_id, ids.clone());
        }
    }

    fn rollback(&self, cache: &mut EntityCache) {
        cache.set_bookmark_pending(&self.event_id, false);
        if let Some(previous) = self.previous {
            if cache.session_user() == Some(self.user_id.as_str()) {
                cache.set_bookmarked(&self.user_id, &self.event_id, previous);
            }
        }
    }

    fn failure(&self, error: ApiError) -> VolunteerHubError {
        VolunteerHubError::BookmarkFailed {
            event_id: self.event_id.clone(),
            reason: error
                .backend_detail()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        }
    }
}

/// Ask to join an event. Nothing is shown optimistically beyond the
/// submitting flag; the registration is inserted once the server assigns it.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    event_id: String,
    request: JoinEventRequest,
}

impl JoinRequest {
    pub fn new(event_id: impl Into<String>, viewer: &Viewer) -> Self {
        Self {
            event_id: event_id.into(),
            request: JoinEventRequest {
                user_id: viewer.user_id.clone(),
                user_name: viewer.join_name(),
                user_avatar: viewer.avatar_url.clone().unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
impl OptimisticCommand for JoinRequest {
    type Output = Registration;

    fn kind(&self) -> &'static str {
        "join_request"
    }

    fn resource_key(&self) -> String {
        format!("join:{}", self.event_id)
    }

    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn user_id(&self) -> &str {
        &self.request.user_id
    }

    fn check(&self, cache: &EntityCache) -> Result<()> {
        let event = cache
            .find_event(&self.event_id)
            .ok_or_else(|| VolunteerHubError::EventNotFound {
                event_id: self.event_id.clone(),
            })?;
        if event.is_full() {
            return Err(VolunteerHubError::FullCapacity {
                event_id: self.event_id.clone(),
            });
        }

        let already = cache
            .registrations_for(&self.request.user_id)
            .map(|list| list.iter().any(|r| r.event_id == self.event_id))
            .unwrap_or(false);
        if already {
            return Err(VolunteerHubError::AlreadyRegistered {
                event_id: self.event_id.clone(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, cache: &mut EntityCache) {
        cache.set_joining(&self.event_id, true);
    }

    async fn execute(&self, source: &dyn RemoteEventSource) -> ApiResult<Registration> {
        source.join_event(&self.event_id, &self.request).await
    }

    fn confirm(&self, cache: &mut EntityCache, registration: &Registration) {
        cache.set_joining(&self.event_id, false);
        cache.upsert_registration(registration.clone());
        // participant counts come back with the next event fetch
        cache.mark_pages_stale();
    }

    fn rollback(&self, cache: &mut EntityCache) {
        cache.set_joining(&self.event_id, false);
    }

    fn failure(&self, error: ApiError) -> VolunteerHubError {
        match error.backend_detail() {
            Some(detail) => VolunteerHubError::Rejected(detail.to_string()),
            None => VolunteerHubError::JoinFailed,
        }
    }
}

/// FIFO async locks keyed by resource
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn acquire_handle(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Forget the lock once nobody else holds or waits on it
    fn release_handle(&self, key: &str, handle: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference in the map, one in `handle`
        if Arc::strong_count(handle) == 2 {
            locks.remove(key);
        }
    }
}

/// Holds a key's lock handle and forgets it once the holder is gone,
/// whether the command settled or its caller went away
struct KeyLease<'a> {
    locks: &'a KeyedLocks,
    key: String,
    handle: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> KeyLease<'a> {
    fn acquire(locks: &'a KeyedLocks, key: String) -> Self {
        let handle = locks.acquire_handle(&key);
        Self { locks, key, handle }
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        self.locks.release_handle(&self.key, &self.handle);
    }
}

/// Rolls back a mutation that was applied but never settled, so an
/// abandoned call does not leave its optimistic state behind
struct Unsettled<'a, C: OptimisticCommand> {
    store: &'a EntityStore,
    mutation: Mutation<C>,
}

impl<C: OptimisticCommand> Drop for Unsettled<'_, C> {
    fn drop(&mut self) {
        if self.mutation.state() != MutationState::Optimistic {
            return;
        }
        warn!(
            mutation_id = %self.mutation.id,
            kind = self.mutation.command.kind(),
            event_id = self.mutation.command.event_id(),
            "Mutation abandoned before settling, rolling back"
        );
        let mutation = &mut self.mutation;
        if let Err(e) = self.store.write(|cache| mutation.rollback(cache)) {
            warn!(error = %e, "Rollback of abandoned mutation failed");
        }
    }
}

#[derive(Debug)]
pub struct MutationCoordinator {
    source: Arc<dyn RemoteEventSource>,
    store: Arc<EntityStore>,
    locks: KeyedLocks,
}

impl MutationCoordinator {
    pub fn new(source: Arc<dyn RemoteEventSource>, store: Arc<EntityStore>) -> Self {
        Self {
            source,
            store,
            locks: KeyedLocks::default(),
        }
    }

    /// Run `command` after every earlier command on the same key has settled
    pub async fn run<C: OptimisticCommand>(&self, command: C) -> Result<C::Output> {
        let lease = KeyLease::acquire(&self.locks, command.resource_key());
        let _permit = lease.handle.lock().await;
        self.run_locked(Mutation::new(command)).await
    }

    async fn run_locked<C: OptimisticCommand>(&self, mutation: Mutation<C>) -> Result<C::Output> {
        debug!(mutation_id = %mutation.id, kind = mutation.command.kind(), "Starting mutation");
        let mut unsettled = Unsettled {
            store: &self.store,
            mutation,
        };
        self.store.write(|cache| unsettled.mutation.apply(cache))?;

        let mutation = &mut unsettled.mutation;
        match mutation.command.execute(self.source.as_ref()).await {
            Ok(output) => {
                self.store.write(|cache| mutation.confirm(cache, &output))?;
                Ok(output)
            }
            Err(error) => {
                logging::log_api_error(mutation.command.kind(), &error.to_string(), Some(mutation.command.event_id()));
                self.store.write(|cache| mutation.rollback(cache))?;
                Err(mutation.command.failure(error))
            }
        }
    }

    /// Toggle a bookmark; returns whether the event ends up bookmarked
    pub async fn toggle_bookmark(&self, viewer: Option<&Viewer>, event_id: &str) -> Result<bool> {
        let viewer = viewer.ok_or(VolunteerHubError::NotSignedIn)?;
        let ids = self.run(BookmarkToggle::new(&viewer.user_id, event_id)).await?;
        Ok(ids.iter().any(|id| id == event_id))
    }

    /// Request to join an event as a participant
    pub async fn request_join(&self, viewer: Option<&Viewer>, event_id: &str) -> Result<Registration> {
        let viewer = viewer.ok_or(VolunteerHubError::NotSignedIn)?;
        if viewer.is_organizer() {
            return Err(VolunteerHubError::PermissionDenied(
                "Organizers cannot join events".to_string(),
            ));
        }
        self.run(JoinRequest::new(event_id, viewer)).await
    }
}
