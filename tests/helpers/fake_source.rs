//! In-memory event backend for engine tests
//!
//! Keeps events, bookmarks and registrations in memory, records every call,
//! and can be scripted to fail or to answer slowly. Latency is taken from
//! Tokio's clock, so tests running with paused time stay instant.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use VolunteerHub::models::{
    Event, EventStatus, FeedFilter, JoinEventRequest, Registration, RegistrationStatus,
};
use VolunteerHub::services::RemoteEventSource;
use VolunteerHub::utils::errors::{ApiError, ApiResult};

pub const LIST_EVENTS: &str = "list_events";
pub const GET_EVENT: &str = "get_event";
pub const LIST_BOOKMARKS: &str = "list_user_bookmarks";
pub const TOGGLE_BOOKMARK: &str = "toggle_bookmark";
pub const LIST_REGISTRATIONS: &str = "list_user_registrations";
pub const JOIN_EVENT: &str = "join_event";
pub const LIST_EVENT_REGISTRATIONS: &str = "list_event_registrations";
pub const UPDATE_REGISTRATION: &str = "update_registration_status";
pub const UPDATE_EVENT: &str = "update_event_status";
pub const HEALTH: &str = "health";

/// One recorded call against the fake backend
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCall {
    ListEvents { filter: FeedFilter, offset: usize, limit: usize },
    GetEvent(String),
    ListBookmarks(String),
    ToggleBookmark { user_id: String, event_id: String },
    ListRegistrations(String),
    JoinEvent { event_id: String, user_id: String, user_name: String },
    ListEventRegistrations(String),
    UpdateRegistration { registration_id: String, status: RegistrationStatus },
    UpdateEvent { event_id: String, status: EventStatus },
    Health,
}

impl SourceCall {
    pub fn operation(&self) -> &'static str {
        match self {
            SourceCall::ListEvents { .. } => LIST_EVENTS,
            SourceCall::GetEvent(_) => GET_EVENT,
            SourceCall::ListBookmarks(_) => LIST_BOOKMARKS,
            SourceCall::ToggleBookmark { .. } => TOGGLE_BOOKMARK,
            SourceCall::ListRegistrations(_) => LIST_REGISTRATIONS,
            SourceCall::JoinEvent { .. } => JOIN_EVENT,
            SourceCall::ListEventRegistrations(_) => LIST_EVENT_REGISTRATIONS,
            SourceCall::UpdateRegistration { .. } => UPDATE_REGISTRATION,
            SourceCall::UpdateEvent { .. } => UPDATE_EVENT,
            SourceCall::Health => HEALTH,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    events: Vec<Event>,
    details: HashMap<String, Event>,
    bookmarks: HashMap<String, BTreeSet<String>>,
    registrations: Vec<Registration>,
    calls: Vec<SourceCall>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    latency: HashMap<&'static str, Duration>,
    category_latency: HashMap<String, Duration>,
    next_registration: u32,
}

#[derive(Debug, Default)]
pub struct FakeEventSource {
    state: Mutex<FakeState>,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        let source = Self::new();
        source.state().events = events;
        source
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_bookmark(&self, user_id: &str, event_id: &str) {
        self.state()
            .bookmarks
            .entry(user_id.to_string())
            .or_default()
            .insert(event_id.to_string());
    }

    pub fn add_registration(&self, registration: Registration) {
        self.state().registrations.push(registration);
    }

    /// Serve this event from `get_event` instead of the list copy
    pub fn set_detail(&self, event: Event) {
        self.state().details.insert(event.id.clone(), event);
    }

    /// Fail the next `times` calls of `operation` with `error`
    pub fn fail_next(&self, operation: &'static str, error: ApiError, times: usize) {
        let mut state = self.state();
        let queue = state.failures.entry(operation).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub fn set_latency(&self, operation: &'static str, latency: Duration) {
        self.state().latency.insert(operation, latency);
    }

    /// Latency of `list_events` for one category, overriding the operation latency
    pub fn set_category_latency(&self, category: &str, latency: Duration) {
        self.state().category_latency.insert(category.to_string(), latency);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Filters of every `list_events` call, in call order
    pub fn listed_filters(&self) -> Vec<(FeedFilter, usize)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                SourceCall::ListEvents { filter, offset, .. } => Some((filter.clone(), *offset)),
                _ => None,
            })
            .collect()
    }

    pub fn server_bookmarks(&self, user_id: &str) -> BTreeSet<String> {
        self.state().bookmarks.get(user_id).cloned().unwrap_or_default()
    }

    pub fn server_registrations(&self) -> Vec<Registration> {
        self.state().registrations.clone()
    }

    /// Record the call and look up how long it should take and whether it fails
    fn begin(&self, call: SourceCall) -> (Duration, Option<ApiError>) {
        let mut state = self.state();
        let operation = call.operation();
        let mut latency = state.latency.get(operation).copied().unwrap_or_default();
        if let SourceCall::ListEvents { filter, .. } = &call {
            if let Some(category_latency) = state.category_latency.get(&filter.category) {
                latency = *category_latency;
            }
        }
        let failure = state.failures.get_mut(operation).and_then(VecDeque::pop_front);
        state.calls.push(call);
        (latency, failure)
    }

    async fn respond(&self, call: SourceCall) -> ApiResult<()> {
        let (latency, failure) = self.begin(call);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn matches_filter(event: &Event, filter: &FeedFilter) -> bool {
    if event.status != filter.status {
        return false;
    }
    if let Some(category) = filter.category_param() {
        if event.category != category {
            return false;
        }
    }
    if let Some(location) = filter.location_param() {
        if event.location != location {
            return false;
        }
    }
    if let Some(search) = filter.search_param() {
        let search = search.to_lowercase();
        if !event.title.to_lowercase().contains(&search) && !event.description.to_lowercase().contains(&search) {
            return false;
        }
    }
    true
}

fn not_found(what: &str) -> ApiError {
    ApiError::Rejected {
        status: 404,
        detail: format!("{} not found", what),
    }
}

#[async_trait]
impl RemoteEventSource for FakeEventSource {
    async fn list_events(&self, filter: &FeedFilter, offset: usize, limit: usize) -> ApiResult<Vec<Event>> {
        self.respond(SourceCall::ListEvents {
            filter: filter.clone(),
            offset,
            limit,
        })
        .await?;

        Ok(self
            .state()
            .events
            .iter()
            .filter(|event| matches_filter(event, filter))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_event(&self, event_id: &str) -> ApiResult<Event> {
        self.respond(SourceCall::GetEvent(event_id.to_string())).await?;
        let state = self.state();
        let event = state
            .details
            .get(event_id)
            .or_else(|| state.events.iter().find(|e| e.id == event_id))
            .cloned();
        event.ok_or_else(|| not_found("Event"))
    }

    async fn list_user_bookmarks(&self, user_id: &str) -> ApiResult<Vec<String>> {
        self.respond(SourceCall::ListBookmarks(user_id.to_string())).await?;
        Ok(self.server_bookmarks(user_id).into_iter().collect())
    }

    async fn toggle_bookmark(&self, user_id: &str, event_id: &str) -> ApiResult<Vec<String>> {
        self.respond(SourceCall::ToggleBookmark {
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
        })
        .await?;

        let mut state = self.state();
        let ids = state.bookmarks.entry(user_id.to_string()).or_default();
        if !ids.remove(event_id) {
            ids.insert(event_id.to_string());
        }
        Ok(ids.iter().cloned().collect())
    }

    async fn list_user_registrations(&self, user_id: &str) -> ApiResult<Vec<Registration>> {
        self.respond(SourceCall::ListRegistrations(user_id.to_string())).await?;
        Ok(self
            .state()
            .registrations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn join_event(&self, event_id: &str, request: &JoinEventRequest) -> ApiResult<Registration> {
        self.respond(SourceCall::JoinEvent {
            event_id: event_id.to_string(),
            user_id: request.user_id.clone(),
            user_name: request.user_name.clone(),
        })
        .await?;

        let mut state = self.state();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("Event"))?;
        if event.is_full() {
            return Err(ApiError::Rejected {
                status: 400,
                detail: "Event is full".to_string(),
            });
        }
        event.current_participants += 1;
        let title = event.title.clone();

        state.next_registration += 1;
        let registration = Registration {
            id: format!("reg-{}", state.next_registration),
            event_id: event_id.to_string(),
            user_id: request.user_id.clone(),
            status: RegistrationStatus::Pending,
            joined_at: format!("2025-03-01T10:00:{:02}", state.next_registration),
            event_title: Some(title),
            event_date: None,
            event_status: Some("upcoming".to_string()),
            user_name: Some(request.user_name.clone()),
            user_avatar: Some(request.user_avatar.clone()),
        };
        state.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn list_event_registrations(&self, event_id: &str) -> ApiResult<Vec<Registration>> {
        self.respond(SourceCall::ListEventRegistrations(event_id.to_string()))
            .await?;
        Ok(self
            .state()
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn update_registration_status(
        &self,
        registration_id: &str,
        status: RegistrationStatus,
    ) -> ApiResult<Registration> {
        self.respond(SourceCall::UpdateRegistration {
            registration_id: registration_id.to_string(),
            status,
        })
        .await?;

        let mut state = self.state();
        let registration = state
            .registrations
            .iter_mut()
            .find(|r| r.id == registration_id)
            .ok_or_else(|| not_found("Registration"))?;
        registration.status = status;
        Ok(registration.clone())
    }

    async fn update_event_status(&self, event_id: &str, status: EventStatus) -> ApiResult<Event> {
        self.respond(SourceCall::UpdateEvent {
            event_id: event_id.to_string(),
            status,
        })
        .await?;

        let mut state = self.state();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("Event"))?;
        event.status = status;
        Ok(event.clone())
    }

    async fn health(&self) -> ApiResult<()> {
        self.respond(SourceCall::Health).await
    }
}
