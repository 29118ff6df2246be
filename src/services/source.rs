//! Remote event source boundary
//!
//! The backend is an opaque network collaborator with latency and transient
//! failure. Everything the feed engine needs from it goes through this trait
//! so it can be swapped for an in-memory source in tests.

use async_trait::async_trait;

use crate::models::{Event, EventStatus, FeedFilter, JoinEventRequest, Registration, RegistrationStatus};
use crate::utils::errors::ApiResult;

#[async_trait]
pub trait RemoteEventSource: Send + Sync + std::fmt::Debug {
    /// One page of events matching `filter`, starting at `offset`
    async fn list_events(&self, filter: &FeedFilter, offset: usize, limit: usize) -> ApiResult<Vec<Event>>;

    /// A single event, including viewer-conditional fields such as the coordination link
    async fn get_event(&self, event_id: &str) -> ApiResult<Event>;

    async fn list_user_bookmarks(&self, user_id: &str) -> ApiResult<Vec<String>>;

    /// Flip bookmark membership; returns the user's full bookmark list afterwards
    async fn toggle_bookmark(&self, user_id: &str, event_id: &str) -> ApiResult<Vec<String>>;

    async fn list_user_registrations(&self, user_id: &str) -> ApiResult<Vec<Registration>>;

    /// Create a pending registration; the backend assigns its id
    async fn join_event(&self, event_id: &str, request: &JoinEventRequest) -> ApiResult<Registration>;

    async fn list_event_registrations(&self, event_id: &str) -> ApiResult<Vec<Registration>>;

    async fn update_registration_status(
        &self,
        registration_id: &str,
        status: RegistrationStatus,
    ) -> ApiResult<Registration>;

    async fn update_event_status(&self, event_id: &str, status: EventStatus) -> ApiResult<Event>;

    /// Cheap liveness probe, used to wake a backend that idles
    async fn health(&self) -> ApiResult<()>;
}
