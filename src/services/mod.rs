//! Services module
//!
//! This module contains the feed synchronization services: the remote event
//! source and its HTTP implementation, retry, fetch orchestration, engagement
//! projection, optimistic mutations and organizer management.

pub mod api;
pub mod engagement;
pub mod engine;
pub mod feed;
pub mod mutation;
pub mod organizer;
pub mod retry;
pub mod source;

// Re-export commonly used services
pub use api::HttpEventSource;
pub use engagement::{project, project_cache, CardAction, EngagementView};
pub use engine::FeedEngine;
pub use feed::{FeedOrchestrator, FetchOutcome, WAKE_UP_MESSAGE};
pub use mutation::{BookmarkToggle, JoinRequest, Mutation, MutationCoordinator, MutationState, OptimisticCommand};
pub use organizer::OrganizerDesk;
pub use retry::{RetryDecision, RetryOutcome, RetryPolicy, RetryState};
pub use source::RemoteEventSource;
