//! State management module
//!
//! This module holds the client-side state of the feed: the entity cache,
//! filter controller, debounce primitive and scheduler abstraction.

pub mod cache;
pub mod debounce;
pub mod filter;
pub mod scheduler;

// Re-export commonly used state components
pub use cache::{EntityCache, EntityStore, EventPage, FaultKind, FeedFault, FeedStatus};
pub use debounce::{debounced, Debouncer};
pub use filter::{FilterChange, FilterController};
pub use scheduler::{Scheduler, TokioScheduler};
