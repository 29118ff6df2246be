//! Data models module
//!
//! This module contains all data structures exchanged with the event backend
//! and used as cache keys.

pub mod event;
pub mod query;
pub mod registration;
pub mod user;

// Re-export commonly used models
pub use event::{Event, EventStatus, UpdateEventStatusRequest};
pub use query::{FeedFilter, QueryKey, ALL_CATEGORIES};
pub use registration::{Registration, RegistrationStatus, JoinEventRequest, UpdateRegistrationRequest};
pub use user::{UserRole, Viewer};
