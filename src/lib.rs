//! VolunteerHub feed client
//!
//! Client-side feed synchronization for a community volunteering board.
//! This library fetches filtered, paginated event lists, joins them with the
//! viewer's bookmarks and registrations, and runs optimistic bookmark and
//! join mutations against the event backend.

#![allow(non_snake_case)]

pub mod config;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ApiError, Result, VolunteerHubError};

// Re-export main components for easy access
pub use services::{EngagementView, FeedEngine, FetchOutcome, HttpEventSource, RemoteEventSource};
pub use state::{EntityStore, FeedStatus, FilterChange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
