//! Test data helpers for creating events, registrations and viewers

use std::sync::Arc;

use chrono::NaiveDate;

use VolunteerHub::config::{FeedConfig, RetryConfig};
use VolunteerHub::models::{Event, EventStatus, Registration, RegistrationStatus, Viewer};
use VolunteerHub::state::TokioScheduler;
use VolunteerHub::FeedEngine;

use super::fake_source::FakeEventSource;

/// Helper function to create a test event
pub fn create_test_event(id: &str, category: &str, current: u32, max: u32) -> Event {
    Event {
        id: id.to_string(),
        title: format!("{} cleanup {}", category, id),
        description: format!("Volunteer event {}", id),
        category: category.to_string(),
        location: "Campus".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 6, 14).unwrap(),
        organizer_id: "org-1".to_string(),
        organizer_name: "Green Club".to_string(),
        max_participants: max,
        current_participants: current,
        image_url: None,
        tasks: None,
        status: EventStatus::Upcoming,
        coordination_link: None,
    }
}

/// Helper function to create a test event with a custom title
pub fn create_titled_event(id: &str, category: &str, title: &str) -> Event {
    Event {
        title: title.to_string(),
        ..create_test_event(id, category, 0, 20)
    }
}

/// Helper function to create a test registration
pub fn create_test_registration(id: &str, event_id: &str, user_id: &str, status: RegistrationStatus) -> Registration {
    Registration {
        id: id.to_string(),
        event_id: event_id.to_string(),
        user_id: user_id.to_string(),
        status,
        joined_at: "2025-02-01T09:00:00".to_string(),
        event_title: None,
        event_date: None,
        event_status: None,
        user_name: Some("Aina".to_string()),
        user_avatar: None,
    }
}

/// A mixed feed: three Environment events, two Welfare events
pub fn sample_events() -> Vec<Event> {
    vec![
        create_titled_event("env-1", "Environment", "Beach cleanup"),
        create_titled_event("env-2", "Environment", "Tree planting"),
        create_titled_event("env-3", "Environment", "River survey"),
        create_titled_event("wel-1", "Welfare", "Food bank shift"),
        create_titled_event("wel-2", "Welfare", "Shelter dinner"),
    ]
}

pub fn test_volunteer() -> Viewer {
    Viewer {
        display_name: Some("Aina".to_string()),
        ..Viewer::volunteer("user-1")
    }
}

pub fn test_organizer() -> Viewer {
    Viewer {
        display_name: Some("Green Club".to_string()),
        ..Viewer::organizer("org-1")
    }
}

/// Engine over `source` with default retry settings and the given page size
pub fn create_test_engine(source: &Arc<FakeEventSource>, page_size: usize) -> FeedEngine {
    let feed = FeedConfig {
        page_size,
        ..FeedConfig::default()
    };
    FeedEngine::with_scheduler(source.clone(), feed, RetryConfig::default(), Arc::new(TokioScheduler))
}
