//! Event model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle of an event as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Upcoming,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A volunteering opportunity.
///
/// Copies held by the client are replaced wholesale on refetch. The backend
/// names the capacity fields `maxVolunteers`/`currentVolunteers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub location: String,
    pub date: NaiveDate,
    pub organizer_id: String,
    #[serde(default)]
    pub organizer_name: String,
    #[serde(rename = "maxVolunteers", alias = "maxParticipants")]
    pub max_participants: u32,
    #[serde(rename = "currentVolunteers", alias = "currentParticipants", default)]
    pub current_participants: u32,
    pub image_url: Option<String>,
    pub tasks: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    /// Private link shared with confirmed participants, only present on detail reads
    #[serde(
        rename = "whatsappLink",
        alias = "coordinationLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coordination_link: Option<String>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }

    pub fn spots_left(&self) -> u32 {
        self.max_participants.saturating_sub(self.current_participants)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
}
