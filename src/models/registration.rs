//! Registration model

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Approval state of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Rejected => "rejected",
        }
    }

    /// Only a pending request can be decided, and only once
    pub fn can_transition_to(&self, next: RegistrationStatus) -> bool {
        matches!(
            (self, next),
            (RegistrationStatus::Pending, RegistrationStatus::Confirmed)
                | (RegistrationStatus::Pending, RegistrationStatus::Rejected)
        )
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant's request to join an event.
///
/// The event snapshot fields are denormalized by the backend for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RegistrationStatus,
    #[serde(default)]
    pub joined_at: String,
    pub event_title: Option<String>,
    pub event_date: Option<String>,
    pub event_status: Option<String>,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
}

impl Registration {
    /// Creation time, accepting RFC 3339 or the backend's naive ISO format (read as UTC)
    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.joined_at) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.joined_at, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEventRequest {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRegistrationRequest {
    pub status: RegistrationStatus,
}
