//! Viewer model

use serde::{Deserialize, Serialize};

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[serde(alias = "participant")]
    Volunteer,
    Organizer,
}

/// The signed-in user looking at the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
}

impl Viewer {
    pub fn volunteer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            avatar_url: None,
            role: UserRole::Volunteer,
        }
    }

    pub fn organizer(user_id: impl Into<String>) -> Self {
        Self {
            role: UserRole::Organizer,
            ..Self::volunteer(user_id)
        }
    }

    pub fn is_organizer(&self) -> bool {
        self.role == UserRole::Organizer
    }

    /// Name sent along with join requests
    pub fn join_name(&self) -> String {
        self.display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Volunteer".to_string())
    }
}
