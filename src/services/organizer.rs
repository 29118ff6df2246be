//! Organizer participation management
//!
//! Lists the registrations of an event, approves or rejects them and closes
//! events. The desk never writes the entity cache; the engine refreshes the
//! feed after a successful write.

use std::sync::Arc;

use tracing::info;

use crate::models::{Event, EventStatus, Registration, RegistrationStatus, Viewer};
use crate::services::source::RemoteEventSource;
use crate::state::EntityStore;
use crate::utils::errors::{ApiError, Result, VolunteerHubError};

#[derive(Debug)]
pub struct OrganizerDesk {
    source: Arc<dyn RemoteEventSource>,
    store: Arc<EntityStore>,
}

impl OrganizerDesk {
    pub fn new(source: Arc<dyn RemoteEventSource>, store: Arc<EntityStore>) -> Self {
        Self { source, store }
    }

    /// Organizer role is required; an event known to the cache must be owned
    /// by the viewer.
    fn authorize<'a>(&self, viewer: Option<&'a Viewer>, event_id: &str) -> Result<&'a Viewer> {
        let viewer = viewer.ok_or(VolunteerHubError::NotSignedIn)?;
        if !viewer.is_organizer() {
            return Err(VolunteerHubError::PermissionDenied(
                "Only organizers can manage events".to_string(),
            ));
        }

        let cache = self.store.read();
        if let Some(event) = cache.find_event(event_id) {
            if event.organizer_id != viewer.user_id {
                return Err(VolunteerHubError::PermissionDenied(format!(
                    "Event {} belongs to another organizer",
                    event_id
                )));
            }
        }
        Ok(viewer)
    }

    /// Registrations for one of the viewer's events
    pub async fn participants(&self, viewer: Option<&Viewer>, event_id: &str) -> Result<Vec<Registration>> {
        self.authorize(viewer, event_id)?;
        self.source
            .list_event_registrations(event_id)
            .await
            .map_err(surface)
    }

    /// Approve or reject a pending registration
    pub async fn review(
        &self,
        viewer: Option<&Viewer>,
        registration: &Registration,
        decision: RegistrationStatus,
    ) -> Result<Registration> {
        let viewer = self.authorize(viewer, &registration.event_id)?;
        if !registration.status.can_transition_to(decision) {
            return Err(VolunteerHubError::InvalidStateTransition {
                from: registration.status.to_string(),
                to: decision.to_string(),
            });
        }

        let updated = self
            .source
            .update_registration_status(&registration.id, decision)
            .await
            .map_err(surface)?;
        info!(
            registration_id = %registration.id,
            event_id = %registration.event_id,
            user_id = %viewer.user_id,
            status = %decision,
            "Registration reviewed"
        );
        Ok(updated)
    }

    pub async fn set_event_status(&self, viewer: Option<&Viewer>, event_id: &str, status: EventStatus) -> Result<Event> {
        let viewer = self.authorize(viewer, event_id)?;
        let event = self
            .source
            .update_event_status(event_id, status)
            .await
            .map_err(surface)?;
        info!(event_id = event_id, user_id = %viewer.user_id, status = %status, "Event status updated");
        Ok(event)
    }
}

/// Backend refusals keep their message; everything else stays an API error
fn surface(error: ApiError) -> VolunteerHubError {
    match error.backend_detail() {
        Some(detail) => VolunteerHubError::Rejected(detail.to_string()),
        None => VolunteerHubError::Api(error),
    }
}
