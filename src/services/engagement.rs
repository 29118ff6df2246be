//! Engagement projector
//!
//! Pure derivation of per-event UI state from the event list, the viewer's
//! bookmark set and registration list. Any of the three inputs may still be
//! loading, in which case it is treated as empty.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Event, Registration, RegistrationStatus, Viewer};
use crate::state::EntityCache;

/// Primary action offered on an event card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardAction {
    SignIn,
    /// Organizer looking at their own event
    Manage,
    ViewOnly,
    ViewApproved,
    AwaitingApproval,
    Rejected,
    Full,
    Join,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementView {
    pub event: Event,
    pub is_bookmarked: bool,
    pub registration_status: Option<RegistrationStatus>,
    pub is_full: bool,
    pub is_owned_by_viewer: bool,
    /// A bookmark toggle on this event has not settled yet
    pub bookmark_pending: bool,
    /// A join request for this event is being submitted
    pub join_submitting: bool,
    pub action: CardAction,
}

/// Per-event transient flags owned by the mutation coordinator
pub trait PendingFlags {
    fn bookmark_pending(&self, event_id: &str) -> bool;
    fn join_submitting(&self, event_id: &str) -> bool;
}

/// No mutation in flight
#[derive(Debug, Clone, Copy, Default)]
pub struct Settled;

impl PendingFlags for Settled {
    fn bookmark_pending(&self, _event_id: &str) -> bool {
        false
    }

    fn join_submitting(&self, _event_id: &str) -> bool {
        false
    }
}

impl PendingFlags for EntityCache {
    fn bookmark_pending(&self, event_id: &str) -> bool {
        self.is_bookmark_pending(event_id)
    }

    fn join_submitting(&self, event_id: &str) -> bool {
        self.is_joining(event_id)
    }
}

/// The viewer's registration for `event_id`.
///
/// At most one should exist. If the backend ever returns several, the most
/// recently created one wins: records with a parseable `joinedAt` beat those
/// without, and equal timestamps fall back to the later position in the list.
pub fn latest_registration<'a>(
    registrations: &'a [Registration],
    event_id: &str,
    user_id: &str,
) -> Option<&'a Registration> {
    registrations
        .iter()
        .enumerate()
        .filter(|(_, r)| r.event_id == event_id && r.user_id == user_id)
        .max_by_key(|(index, r)| (r.joined_at(), *index))
        .map(|(_, r)| r)
}

fn card_action(
    viewer: Option<&Viewer>,
    is_full: bool,
    is_owned: bool,
    status: Option<RegistrationStatus>,
) -> CardAction {
    let Some(viewer) = viewer else {
        return if is_full { CardAction::Full } else { CardAction::SignIn };
    };

    if viewer.is_organizer() {
        return if is_owned { CardAction::Manage } else { CardAction::ViewOnly };
    }

    match status {
        Some(RegistrationStatus::Confirmed) => CardAction::ViewApproved,
        Some(RegistrationStatus::Pending) => CardAction::AwaitingApproval,
        Some(RegistrationStatus::Rejected) => CardAction::Rejected,
        None if is_full => CardAction::Full,
        None => CardAction::Join,
    }
}

/// Project one event
pub fn project_event(
    event: &Event,
    bookmarks: &HashSet<String>,
    registrations: &[Registration],
    viewer: Option<&Viewer>,
    flags: &dyn PendingFlags,
) -> EngagementView {
    let is_full = event.is_full();
    let registration_status = viewer
        .and_then(|v| latest_registration(registrations, &event.id, &v.user_id))
        .map(|r| r.status);
    let is_owned_by_viewer = viewer
        .map(|v| v.is_organizer() && v.user_id == event.organizer_id)
        .unwrap_or(false);

    EngagementView {
        event: event.clone(),
        is_bookmarked: viewer.is_some() && bookmarks.contains(&event.id),
        registration_status,
        is_full,
        is_owned_by_viewer,
        bookmark_pending: flags.bookmark_pending(&event.id),
        join_submitting: flags.join_submitting(&event.id),
        action: card_action(viewer, is_full, is_owned_by_viewer, registration_status),
    }
}

/// Project a list of events, preserving order
pub fn project(
    events: &[Event],
    bookmarks: &HashSet<String>,
    registrations: &[Registration],
    viewer: Option<&Viewer>,
    flags: &dyn PendingFlags,
) -> Vec<EngagementView> {
    events
        .iter()
        .map(|event| project_event(event, bookmarks, registrations, viewer, flags))
        .collect()
}

/// Project the active page of `cache` for `viewer`.
///
/// With `hide_full` set, full events are left out unless the viewer already
/// has a registration for them.
pub fn project_cache(cache: &EntityCache, viewer: Option<&Viewer>, hide_full: bool) -> Vec<EngagementView> {
    let empty_bookmarks = HashSet::new();
    let (bookmarks, registrations) = match viewer {
        Some(v) => (
            cache.bookmarks_for(&v.user_id).unwrap_or(&empty_bookmarks),
            cache.registrations_for(&v.user_id).unwrap_or(&[]),
        ),
        None => (&empty_bookmarks, &[][..]),
    };

    project(cache.active_events(), bookmarks, registrations, viewer, cache)
        .into_iter()
        .filter(|view| !hide_full || !view.is_full || view.registration_status.is_some())
        .collect()
}
