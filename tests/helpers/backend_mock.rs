//! Mock event backend server for testing
//!
//! This module provides a mock HTTP server that simulates the event backend's
//! REST API. It uses wiremock to create configurable mock responses.

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use VolunteerHub::config::{ApiConfig, Settings};
use VolunteerHub::HttpEventSource;

/// Mock event backend for testing
pub struct BackendMockServer {
    pub server: MockServer,
    pub base_url: String,
}

/// Configuration for mock responses
#[derive(Debug, Clone)]
pub struct MockResponseConfig {
    pub status: u16,
    pub delay_ms: Option<u64>,
    pub body: Option<Value>,
}

impl Default for MockResponseConfig {
    fn default() -> Self {
        Self {
            status: 200,
            delay_ms: None,
            body: None,
        }
    }
}

impl MockResponseConfig {
    pub fn rejected(status: u16, detail: &str) -> Self {
        Self {
            status,
            delay_ms: None,
            body: Some(json!({ "detail": detail })),
        }
    }

    fn template(self, default_body: Value) -> ResponseTemplate {
        let mut response =
            ResponseTemplate::new(self.status).set_body_json(self.body.unwrap_or(default_body));
        if let Some(delay) = self.delay_ms {
            response = response.set_delay(std::time::Duration::from_millis(delay));
        }
        response
    }
}

/// Wire representation of an event, as the backend sends it
pub fn event_json(id: &str, category: &str, current: u32, max: u32) -> Value {
    json!({
        "id": id,
        "title": format!("Event {}", id),
        "description": "Help out for an afternoon",
        "category": category,
        "location": "Campus",
        "date": "2025-06-14",
        "organizerId": "org-1",
        "organizerName": "Green Club",
        "maxVolunteers": max,
        "currentVolunteers": current,
        "imageUrl": null,
        "status": "upcoming"
    })
}

pub fn registration_json(id: &str, event_id: &str, user_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "eventId": event_id,
        "userId": user_id,
        "status": status,
        "joinedAt": "2025-02-01T09:00:00.123456",
        "eventTitle": format!("Event {}", event_id),
        "eventDate": "2025-06-14",
        "eventStatus": "upcoming",
        "userName": "Aina",
        "userAvatar": ""
    })
}

impl BackendMockServer {
    /// Create a new mock backend server
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self { server, base_url }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            timeout_seconds: 1,
            ..Settings::default().api
        }
    }

    /// HTTP source pointed at this server
    pub fn source(&self) -> HttpEventSource {
        HttpEventSource::new(&self.api_config()).unwrap()
    }

    /// Setup mock for GET /events
    pub async fn mock_list_events(&self, events: Vec<Value>, config: MockResponseConfig) {
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(config.template(Value::Array(events)))
            .mount(&self.server)
            .await;
    }

    /// Setup mock for GET /events/{id}
    pub async fn mock_get_event(&self, event: Value, config: MockResponseConfig) {
        let id = event["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/events/{}", id)))
            .respond_with(config.template(event))
            .mount(&self.server)
            .await;
    }

    /// Setup mock for POST /events/{id}/join
    pub async fn mock_join_event(&self, event_id: &str, registration: Value, config: MockResponseConfig) {
        Mock::given(method("POST"))
            .and(path(format!("/events/{}/join", event_id)))
            .respond_with(config.template(registration))
            .mount(&self.server)
            .await;
    }

    /// Setup mock for GET /health
    pub async fn mock_health(&self, config: MockResponseConfig) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(config.template(json!({ "status": "ok" })))
            .mount(&self.server)
            .await;
    }

    /// Reset all mocks
    pub async fn reset(&self) {
        self.server.reset().await;
    }
}
