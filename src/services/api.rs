//! HTTP event backend client
//!
//! Implements [`RemoteEventSource`] over the backend's JSON API, including
//! HTTP client setup, response parsing and the mapping of transport and
//! status failures onto [`ApiError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::models::{
    Event, EventStatus, FeedFilter, JoinEventRequest, Registration, RegistrationStatus,
    UpdateEventStatusRequest, UpdateRegistrationRequest,
};
use crate::services::source::RemoteEventSource;
use crate::utils::errors::{ApiError, ApiResult, Result, VolunteerHubError};

/// Client for the event backend's REST API
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: Client,
    base_url: Url,
}

impl HttpEventSource {
    /// Create a new HttpEventSource instance
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(VolunteerHubError::Config(format!(
                "API base URL cannot carry paths: {}",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = config.auth_token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| VolunteerHubError::Config(format!("Invalid auth token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL from raw path segments; segments are percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &str) -> ApiResult<T> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(status, &body);
            debug!(operation = operation, status = status.as_u16(), error = %error, "Backend returned an error status");
            return Err(error);
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("{}: {}", operation, e))
        })
    }
}

fn classify_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else if error.is_connect() || error.is_request() {
        ApiError::ServiceUnavailable(error.to_string())
    } else if error.is_decode() || error.is_body() {
        ApiError::InvalidResponse(error.to_string())
    } else {
        ApiError::RequestFailed {
            status: error.status().map(|s| s.as_u16()).unwrap_or(0),
            message: error.to_string(),
        }
    }
}

fn classify_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ApiError::ServiceUnavailable(format!("HTTP {}", status))
        }
        s if s.is_client_error() => ApiError::Rejected {
            status: s.as_u16(),
            detail: extract_detail(body),
        },
        s => ApiError::RequestFailed {
            status: s.as_u16(),
            message: extract_detail(body),
        },
    }
}

/// Pull the human-readable message out of a `{"detail": ...}` error body
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl RemoteEventSource for HttpEventSource {
    async fn list_events(&self, filter: &FeedFilter, offset: usize, limit: usize) -> ApiResult<Vec<Event>> {
        let mut url = self.endpoint(&["events"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("status", filter.status.as_str());
            if let Some(category) = filter.category_param() {
                query.append_pair("category", category);
            }
            if let Some(location) = filter.location_param() {
                query.append_pair("location", location);
            }
            if let Some(search) = filter.search_param() {
                query.append_pair("search", search);
            }
            query.append_pair("skip", &offset.to_string());
            query.append_pair("limit", &limit.to_string());
        }

        debug!(url = %url, "Listing events");
        self.execute(self.client.get(url), "list_events").await
    }

    async fn get_event(&self, event_id: &str) -> ApiResult<Event> {
        let url = self.endpoint(&["events", event_id]);
        self.execute(self.client.get(url), "get_event").await
    }

    async fn list_user_bookmarks(&self, user_id: &str) -> ApiResult<Vec<String>> {
        let url = self.endpoint(&["users", user_id, "bookmarks"]);
        self.execute(self.client.get(url), "list_user_bookmarks").await
    }

    async fn toggle_bookmark(&self, user_id: &str, event_id: &str) -> ApiResult<Vec<String>> {
        let url = self.endpoint(&["users", user_id, "bookmarks"]);
        let request = self.client.post(url).json(&json!({ "eventId": event_id }));
        self.execute(request, "toggle_bookmark").await
    }

    async fn list_user_registrations(&self, user_id: &str) -> ApiResult<Vec<Registration>> {
        let url = self.endpoint(&["users", user_id, "registrations"]);
        self.execute(self.client.get(url), "list_user_registrations").await
    }

    async fn join_event(&self, event_id: &str, request: &JoinEventRequest) -> ApiResult<Registration> {
        let url = self.endpoint(&["events", event_id, "join"]);
        self.execute(self.client.post(url).json(request), "join_event").await
    }

    async fn list_event_registrations(&self, event_id: &str) -> ApiResult<Vec<Registration>> {
        let url = self.endpoint(&["events", event_id, "registrations"]);
        self.execute(self.client.get(url), "list_event_registrations").await
    }

    async fn update_registration_status(
        &self,
        registration_id: &str,
        status: RegistrationStatus,
    ) -> ApiResult<Registration> {
        let url = self.endpoint(&["registrations", registration_id]);
        let request = self.client.patch(url).json(&UpdateRegistrationRequest { status });
        self.execute(request, "update_registration_status").await
    }

    async fn update_event_status(&self, event_id: &str, status: EventStatus) -> ApiResult<Event> {
        let url = self.endpoint(&["events", event_id]);
        let request = self.client.patch(url).json(&UpdateEventStatusRequest { status });
        self.execute(request, "update_event_status").await
    }

    async fn health(&self) -> ApiResult<()> {
        let url = self.endpoint(&["health"]);
        self.execute::<serde_json::Value>(self.client.get(url), "health")
            .await
            .map(|_| ())
    }
}
