//! Error handling for VolunteerHub
//!
//! This module defines the main error types used throughout the feed engine
//! and the classification rules the retry policy and callers rely on.

use thiserror::Error;

/// Main error type for VolunteerHub
#[derive(Error, Debug)]
pub enum VolunteerHubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event backend error: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Please sign in first")]
    NotSignedIn,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: String },

    #[error("Full Capacity")]
    FullCapacity { event_id: String },

    #[error("Already requested to join event {event_id}")]
    AlreadyRegistered { event_id: String },

    #[error("Failed to join event")]
    JoinFailed,

    /// A backend refusal surfaced to the user with its message unchanged
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to save bookmark for {event_id}: {reason}")]
    BookmarkFailed { event_id: String, reason: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

/// Errors raised at the remote event source boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Event backend timeout")]
    Timeout,

    #[error("Event backend unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed with HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// Business-rule rejection; `detail` is the backend's message verbatim
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for VolunteerHub operations
pub type Result<T> = std::result::Result<T, VolunteerHubError>;

/// Result type alias for remote source calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Transient-availability faults are worth retrying; rejections and
    /// malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout => true,
            ApiError::ServiceUnavailable(_) => true,
            ApiError::RequestFailed { status, .. } => *status >= 500,
            ApiError::Rejected { .. } => false,
            ApiError::InvalidResponse(_) => false,
        }
    }

    /// The message the backend attached to a rejection, if any
    pub fn backend_detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } if !detail.is_empty() => Some(detail),
            _ => None,
        }
    }
}

impl VolunteerHubError {
    /// Whether the failure came from the backend being temporarily unreachable
    pub fn is_transient(&self) -> bool {
        match self {
            VolunteerHubError::Api(e) => e.is_transient(),
            VolunteerHubError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            VolunteerHubError::Config(_) => false,
            VolunteerHubError::Api(e) => e.is_transient(),
            VolunteerHubError::Http(_) => true,
            VolunteerHubError::Serialization(_) => false,
            VolunteerHubError::Io(_) => true,
            VolunteerHubError::UrlParse(_) => false,
            VolunteerHubError::NotSignedIn => true,
            VolunteerHubError::PermissionDenied(_) => false,
            VolunteerHubError::EventNotFound { .. } => false,
            VolunteerHubError::FullCapacity { .. } => false,
            VolunteerHubError::AlreadyRegistered { .. } => false,
            VolunteerHubError::JoinFailed => true,
            VolunteerHubError::Rejected(_) => false,
            VolunteerHubError::BookmarkFailed { .. } => true,
            VolunteerHubError::InvalidStateTransition { .. } => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VolunteerHubError::Config(_) => ErrorSeverity::Critical,
            VolunteerHubError::NotSignedIn => ErrorSeverity::Info,
            VolunteerHubError::FullCapacity { .. } => ErrorSeverity::Info,
            VolunteerHubError::AlreadyRegistered { .. } => ErrorSeverity::Info,
            VolunteerHubError::PermissionDenied(_) => ErrorSeverity::Warning,
            VolunteerHubError::BookmarkFailed { .. } => ErrorSeverity::Warning,
            VolunteerHubError::Rejected(_) => ErrorSeverity::Warning,
            VolunteerHubError::Api(ApiError::Rejected { .. }) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
