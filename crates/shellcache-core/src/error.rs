//! Error types shared across the cache, network and update layers.

use std::time::Duration;

use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failures of the generation-scoped cache storage.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache generation name: {0}")]
    InvalidGeneration(String),

    #[error("Install failed for {path}: {reason}")]
    Install { path: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of a single network fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        FetchError::Status {
            status,
            body: Self::truncate_body(body),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Failures reading or writing the small key/value state kept across reloads.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by the platform hosting the worker and its pages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("No open client with id {0}")]
    UnknownClient(String),

    #[error("Client {0} refused focus")]
    FocusRefused(String),

    #[error("Message to client {id} was not delivered: {reason}")]
    MessageUndelivered { id: String, reason: String },

    #[error("Could not open a window at {url}: {reason}")]
    WindowBlocked { url: String, reason: String },

    #[error("Could not take control of open clients: {0}")]
    ClaimFailed(String),

    #[error("Notification was not shown: {0}")]
    NotificationDenied(String),

    #[error("Navigation to {url} was blocked: {reason}")]
    NavigationBlocked { url: String, reason: String },
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Worker lifecycle failures.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by the version poller and the update orchestrator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpdateError {
    #[error("No update is available to apply")]
    NoUpdateAvailable,

    #[error("An update is already being applied")]
    AlreadyApplying,

    #[error("A version check is still running")]
    CheckInProgress,

    #[error("Version check failed (primary: {primary}; fallback: {fallback})")]
    VersionUnavailable { primary: String, fallback: String },

    #[error("Failed to purge cache generations: {0}")]
    CachePurge(#[from] StoreError),

    #[error("Failed to persist version state: {0}")]
    Persist(#[from] StateError),

    #[error("Navigation failed: {0}")]
    Navigation(#[from] HostError),
}

impl UpdateError {
    /// Returns a user-friendly error message suitable for display in the UI.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::VersionUnavailable { .. } => {
                "Could not check for updates. Please check your connection."
            }
            Self::NoUpdateAvailable => "You are already on the latest version.",
            Self::AlreadyApplying => "An update is already in progress.",
            Self::CheckInProgress => "Still checking for updates. Try again in a moment.",
            Self::CachePurge(_) | Self::Persist(_) => {
                "Could not prepare the update. Please try again."
            }
            Self::Navigation(_) => {
                "Could not reload the application. Please reload manually."
            }
        }
    }

    /// Returns whether this error is potentially recoverable with a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VersionUnavailable { .. }
                | Self::CheckInProgress
                | Self::CachePurge(_)
                | Self::Persist(_)
                | Self::Navigation(_)
        )
    }
}
