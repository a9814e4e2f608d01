//! Error taxonomy of the authenticated client.

use http::StatusCode;
use thiserror::Error;

use crate::request::api_response::ApiResponse;

/// Credential persistence failures. Never surfaced through `set`/`clear`,
/// those log and keep the in-memory state authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential file format: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Why a refresh could not produce a new access token.
///
/// One value is handed to every caller queued behind the same refresh, hence `Clone`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected with status {status}")]
    Rejected { status: StatusCode },
    #[error("refresh transport failure: {0}")]
    Transport(String),
    #[error("refresh response malformed: {0}")]
    MalformedGrant(String),
    #[error("refresh interrupted before settling")]
    Interrupted,
    /// login or logout happened while the refresh was in flight
    #[error("session changed while refreshing")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status, response passed through untouched.
    #[error("request failed with status {}", .response.status)]
    Status { response: ApiResponse },

    /// Refresh was impossible; credentials are already cleared.
    #[error("session expired: {0}")]
    SessionExpired(#[source] RefreshError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid token grant: {0}")]
    InvalidGrant(String),

    #[error("response decode: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { response } => Some(response.status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_))
    }
}
