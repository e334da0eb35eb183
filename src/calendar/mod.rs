//! Google Calendar integration: the OAuth2 client, token-refreshing API access and plan sync.

mod client;
mod session;
mod sync;

use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub(crate) use client::{GoogleClient, GoogleConfig};
pub(crate) use session::{CalendarItem, CalendarSession};
pub(crate) use sync::{sync_plan, SyncRequest, SyncResponse};

#[derive(Debug, Error)]
pub(crate) enum GoogleError {
    #[error("Google OAuth is not configured. Set GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REDIRECT_URI.")]
    NotConfigured,

    #[error("Invalid Google endpoint url: {0}")]
    InvalidUrl(String),

    #[error("No refresh token. Reconnect Google.")]
    MissingRefreshToken,

    #[error("Failed to connect to Google")]
    ExchangeFailed,

    #[error("Failed to refresh the Google token")]
    RefreshFailed,

    #[error("Calendar not found or access denied")]
    CalendarNotFound,

    #[error("{0}")]
    Upstream(&'static str),

    #[error("Google request failed")]
    Request(#[from] reqwest::Error),
}

impl GoogleError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            GoogleError::NotConfigured | GoogleError::InvalidUrl(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GoogleError::MissingRefreshToken => StatusCode::UNAUTHORIZED,
            GoogleError::CalendarNotFound => StatusCode::BAD_REQUEST,
            GoogleError::ExchangeFailed
            | GoogleError::RefreshFailed
            | GoogleError::Upstream(_)
            | GoogleError::Request(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// The token endpoint's answer, for both the code exchange and a refresh.
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct TokenGrant {
    #[serde(default)]
    pub(crate) access_token: Option<String>,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(default)]
    pub(crate) token_type: Option<String>,
    #[serde(default)]
    pub(crate) scope: Option<String>,
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
}
