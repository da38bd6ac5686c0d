pub mod health;
pub mod jobs;
pub mod schedule;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::app::AppState;

/// Error body for the job endpoints.
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Returns true if the request is authorised.
pub(crate) fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    use herald_core::config::AuthMode;

    match &state.config.gateway.auth.mode {
        AuthMode::None => true,
        AuthMode::Token => {
            let expected = match &state.config.gateway.auth.token {
                Some(t) => t.as_str(),
                // Token mode configured but no token value — deny.
                None => return false,
            };
            extract_bearer(headers)
                .map(|t| t == expected)
                .unwrap_or(false)
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
