use axum::http::HeaderMap;

use crate::error::AppError;

/// Authentication settings for event submitters.
#[derive(Clone)]
pub struct AuthConfig {
    /// Bearer token required to submit events. None = ingestion is open.
    pub bearer_token: Option<String>,
}

/// Validate a submitter's bearer token. Viewer reads never require auth;
/// only ingestion goes through here.
pub fn authorize_submitter(auth: &AuthConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref expected) = auth.bearer_token else {
        return Ok(());
    };

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::Unauthorized(
            "Invalid or missing bearer token".to_string(),
        )),
    }
}
