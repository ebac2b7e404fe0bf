//! Firestore client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("GCP_SA_KEY is not a valid JSON string: {0}")]
    InvalidKey(#[source] serde_json::Error),

    #[error("failed to sign token grant: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange failed (HTTP {status}): {body}")]
    TokenExchange { status: u16, body: String },

    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("document not found: {name}")]
    NotFound { name: String },

    #[error("document already exists: {name}")]
    AlreadyExists { name: String },

    #[error("precondition failed: {message}")]
    FailedPrecondition { message: String },

    #[error("rate limited: {message}")]
    RateLimit { message: String },

    #[error("firestore returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl FirestoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FirestoreError::RateLimit { .. } | FirestoreError::Network(_) => true,
            FirestoreError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Map a non-success status and body to a typed error
    pub(crate) fn from_status(status: u16, body: &str, name: &str) -> Self {
        let message = api_message(body);
        match status {
            401 | 403 => Self::Auth { status, message },
            404 => Self::NotFound {
                name: name.to_string(),
            },
            409 => Self::AlreadyExists {
                name: name.to_string(),
            },
            400 if message.contains("FAILED_PRECONDITION") || body.contains("FAILED_PRECONDITION") => {
                Self::FailedPrecondition { message }
            }
            429 => Self::RateLimit { message },
            _ => Self::Api { status, message },
        }
    }
}

/// Pull `error.message` out of a Google API error body
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_codes() {
        let body = r#"{"error": {"code": 404, "message": "Document not found", "status": "NOT_FOUND"}}"#;
        assert!(matches!(
            FirestoreError::from_status(404, body, "platforms/x"),
            FirestoreError::NotFound { .. }
        ));
        assert!(matches!(
            FirestoreError::from_status(403, "denied", "x"),
            FirestoreError::Auth { status: 403, .. }
        ));
        assert!(matches!(
            FirestoreError::from_status(409, "", "x"),
            FirestoreError::AlreadyExists { .. }
        ));
        assert!(FirestoreError::from_status(429, "slow down", "x").is_retryable());
        assert!(FirestoreError::from_status(503, "unavailable", "x").is_retryable());
        assert!(!FirestoreError::from_status(400, "bad", "x").is_retryable());
    }

    #[test]
    fn test_api_message_prefers_error_message() {
        let body = r#"{"error": {"message": "Missing or insufficient permissions."}}"#;
        let err = FirestoreError::from_status(500, body, "x");
        assert!(err.to_string().contains("Missing or insufficient permissions."));
    }

    #[test]
    fn test_failed_precondition() {
        let body = r#"{"error": {"code": 400, "message": "no entity to update", "status": "FAILED_PRECONDITION"}}"#;
        assert!(matches!(
            FirestoreError::from_status(400, body, "x"),
            FirestoreError::FailedPrecondition { .. }
        ));
    }
}
