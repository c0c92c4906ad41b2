//! Error types for the alert-to-remediation pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that terminate handling of a single alert.
///
/// Each variant maps to exactly one HTTP response; none of them are retried
/// by the service itself.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// Body was not a JSON object
    #[error("malformed alert payload: {0}")]
    MalformedPayload(String),

    /// Shared-secret check failed
    #[error("unauthorized webhook request")]
    Unauthorized,

    /// Bearer token for the workflow API could not be read
    #[error("service account token unavailable: {0}")]
    TokenUnavailable(String),

    /// Workflow API answered with a non-2xx status
    #[error("workflow API rejected submission: HTTP {status}")]
    UpstreamRejected {
        /// Upstream HTTP status code
        status: u16,
        /// Upstream response body, kept for diagnostics
        body: String,
    },

    /// Workflow API could not be reached (connect, DNS, timeout)
    #[error("failed to reach workflow API: {0}")]
    TransportFailure(String),
}

impl RemediationError {
    /// HTTP status the webhook caller receives for this error.
    ///
    /// Upstream 4xx/5xx codes pass through unchanged; anything else the
    /// upstream sends that is not a success becomes `502`.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::TokenUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamRejected { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::MalformedPayload(detail) => json!({
                "error": "Malformed alert payload",
                "detail": detail,
            }),
            Self::Unauthorized => json!({ "error": "Unauthorized" }),
            Self::TokenUnavailable(_) => json!({ "error": "Service account token not found" }),
            Self::UpstreamRejected { body, .. } => json!({
                "error": "Failed to trigger workflow",
                "argo_response": body,
            }),
            Self::TransportFailure(detail) => json!({
                "error": "Failed to reach workflow API",
                "detail": detail,
            }),
        }
    }
}

impl IntoResponse for RemediationError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Errors raised while validating startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Workflow API URL did not parse
    #[error("invalid workflow API URL {url}: {reason}")]
    InvalidUrl {
        /// Offending value
        url: String,
        /// Parser message
        reason: String,
    },

    /// Template mode selected without a template name
    #[error("WORKFLOW_TEMPLATE_NAME is required when WORKFLOW_MODE=template")]
    MissingTemplateName,

    /// Unknown workflow mode string
    #[error("unknown workflow mode: {0} (expected \"inline\" or \"template\")")]
    UnknownMode(String),

    /// A required value was empty
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Submission timeout of zero seconds
    #[error("ARGO_REQUEST_TIMEOUT_SECS must be greater than zero")]
    ZeroTimeout,

    /// CA bundle could not be loaded
    #[error("failed to load CA certificate {path}: {reason}")]
    CaCert {
        /// Configured path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_map_to_fixed_statuses() {
        assert_eq!(
            RemediationError::MalformedPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RemediationError::Unauthorized.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RemediationError::TokenUnavailable("missing".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RemediationError::TransportFailure("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = RemediationError::UpstreamRejected {
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = RemediationError::UpstreamRejected {
            status: 409,
            body: "exists".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_non_error_upstream_status_becomes_bad_gateway() {
        let err = RemediationError::UpstreamRejected {
            status: 302,
            body: String::new(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_body_is_surfaced() {
        let err = RemediationError::UpstreamRejected {
            status: 500,
            body: "workflow spec invalid".into(),
        };
        let body = err.body();
        assert_eq!(body["argo_response"], "workflow spec invalid");
    }
}
