//! Argo Workflows API client.

use std::path::Path;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::Credential;
use crate::error::{ConfigError, RemediationError};
use crate::workflow::WorkflowRequest;

/// Default Argo server endpoint for the `argo` namespace.
pub const DEFAULT_ARGO_WORKFLOW_API: &str =
    "http://argo-workflows-server.argo.svc.cluster.local:2746/api/v1/workflows/argo";

/// Default timeout for a submission.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Outcome of one submission that reached the workflow API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Whether the API answered 2xx
    pub succeeded: bool,
    /// HTTP status returned by the API
    pub http_status: u16,
    /// Raw response body
    pub body: String,
}

impl SubmissionResult {
    /// Response body as JSON, falling back to a JSON string.
    #[must_use]
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }

    /// Convert a rejected submission into [`RemediationError::UpstreamRejected`].
    pub fn into_result(self) -> Result<Self, RemediationError> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(RemediationError::UpstreamRejected {
                status: self.http_status,
                body: self.body,
            })
        }
    }
}

/// Client for `POST /api/v1/workflows/{namespace}`.
#[derive(Debug, Clone)]
pub struct ArgoClient {
    client: Client,
    endpoint: String,
}

impl ArgoClient {
    /// Create a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Create a client that additionally trusts the PEM root at `ca_cert`.
    ///
    /// In-cluster Argo servers are usually fronted by a certificate signed by
    /// the cluster CA.
    pub fn with_ca_cert(
        endpoint: impl Into<String>,
        timeout: Duration,
        ca_cert: &Path,
    ) -> Result<Self, ConfigError> {
        let ca_error = |reason: String| ConfigError::CaCert {
            path: ca_cert.display().to_string(),
            reason,
        };

        let pem = std::fs::read(ca_cert).map_err(|e| ca_error(e.to_string()))?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| ca_error(e.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .add_root_certificate(cert)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Target endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit a workflow request. Exactly one HTTP call is made; redirects
    /// are returned as rejections, not followed.
    ///
    /// Any HTTP response, successful or not, yields `Ok`; inspect
    /// [`SubmissionResult::succeeded`]. Connection, DNS, and timeout errors
    /// yield [`RemediationError::TransportFailure`].
    pub async fn submit(
        &self,
        request: &WorkflowRequest,
        credential: &Credential,
    ) -> Result<SubmissionResult, RemediationError> {
        debug!(
            endpoint = %self.endpoint,
            request_id = %request.request_id(),
            "Submitting workflow"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| transport_failure(&self.endpoint, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure(&self.endpoint, &e))?;

        let result = SubmissionResult {
            succeeded: status.is_success(),
            http_status: status.as_u16(),
            body,
        };

        if result.succeeded {
            info!(
                status = result.http_status,
                request_id = %request.request_id(),
                "Workflow API accepted submission"
            );
        } else {
            warn!(
                status = result.http_status,
                request_id = %request.request_id(),
                body = %result.body,
                "Workflow API rejected submission"
            );
        }

        Ok(result)
    }
}

fn transport_failure(endpoint: &str, err: &reqwest::Error) -> RemediationError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "request"
    };
    warn!(endpoint = %endpoint, kind, error = %err, "Workflow API unreachable");
    RemediationError::TransportFailure(format!("{kind} error: {err}"))
}
