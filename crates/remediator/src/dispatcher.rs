//! Alert-to-workflow pipeline.
//!
//! Per request: authenticate, decode, match, then (only on a match) fetch
//! the token, build, and submit. Every stage either advances or ends the
//! request with a [`RemediationError`]; nothing is retried.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::alert;
use crate::config::Config;
use crate::credentials::{FileTokenSource, TokenSource};
use crate::error::{ConfigError, RemediationError};
use crate::policy::{self, RemediationPolicy};
use crate::submitter::{ArgoClient, SubmissionResult};
use crate::workflow::WorkflowBuilder;

/// Result of a fully handled alert.
#[derive(Debug)]
pub enum Outcome {
    /// Alert decoded but did not satisfy the policy
    NotActionable,
    /// Workflow submitted and accepted
    Triggered {
        /// Resource the workflow targets
        identifier: String,
        /// Request id stamped on the workflow
        request_id: String,
        /// Workflow API response
        submission: SubmissionResult,
    },
}

/// Drives a single alert through the pipeline.
pub struct Dispatcher {
    policy: RemediationPolicy,
    builder: WorkflowBuilder,
    tokens: Arc<dyn TokenSource>,
    client: ArgoClient,
    webhook_secret: Option<String>,
}

impl Dispatcher {
    /// Assemble a dispatcher from explicit parts.
    #[must_use]
    pub fn new(
        policy: RemediationPolicy,
        builder: WorkflowBuilder,
        tokens: Arc<dyn TokenSource>,
        client: ArgoClient,
    ) -> Self {
        Self {
            policy,
            builder,
            tokens,
            client,
            webhook_secret: None,
        }
    }

    /// Require `secret` in the `Authorization` header.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Build a dispatcher from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = match &config.ca_cert_path {
            Some(ca) => {
                ArgoClient::with_ca_cert(&config.argo_workflow_api, config.request_timeout, ca)?
            }
            None => ArgoClient::new(&config.argo_workflow_api, config.request_timeout)?,
        };

        Ok(Self::new(
            config.policy.clone(),
            config.workflow_builder(),
            Arc::new(FileTokenSource::new(&config.token_path)),
            client,
        )
        .with_webhook_secret(config.webhook_secret.clone()))
    }

    /// Check the shared secret, if one is configured.
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), RemediationError> {
        let Some(expected) = &self.webhook_secret else {
            return Ok(());
        };

        let ok = provided
            .is_some_and(|value| bool::from(value.as_bytes().ct_eq(expected.as_bytes())));
        if ok {
            Ok(())
        } else {
            warn!(present = provided.is_some(), "Webhook shared secret check failed");
            Err(RemediationError::Unauthorized)
        }
    }

    /// Run an authenticated body through decode, match, and submit.
    pub async fn dispatch(&self, body: &[u8]) -> Result<Outcome, RemediationError> {
        let event = alert::decode(body, &self.policy.identifier_path).map_err(|e| {
            warn!(error = %e, "Rejecting malformed alert payload");
            e
        })?;

        debug!(payload = %event.raw, "Received alert");

        if !policy::matches(&event, &self.policy) {
            info!(
                rule = %event.rule(),
                priority = ?event.priority,
                identifier = ?event.resource_identifier,
                "Alert received, not actionable"
            );
            return Ok(Outcome::NotActionable);
        }

        // `matches` guarantees a valid resource name.
        let identifier = event.resource_identifier.clone().unwrap_or_default();
        info!(
            rule = %event.rule(),
            identifier = %identifier,
            mode = self.builder.mode().as_str(),
            "Triggering remediation workflow"
        );

        let credential = self.tokens.fetch_token().await.map_err(|e| {
            error!(
                error = %e,
                "Cannot authenticate to workflow API; remediation is non-functional"
            );
            e
        })?;

        let request = self.builder.build(&identifier);
        let request_id = request.request_id().to_string();
        let submission = self
            .client
            .submit(&request, &credential)
            .await?
            .into_result()?;

        Ok(Outcome::Triggered {
            identifier,
            request_id,
            submission,
        })
    }
}
