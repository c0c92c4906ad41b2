//! Service configuration.
//!
//! All settings come from command-line flags, each backed by an environment
//! variable, and are read once at startup. The validated [`Config`] is
//! immutable for the life of the process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::credentials::DEFAULT_TOKEN_PATH;
use crate::error::ConfigError;
use crate::policy::{RemediationPolicy, DEFAULT_IDENTIFIER_PATH, DEFAULT_TRIGGER_PRIORITY};
use crate::submitter::{DEFAULT_ARGO_WORKFLOW_API, DEFAULT_TIMEOUT_SECS};
use crate::workflow::{
    WorkflowBuilder, WorkflowMode, DEFAULT_GENERATE_NAME, DEFAULT_PARAMETER_NAME,
    DEFAULT_REMEDIATION_IMAGE, DEFAULT_SERVICE_ACCOUNT,
};

/// Default webhook listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

/// Default inbound body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Alert-to-remediation dispatcher - triggers Argo Workflows from security alerts
#[derive(Debug, Clone, Parser)]
#[command(name = "remediator")]
#[command(version)]
pub struct Args {
    /// Address the webhook server binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Argo Workflows create endpoint
    #[arg(long, env = "ARGO_WORKFLOW_API", default_value = DEFAULT_ARGO_WORKFLOW_API)]
    pub argo_workflow_api: String,

    /// Shared secret expected in the Authorization header (disabled when unset)
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Alert priority that triggers remediation (exact match)
    #[arg(long, env = "TRIGGER_PRIORITY", default_value = DEFAULT_TRIGGER_PRIORITY)]
    pub trigger_priority: String,

    /// Dotted path to the resource identifier in the alert payload
    #[arg(long, env = "IDENTIFIER_PATH", default_value = DEFAULT_IDENTIFIER_PATH)]
    pub identifier_path: String,

    /// Only remediate alerts whose output contains this text
    #[arg(long, env = "TRIGGER_OUTPUT_CONTAINS")]
    pub output_contains: Option<String>,

    /// Workflow mode: inline or template
    #[arg(long, env = "WORKFLOW_MODE", default_value = "inline")]
    pub mode: String,

    /// WorkflowTemplate name (template mode)
    #[arg(long, env = "WORKFLOW_TEMPLATE_NAME")]
    pub template_name: Option<String>,

    /// generateName prefix for created workflows
    #[arg(long, env = "WORKFLOW_GENERATE_NAME", default_value = DEFAULT_GENERATE_NAME)]
    pub generate_name: String,

    /// Workflow parameter that carries the resource identifier
    #[arg(long, env = "WORKFLOW_PARAMETER_NAME", default_value = DEFAULT_PARAMETER_NAME)]
    pub parameter_name: String,

    /// Service account for inline workflows
    #[arg(long, env = "WORKFLOW_SERVICE_ACCOUNT", default_value = DEFAULT_SERVICE_ACCOUNT)]
    pub service_account: String,

    /// Image for the inline delete step
    #[arg(long, env = "REMEDIATION_IMAGE", default_value = DEFAULT_REMEDIATION_IMAGE)]
    pub remediation_image: String,

    /// File holding the bearer token for the workflow API
    #[arg(long, env = "ARGO_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
    pub token_path: PathBuf,

    /// PEM root certificate to trust for the workflow API
    #[arg(long, env = "ARGO_CA_CERT_PATH")]
    pub ca_cert_path: Option<PathBuf>,

    /// Workflow API request timeout in seconds
    #[arg(long, env = "ARGO_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Maximum accepted webhook body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub listen_addr: SocketAddr,
    /// Argo Workflows create endpoint
    pub argo_workflow_api: String,
    /// Shared webhook secret
    pub webhook_secret: Option<String>,
    /// Matching policy
    pub policy: RemediationPolicy,
    /// Workflow shape
    pub mode: WorkflowMode,
    /// generateName prefix
    pub generate_name: String,
    /// Identifier parameter name
    pub parameter_name: String,
    /// Token file
    pub token_path: PathBuf,
    /// Extra CA root
    pub ca_cert_path: Option<PathBuf>,
    /// Submission timeout
    pub request_timeout: Duration,
    /// Inbound body limit
    pub max_body_bytes: usize,
}

impl Config {
    /// Defaults targeting `argo_workflow_api`.
    #[must_use]
    pub fn new(argo_workflow_api: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            argo_workflow_api: argo_workflow_api.into(),
            webhook_secret: None,
            policy: RemediationPolicy::default(),
            mode: WorkflowMode::default(),
            generate_name: DEFAULT_GENERATE_NAME.to_string(),
            parameter_name: DEFAULT_PARAMETER_NAME.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            ca_cert_path: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Validate parsed arguments.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        reqwest::Url::parse(&args.argo_workflow_api).map_err(|e| ConfigError::InvalidUrl {
            url: args.argo_workflow_api.clone(),
            reason: e.to_string(),
        })?;

        let trigger_priority = non_empty(args.trigger_priority, "TRIGGER_PRIORITY")?;
        let identifier_path = non_empty(args.identifier_path, "IDENTIFIER_PATH")?;
        let generate_name = non_empty(args.generate_name, "WORKFLOW_GENERATE_NAME")?;
        let parameter_name = non_empty(args.parameter_name, "WORKFLOW_PARAMETER_NAME")?;

        let mode = match args.mode.trim().to_ascii_lowercase().as_str() {
            "inline" => WorkflowMode::Inline {
                service_account: non_empty(args.service_account, "WORKFLOW_SERVICE_ACCOUNT")?,
                image: non_empty(args.remediation_image, "REMEDIATION_IMAGE")?,
            },
            "template" => WorkflowMode::Template {
                name: args
                    .template_name
                    .filter(|n| !n.trim().is_empty())
                    .ok_or(ConfigError::MissingTemplateName)?,
            },
            other => return Err(ConfigError::UnknownMode(other.to_string())),
        };

        if args.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut policy = RemediationPolicy::new(trigger_priority, identifier_path);
        if let Some(needle) = args.output_contains.filter(|s| !s.is_empty()) {
            policy = policy.with_output_contains(needle);
        }

        Ok(Self {
            listen_addr: args.listen_addr,
            argo_workflow_api: args.argo_workflow_api,
            webhook_secret: args.webhook_secret.filter(|s| !s.is_empty()),
            policy,
            mode,
            generate_name,
            parameter_name,
            token_path: args.token_path,
            ca_cert_path: args.ca_cert_path,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            max_body_bytes: args.max_body_bytes,
        })
    }

    /// Workflow builder for this configuration.
    #[must_use]
    pub fn workflow_builder(&self) -> WorkflowBuilder {
        WorkflowBuilder::new(self.mode.clone())
            .with_generate_name(&self.generate_name)
            .with_parameter_name(&self.parameter_name)
    }
}

fn non_empty(value: String, name: &'static str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(name))
    } else {
        Ok(value)
    }
}
