//! Alert-to-remediation dispatcher.
//!
//! Receives runtime security alerts (Falco and compatible sources) on
//! `POST /webhook` and, when an alert matches the configured
//! [`RemediationPolicy`](policy::RemediationPolicy), submits a remediation
//! workflow to the Argo Workflows API.
//!
//! # Pipeline
//!
//! - [`alert`] decodes the payload and resolves the resource identifier
//! - [`policy`] decides whether the alert is actionable
//! - [`credentials`] reads the bearer token for the workflow API
//! - [`workflow`] builds the inline or template-backed workflow request
//! - [`submitter`] posts it to Argo
//! - [`dispatcher`] and [`server`] tie the stages to HTTP
//!
//! # Configuration
//!
//! See [`config::Args`]; every flag is also read from the environment.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod server;
pub mod submitter;
pub mod workflow;

pub use alert::{decode, AlertEvent};
pub use config::{Args, Config};
pub use credentials::{Credential, FileTokenSource, TokenSource};
pub use dispatcher::{Dispatcher, Outcome};
pub use error::{ConfigError, RemediationError};
pub use policy::{matches, RemediationPolicy};
pub use server::{build_router, AppState};
pub use submitter::{ArgoClient, SubmissionResult};
pub use workflow::{WorkflowBuilder, WorkflowMode, WorkflowRequest};
