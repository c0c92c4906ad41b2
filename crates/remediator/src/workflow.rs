//! Argo Workflow request construction.
//!
//! Two shapes are supported:
//! - **Inline**: the full remediation workflow is embedded in the request
//!   (a single `delete-pod` step running `kubectl`).
//! - **Template**: the request references a pre-registered
//!   `WorkflowTemplate` and only supplies arguments.
//!
//! Either way the workflow object uses `generateName`, so concurrent
//! submissions never collide on object name.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

/// Argo Workflows API version.
const API_VERSION: &str = "argoproj.io/v1alpha1";

/// Argo Workflow kind.
const KIND: &str = "Workflow";

/// Entrypoint template of the inline workflow.
const ENTRYPOINT: &str = "respond-to-alert";

/// Remediation step template of the inline workflow.
const DELETE_STEP: &str = "delete-pod";

/// Delete step entrypoint. The identifier is passed as a single argv entry,
/// never through a shell.
const DELETE_COMMAND: [&str; 3] = ["kubectl", "delete", "pod"];

/// Label carrying the per-submission request id.
pub const REQUEST_ID_LABEL: &str = "remediator.io/request-id";

/// Default `generateName` prefix.
pub const DEFAULT_GENERATE_NAME: &str = "falco-alert-response-";

/// Default parameter carrying the resource identifier.
pub const DEFAULT_PARAMETER_NAME: &str = "pod-name";

/// Default service account for inline workflows.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "pod-deleter";

/// Default image for the inline delete step.
pub const DEFAULT_REMEDIATION_IMAGE: &str = "bitnami/kubectl:latest";

/// How the remediation workflow is described to Argo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowMode {
    /// Embed the whole workflow definition
    Inline {
        /// Service account the workflow pods run as
        service_account: String,
        /// Container image providing `kubectl`
        image: String,
    },
    /// Reference a registered `WorkflowTemplate`
    Template {
        /// Template name
        name: String,
    },
}

impl WorkflowMode {
    /// Short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline { .. } => "inline",
            Self::Template { .. } => "template",
        }
    }
}

impl Default for WorkflowMode {
    fn default() -> Self {
        Self::Inline {
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            image: DEFAULT_REMEDIATION_IMAGE.to_string(),
        }
    }
}

/// Builds [`WorkflowRequest`]s for a fixed mode.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    mode: WorkflowMode,
    generate_name: String,
    parameter_name: String,
}

impl WorkflowBuilder {
    /// Create a builder with default naming.
    #[must_use]
    pub fn new(mode: WorkflowMode) -> Self {
        Self {
            mode,
            generate_name: DEFAULT_GENERATE_NAME.to_string(),
            parameter_name: DEFAULT_PARAMETER_NAME.to_string(),
        }
    }

    /// Override the `generateName` prefix.
    #[must_use]
    pub fn with_generate_name(mut self, prefix: impl Into<String>) -> Self {
        self.generate_name = prefix.into();
        self
    }

    /// Override the parameter name that carries the identifier.
    #[must_use]
    pub fn with_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = name.into();
        self
    }

    /// Configured mode.
    #[must_use]
    pub fn mode(&self) -> &WorkflowMode {
        &self.mode
    }

    /// Build the request for `identifier`.
    #[must_use]
    pub fn build(&self, identifier: &str) -> WorkflowRequest {
        let arguments = Arguments {
            parameters: vec![Parameter::with_value(&self.parameter_name, identifier)],
        };

        let spec = match &self.mode {
            WorkflowMode::Inline {
                service_account,
                image,
            } => WorkflowSpec::Inline(self.inline_spec(service_account, image, arguments)),
            WorkflowMode::Template { name } => WorkflowSpec::Template(TemplateWorkflowSpec {
                workflow_template_ref: TemplateRef { name: name.clone() },
                arguments,
            }),
        };

        let mut labels = BTreeMap::new();
        labels.insert(REQUEST_ID_LABEL.to_string(), Uuid::new_v4().to_string());

        WorkflowRequest {
            workflow: Workflow {
                api_version: API_VERSION,
                kind: KIND,
                metadata: ObjectMeta {
                    generate_name: self.generate_name.clone(),
                    labels,
                },
                spec,
            },
        }
    }

    fn inline_spec(
        &self,
        service_account: &str,
        image: &str,
        arguments: Arguments,
    ) -> InlineWorkflowSpec {
        let param = &self.parameter_name;
        let input_ref = format!("{{{{inputs.parameters.{param}}}}}");

        let entry = Template {
            name: ENTRYPOINT.to_string(),
            inputs: Inputs {
                parameters: vec![Parameter::named(param)],
            },
            steps: Some(vec![vec![Step {
                name: DELETE_STEP.to_string(),
                template: DELETE_STEP.to_string(),
                arguments: Arguments {
                    parameters: vec![Parameter::with_value(param, &input_ref)],
                },
            }]]),
            container: None,
        };

        let delete = Template {
            name: DELETE_STEP.to_string(),
            inputs: Inputs {
                parameters: vec![Parameter::named(param)],
            },
            steps: None,
            container: Some(Container {
                image: image.to_string(),
                command: DELETE_COMMAND.iter().map(ToString::to_string).collect(),
                args: vec![input_ref],
            }),
        };

        InlineWorkflowSpec {
            service_account_name: service_account.to_string(),
            entrypoint: ENTRYPOINT.to_string(),
            arguments,
            templates: vec![entry, delete],
        }
    }
}

/// Body of `POST /api/v1/workflows/{namespace}`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRequest {
    /// Workflow object to create
    pub workflow: Workflow,
}

impl WorkflowRequest {
    /// Unique id stamped on this request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.workflow
            .metadata
            .labels
            .get(REQUEST_ID_LABEL)
            .map_or("", String::as_str)
    }

    /// `generateName` prefix.
    #[must_use]
    pub fn generate_name(&self) -> &str {
        &self.workflow.metadata.generate_name
    }

    /// Value of a workflow argument.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.workflow
            .spec
            .arguments()
            .parameters
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value.as_deref())
    }
}

/// Argo `Workflow` resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// `argoproj.io/v1alpha1`
    pub api_version: &'static str,
    /// `Workflow`
    pub kind: &'static str,
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Workflow spec
    pub spec: WorkflowSpec,
}

/// Subset of Kubernetes object metadata used here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Name prefix; the API server appends a random suffix
    pub generate_name: String,
    /// Object labels
    pub labels: BTreeMap<String, String>,
}

/// Workflow spec, inline or template-backed. Never both.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowSpec {
    /// Full definition
    Inline(InlineWorkflowSpec),
    /// Reference to a `WorkflowTemplate`
    Template(TemplateWorkflowSpec),
}

impl WorkflowSpec {
    /// Top-level workflow arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        match self {
            Self::Inline(spec) => &spec.arguments,
            Self::Template(spec) => &spec.arguments,
        }
    }
}

/// Self-contained workflow spec.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineWorkflowSpec {
    /// Service account for workflow pods
    pub service_account_name: String,
    /// Template to start from
    pub entrypoint: String,
    /// Workflow arguments
    pub arguments: Arguments,
    /// Template definitions
    pub templates: Vec<Template>,
}

/// Template-backed workflow spec.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateWorkflowSpec {
    /// Registered template
    pub workflow_template_ref: TemplateRef,
    /// Workflow arguments
    pub arguments: Arguments,
}

/// `workflowTemplateRef`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateRef {
    /// Template name
    pub name: String,
}

/// Argument list.
#[derive(Debug, Clone, Serialize)]
pub struct Arguments {
    /// Parameters
    pub parameters: Vec<Parameter>,
}

/// A named parameter, optionally with a value.
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Parameter {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

/// Template inputs.
#[derive(Debug, Clone, Serialize)]
pub struct Inputs {
    /// Declared input parameters
    pub parameters: Vec<Parameter>,
}

/// A workflow template definition.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    /// Template name
    pub name: String,
    /// Inputs
    pub inputs: Inputs,
    /// Step groups (steps template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Vec<Step>>>,
    /// Container (container template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
}

/// A step invoking another template.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    /// Step name
    pub name: String,
    /// Template to invoke
    pub template: String,
    /// Arguments passed to the template
    pub arguments: Arguments,
}

/// Container definition.
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    /// Image
    pub image: String,
    /// Entrypoint command
    pub command: Vec<String>,
    /// Arguments
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_json(request: &WorkflowRequest) -> Value {
        serde_json::to_value(request).unwrap()
    }

    #[test]
    fn test_inline_request_shape() {
        let request = WorkflowBuilder::new(WorkflowMode::default()).build("web-1");
        let body = to_json(&request);
        let wf = &body["workflow"];

        assert_eq!(wf["apiVersion"], "argoproj.io/v1alpha1");
        assert_eq!(wf["kind"], "Workflow");
        assert_eq!(wf["metadata"]["generateName"], "falco-alert-response-");
        assert_eq!(wf["spec"]["serviceAccountName"], "pod-deleter");
        assert_eq!(wf["spec"]["entrypoint"], "respond-to-alert");
        assert_eq!(
            wf["spec"]["arguments"]["parameters"],
            json!([{"name": "pod-name", "value": "web-1"}])
        );
        assert!(wf["spec"].get("workflowTemplateRef").is_none());

        let delete = &wf["spec"]["templates"][1];
        assert_eq!(delete["name"], "delete-pod");
        assert_eq!(delete["container"]["image"], "bitnami/kubectl:latest");
        assert_eq!(
            delete["container"]["command"],
            json!(["kubectl", "delete", "pod"])
        );
        assert_eq!(
            delete["container"]["args"],
            json!(["{{inputs.parameters.pod-name}}"])
        );

        let step = &wf["spec"]["templates"][0]["steps"][0][0];
        assert_eq!(step["template"], "delete-pod");
        assert_eq!(
            step["arguments"]["parameters"][0]["value"],
            "{{inputs.parameters.pod-name}}"
        );
    }

    #[test]
    fn test_template_request_shape() {
        let mode = WorkflowMode::Template {
            name: "falco-alert-response-template".to_string(),
        };
        let request = WorkflowBuilder::new(mode).build("web-1");
        let body = to_json(&request);
        let spec = &body["workflow"]["spec"];

        assert_eq!(
            spec["workflowTemplateRef"]["name"],
            "falco-alert-response-template"
        );
        assert_eq!(spec["arguments"]["parameters"][0]["value"], "web-1");
        assert!(spec.get("templates").is_none());
        assert!(spec.get("entrypoint").is_none());
    }

    #[test]
    fn test_custom_parameter_and_prefix() {
        let request = WorkflowBuilder::new(WorkflowMode::default())
            .with_generate_name("quarantine-")
            .with_parameter_name("target")
            .build("db-0");

        assert_eq!(request.generate_name(), "quarantine-");
        assert_eq!(request.parameter("target"), Some("db-0"));
        assert_eq!(request.parameter("pod-name"), None);

        let body = to_json(&request);
        assert_eq!(
            body["workflow"]["spec"]["templates"][1]["container"]["args"],
            json!(["{{inputs.parameters.target}}"])
        );
    }

    #[test]
    fn test_delete_step_never_uses_a_shell() {
        let request = WorkflowBuilder::new(WorkflowMode::default()).build("web-1");
        let body = to_json(&request);

        for template in body["workflow"]["spec"]["templates"].as_array().unwrap() {
            let Some(command) = template["container"]["command"].as_array() else {
                continue;
            };
            assert!(!command.iter().any(|c| c == "sh" || c == "-c"));
        }
    }

    #[test]
    fn test_consecutive_builds_have_distinct_identities() {
        let builder = WorkflowBuilder::new(WorkflowMode::default());
        let first = builder.build("web-1");
        let second = builder.build("web-1");

        assert!(!first.request_id().is_empty());
        assert_ne!(first.request_id(), second.request_id());
        assert_eq!(first.generate_name(), second.generate_name());
        assert_eq!(first.parameter("pod-name"), second.parameter("pod-name"));
    }
}
