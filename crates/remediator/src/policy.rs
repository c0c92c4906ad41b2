//! Remediation policy and alert matching.

use crate::alert::AlertEvent;

/// Default priority that warrants remediation.
pub const DEFAULT_TRIGGER_PRIORITY: &str = "Critical";

/// Default location of the pod name in a Falco payload.
pub const DEFAULT_IDENTIFIER_PATH: &str = "output_fields.k8s.pod.name";

/// Maximum length of a Kubernetes object name (DNS-1123 subdomain).
const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Decides which alerts trigger a remediation workflow.
///
/// Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPolicy {
    /// Exact (case-sensitive) priority value that triggers remediation
    pub trigger_priority: String,
    /// Dotted path to the resource identifier inside the payload
    pub identifier_path: String,
    /// Optional substring the alert `output` must contain
    pub output_contains: Option<String>,
}

impl RemediationPolicy {
    /// Policy matching a priority and identifier path, with no output filter.
    #[must_use]
    pub fn new(trigger_priority: impl Into<String>, identifier_path: impl Into<String>) -> Self {
        Self {
            trigger_priority: trigger_priority.into(),
            identifier_path: identifier_path.into(),
            output_contains: None,
        }
    }

    /// Additionally require `needle` in the alert output.
    #[must_use]
    pub fn with_output_contains(mut self, needle: impl Into<String>) -> Self {
        self.output_contains = Some(needle.into());
        self
    }
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PRIORITY, DEFAULT_IDENTIFIER_PATH)
    }
}

/// Whether `event` warrants remediation under `policy`.
///
/// True iff the priority equals the trigger value, the identifier is present
/// and a valid resource name, and (when configured) the output contains the
/// filter text.
#[must_use]
pub fn matches(event: &AlertEvent, policy: &RemediationPolicy) -> bool {
    let Some(priority) = event.priority.as_deref() else {
        return false;
    };
    if priority != policy.trigger_priority {
        return false;
    }

    if !event
        .resource_identifier
        .as_deref()
        .is_some_and(is_valid_resource_name)
    {
        return false;
    }

    match &policy.output_contains {
        Some(needle) => event
            .output
            .as_deref()
            .is_some_and(|output| output.contains(needle.as_str())),
        None => true,
    }
}

/// Whether `name` is a valid Kubernetes object name (RFC 1123 subdomain):
/// lowercase alphanumerics, `-` and `.`, starting and ending alphanumeric.
#[must_use]
pub fn is_valid_resource_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    bytes.len() <= MAX_RESOURCE_NAME_LEN
        && is_lower_alnum(*first)
        && is_lower_alnum(*last)
        && bytes
            .iter()
            .all(|&b| is_lower_alnum(b) || b == b'-' || b == b'.')
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(priority: Option<&str>, id: Option<&str>, output: Option<&str>) -> AlertEvent {
        AlertEvent {
            priority: priority.map(str::to_string),
            output: output.map(str::to_string),
            resource_identifier: id.map(str::to_string),
            raw: json!({}),
        }
    }

    #[test]
    fn test_matching_priority_and_identifier() {
        let policy = RemediationPolicy::default();
        assert!(matches(&event(Some("Critical"), Some("web-1"), None), &policy));
    }

    #[test]
    fn test_absent_priority_never_matches() {
        let policy = RemediationPolicy::default();
        assert!(!matches(&event(None, Some("web-1"), None), &policy));
    }

    #[test]
    fn test_priority_is_case_sensitive() {
        let policy = RemediationPolicy::default();
        assert!(!matches(&event(Some("critical"), Some("web-1"), None), &policy));
        assert!(!matches(&event(Some("Warning"), Some("web-1"), None), &policy));
    }

    #[test]
    fn test_missing_or_empty_identifier_never_matches() {
        let policy = RemediationPolicy::default();
        assert!(!matches(&event(Some("Critical"), None, None), &policy));
        assert!(!matches(&event(Some("Critical"), Some(""), None), &policy));
    }

    #[test]
    fn test_shell_metacharacters_never_match() {
        let policy = RemediationPolicy::default();
        for id in [
            "x; kubectl delete ns kube-system",
            "web-1 && rm -rf /",
            "$(id)",
            "`id`",
            "web-1\nreboot",
            "--all",
        ] {
            assert!(
                !matches(&event(Some("Critical"), Some(id), None), &policy),
                "{id:?} should not match"
            );
        }
    }

    #[test]
    fn test_resource_name_validation() {
        assert!(is_valid_resource_name("web-1"));
        assert!(is_valid_resource_name("api-7d9f.canary"));
        assert!(is_valid_resource_name("0"));
        assert!(is_valid_resource_name(&"a".repeat(253)));

        assert!(!is_valid_resource_name(""));
        assert!(!is_valid_resource_name("Web-1"));
        assert!(!is_valid_resource_name("-web"));
        assert!(!is_valid_resource_name("web-"));
        assert!(!is_valid_resource_name("web 1"));
        assert!(!is_valid_resource_name(&"a".repeat(254)));
    }

    #[test]
    fn test_configurable_trigger_priority() {
        let policy = RemediationPolicy::new("Warning", DEFAULT_IDENTIFIER_PATH);
        assert!(matches(&event(Some("Warning"), Some("web-1"), None), &policy));
        assert!(!matches(&event(Some("Critical"), Some("web-1"), None), &policy));
    }

    #[test]
    fn test_output_filter() {
        let policy = RemediationPolicy::default().with_output_contains("shell");

        assert!(matches(
            &event(Some("Critical"), Some("web-1"), Some("A shell was spawned")),
            &policy
        ));
        assert!(!matches(
            &event(Some("Critical"), Some("web-1"), Some("File opened for writing")),
            &policy
        ));
        assert!(!matches(&event(Some("Critical"), Some("web-1"), None), &policy));
    }
}
