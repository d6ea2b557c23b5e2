use serde::{Deserialize, Serialize};

/// What kind of Kubernetes (or higher-level) entity an alert's labels
/// identify. Drives which playbook the pipeline dispatches to (§4.3/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Pod,
    Workload,
    Service,
    Node,
    Cluster,
    Unknown,
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Unknown
    }
}

/// The resolved identity of the thing an alert is about, derived from its
/// labels by the target-parsing stage of the pipeline. Every field is
/// best-effort: labels are free text set by whoever wrote the scrape config
/// or alerting rule, so absence is normal, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetRef {
    #[serde(default)]
    pub target_type: TargetType,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    pub playbook: Option<String>,
    pub workload_kind: Option<String>,
    pub workload_name: Option<String>,
    pub service: Option<String>,
    pub instance: Option<String>,
    pub job: Option<String>,
    pub cluster: Option<String>,
    pub team: Option<String>,
    pub environment: Option<String>,
}

impl TargetRef {
    /// Whether we have enough K8s identity to scope pod-level evidence
    /// queries (namespace + one of pod/workload).
    pub fn has_k8s_identity(&self) -> bool {
        self.namespace.is_some() && (self.pod.is_some() || self.workload_name.is_some())
    }
}
