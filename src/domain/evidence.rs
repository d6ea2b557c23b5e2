//! Evidence payloads are intentionally permissive (`#[serde(flatten)]` into
//! an open map) because upstream data sources and label conventions vary
//! widely across clusters — mirrors `BaseModelAllowExtra` in the Python
//! original.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Fallback bucket for provider-specific fields this struct doesn't name
/// explicitly. Every evidence struct flattens one of these so unexpected
/// upstream fields survive round-trips instead of being silently dropped.
pub type ExtraFields = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct K8sEvidence {
    pub pod_info: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub pod_conditions: Vec<HashMap<String, Value>>,
    #[serde(default)]
    pub pod_events: Vec<HashMap<String, Value>>,
    pub owner_chain: Option<HashMap<String, Value>>,
    pub rollout_status: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsEvidence {
    pub throttling_data: Option<HashMap<String, Value>>,
    pub cpu_metrics: Option<HashMap<String, Value>>,
    pub memory_metrics: Option<HashMap<String, Value>>,
    pub restart_data: Option<HashMap<String, Value>>,
    pub pod_phase_signal: Option<HashMap<String, Value>>,
    pub http_5xx: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsEvidence {
    #[serde(default)]
    pub logs: Vec<HashMap<String, Value>>,
    pub logs_status: Option<String>,
    pub logs_reason: Option<String>,
    pub logs_backend: Option<String>,
    pub logs_query: Option<String>,
    /// ERROR/FATAL/Exception patterns extracted from `logs`.
    pub parsed_errors: Option<Vec<HashMap<String, Value>>>,
    /// Parsing stats: total_lines, error_count, fatal_count, exception_count.
    pub parsing_metadata: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// AWS infrastructure evidence (EC2, EBS, ELB, RDS, ECR, networking,
/// CloudTrail).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsEvidence {
    #[serde(default)]
    pub ec2_instances: HashMap<String, Value>,
    #[serde(default)]
    pub ebs_volumes: HashMap<String, Value>,
    #[serde(default)]
    pub elb_health: HashMap<String, Value>,
    #[serde(default)]
    pub rds_instances: HashMap<String, Value>,
    #[serde(default)]
    pub ecr_images: HashMap<String, Value>,
    #[serde(default)]
    pub networking: HashMap<String, Value>,
    /// Extracted AWS resource IDs.
    pub metadata: Option<HashMap<String, Value>>,
    /// Raw CloudTrail events, chronological.
    pub cloudtrail_events: Option<Vec<HashMap<String, Value>>>,
    /// CloudTrail events grouped by category for presentation.
    pub cloudtrail_grouped: Option<HashMap<String, Vec<HashMap<String, Value>>>>,
    /// CloudTrail query metadata (time_window, event_count, query_duration).
    pub cloudtrail_metadata: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// GitHub code-change evidence (commits, workflows, docs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubEvidence {
    /// "org/repo".
    pub repo: Option<String>,
    /// "annotation", "helm", "catalog", etc.
    pub repo_discovery_method: Option<String>,
    #[serde(default)]
    pub is_third_party: bool,
    #[serde(default)]
    pub recent_commits: Vec<HashMap<String, Value>>,
    #[serde(default)]
    pub workflow_runs: Vec<HashMap<String, Value>>,
    pub failed_workflow_logs: Option<String>,
    pub readme: Option<String>,
    #[serde(default)]
    pub docs: Vec<HashMap<String, Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub k8s: K8sEvidence,
    #[serde(default)]
    pub metrics: MetricsEvidence,
    #[serde(default)]
    pub logs: LogsEvidence,
    #[serde(default)]
    pub aws: AwsEvidence,
    #[serde(default)]
    pub github: GitHubEvidence,
    #[serde(flatten)]
    pub extra: ExtraFields,
}
