//! Everything the agent itself computes: change correlation, noise
//! insights, capacity reports, the deterministic decision/verdict, and the
//! derived-feature summary diagnostics and scoring read from. Unlike
//! [`super::evidence`], these shapes are closed (`deny_unknown_fields`) —
//! the agent owns every field here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeEvent {
    pub timestamp: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    #[serde(default = "default_kubernetes_source")]
    pub source: String,
}

fn default_kubernetes_source() -> String {
    "kubernetes".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeTimeline {
    #[serde(default = "default_kubernetes_source")]
    pub source: String,
    pub workload: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub events: Vec<ChangeEvent>,
    pub last_change_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeCorrelation {
    pub has_recent_change: Option<bool>,
    pub score: Option<f64>,
    pub summary: Option<String>,
    pub last_change_time: Option<String>,
    pub timeline: Option<ChangeTimeline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseFlapInsights {
    pub lookback: String,
    pub flaps_estimate: Option<f64>,
    #[serde(default)]
    pub flap_score_0_100: i32,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseCardinalityInsights {
    #[serde(default)]
    pub ephemeral_labels_present: Vec<String>,
    #[serde(default)]
    pub recommended_group_by: Vec<String>,
    #[serde(default)]
    pub recommended_drop_labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseMissingLabelsInsights {
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub inferred: Vec<String>,
    #[serde(default)]
    pub recommendation: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseInsights {
    pub label_shape: Option<HashMap<String, Value>>,
    pub prometheus: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub flap: Option<NoiseFlapInsights>,
    pub cardinality: Option<NoiseCardinalityInsights>,
    pub missing_labels: Option<NoiseMissingLabelsInsights>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityReport {
    pub status: Option<String>,
    pub error: Option<String>,
    pub scope: Option<HashMap<String, Value>>,
    pub queries_used: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub rightsizing_cpu: Option<Vec<HashMap<String, Value>>>,
    pub top_cpu_over_request: Option<Vec<HashMap<String, Value>>>,
    pub top_cpu_under_request: Option<Vec<HashMap<String, Value>>>,
    pub top_mem_over_request: Option<Vec<HashMap<String, Value>>>,
    pub top_mem_under_request: Option<Vec<HashMap<String, Value>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Decision {
    pub label: Option<String>,
    #[serde(default)]
    pub why: Vec<String>,
    #[serde(default)]
    pub next: Vec<String>,
}

/// Placeholder for policy-gated action proposals (approval required).
/// Action execution is intentionally out of scope for the deterministic
/// core — see spec.md Non-goals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionProposal {
    pub action_type: String,
    pub title: String,
    pub risk: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub execution_payload: HashMap<String, Value>,
}

/// A deterministic, evidence-cited diagnosis candidate. Designed to be
/// portable across organizations (no hard dependency on ownership/catalog
/// metadata) and explainable (why + refs), so it's usable by both reports
/// and any future tool-using chat surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hypothesis {
    pub hypothesis_id: String,
    pub title: String,
    #[serde(default)]
    pub confidence_0_100: i32,
    #[serde(default)]
    pub why: Vec<String>,
    #[serde(default)]
    pub supporting_refs: Vec<String>,
    #[serde(default)]
    pub counter_refs: Vec<String>,
    #[serde(default)]
    pub next_tests: Vec<String>,
    #[serde(default)]
    pub proposed_actions: Vec<ActionProposal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStatus {
    Ok,
    Disabled,
    Unavailable,
    Error,
    RateLimited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmInsights {
    pub provider: String,
    pub status: LlmStatus,
    pub model: Option<String>,
    pub error: Option<String>,
    pub output: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RcaStatus {
    Ok,
    Unknown,
    Blocked,
    Unavailable,
    Error,
}

impl Default for RcaStatus {
    fn default() -> Self {
        RcaStatus::Unknown
    }
}

/// Structured root-cause + remediation output. Intentionally
/// provider-agnostic and grounded only in evidence already present on the
/// investigation (plus any explicitly captured tool results) — see
/// spec.md's Non-goal on free-text LLM narration replacing the
/// deterministic verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RcaInsights {
    #[serde(default)]
    pub status: RcaStatus,
    pub summary: Option<String>,
    pub root_cause: Option<String>,
    pub confidence_0_1: Option<f64>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub remediation: Vec<String>,
    #[serde(default)]
    pub unknowns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugInfo {
    #[serde(default)]
    pub promql: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sConditionSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sContainerWaiting {
    pub container: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sContainerLastTerminated {
    pub container: String,
    pub reason: Option<String>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K8sEventSummary {
    pub reason: Option<String>,
    pub count: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesK8s {
    pub pod_phase: Option<String>,
    pub ready: Option<bool>,
    pub waiting_reason: Option<String>,
    pub restart_count: Option<i64>,
    pub restart_rate_5m_max: Option<f64>,
    pub warning_events_count: Option<i64>,
    pub oom_killed: Option<bool>,
    pub oom_killed_events: Option<i64>,
    pub evicted: Option<bool>,
    pub status_reason: Option<String>,
    pub status_message: Option<String>,
    #[serde(default)]
    pub not_ready_conditions: Vec<K8sConditionSummary>,
    #[serde(default)]
    pub container_waiting_reasons_top: Vec<K8sContainerWaiting>,
    #[serde(default)]
    pub container_last_terminated_top: Vec<K8sContainerLastTerminated>,
    #[serde(default)]
    pub recent_event_reasons_top: Vec<K8sEventSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesMetrics {
    pub cpu_throttle_p95_pct: Option<f64>,
    pub cpu_usage_p95_cores: Option<f64>,
    pub cpu_limit_cores: Option<f64>,
    pub cpu_near_limit: Option<bool>,
    pub pod_unhealthy_phase_observed: Option<bool>,
    pub http_5xx_rate_p95: Option<f64>,
    pub http_5xx_rate_max: Option<f64>,
    pub memory_usage_p95_bytes: Option<f64>,
    pub memory_limit_bytes: Option<f64>,
    pub memory_near_limit: Option<bool>,
    pub cpu_throttle_top_container: Option<String>,
    pub cpu_throttle_top_container_p95_pct: Option<f64>,
    pub cpu_throttle_top_container_usage_limit_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesLogs {
    pub status: Option<String>,
    pub backend: Option<String>,
    pub reason: Option<String>,
    pub query_used: Option<String>,
    pub timeout_hits: Option<i64>,
    pub error_hits: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesChanges {
    pub rollout_within_window: Option<bool>,
    pub last_change_ts: Option<String>,
    pub workload_kind: Option<String>,
    pub workload_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceQuality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesQuality {
    pub evidence_quality: Option<EvidenceQuality>,
    #[serde(default)]
    pub missing_inputs: Vec<String>,
    #[serde(default)]
    pub contradiction_flags: Vec<String>,
    pub impact_signals_available: Option<bool>,
    #[serde(default)]
    pub missing_impact_signals: Vec<String>,
    pub alert_age_hours: Option<f64>,
    pub is_long_running: Option<bool>,
    pub is_recently_started: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedFeatures {
    pub family: String,
    #[serde(default)]
    pub k8s: FeaturesK8s,
    #[serde(default)]
    pub metrics: FeaturesMetrics,
    #[serde(default)]
    pub logs: FeaturesLogs,
    #[serde(default)]
    pub changes: FeaturesChanges,
    #[serde(default)]
    pub quality: FeaturesQuality,
    /// Job-specific metrics surfaced for the Evidence section of a report.
    pub job_metrics: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreBreakdownItem {
    pub code: String,
    pub delta: i32,
    pub feature_ref: Option<String>,
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeterministicScores {
    pub impact_score: i32,
    pub confidence_score: i32,
    pub noise_score: i32,
    #[serde(default)]
    pub reason_codes: Vec<String>,
    #[serde(default)]
    pub breakdown: Vec<ScoreBreakdownItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Actionable,
    Informational,
    Noisy,
    Artifact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivedSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeterministicVerdict {
    pub classification: Classification,
    /// Agent-computed severity. The raw alert label severity remains under
    /// `alert.labels.severity` and is never overwritten.
    pub severity: Option<DerivedSeverity>,
    pub primary_driver: String,
    pub one_liner: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Analysis {
    pub change: Option<ChangeCorrelation>,
    pub noise: Option<NoiseInsights>,
    pub capacity: Option<CapacityReport>,
    pub decision: Option<Decision>,
    pub enrichment: Option<Decision>,
    pub rca: Option<RcaInsights>,
    pub llm: Option<LlmInsights>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    pub features: Option<DerivedFeatures>,
    pub scores: Option<DeterministicScores>,
    pub verdict: Option<DeterministicVerdict>,
    pub debug: Option<DebugInfo>,
}
