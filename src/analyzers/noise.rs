//! Noise analyzer: flap estimation, high-cardinality label detection, and
//! missing-critical-label detection. Ported from `agent/pipeline/noise.py`.
//! The Prometheus-querying half is split out into [`collect_prometheus_shape`]
//! so the scoring-facing computation stays pure and unit-testable.

use crate::domain::analysis::{NoiseCardinalityInsights, NoiseFlapInsights, NoiseInsights, NoiseMissingLabelsInsights};
use crate::domain::investigation::Investigation;
use crate::domain::target::TargetType;
use crate::providers::prometheus::PrometheusClient;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

/// Labels that carry scrape/pod-churn identity rather than workload
/// identity; high cardinality here usually means "one alert per pod
/// restart" rather than a real distinct problem per label value.
const EPHEMERAL_LABEL_CANDIDATES: &[&str] =
    &["pod", "pod_name", "instance", "uuid", "replicaset", "pod_template_hash", "controller_revision_hash"];

/// Labels whose absence blocks correlation with K8s/log evidence for a
/// pod-scoped alert.
const CRITICAL_LABELS_FOR_POD: &[&str] = &["namespace", "pod"];

/// `GET /api/v1/query` shapes used to size the blast radius: how many
/// series are currently firing for this alertname, and (if present) how
/// many total series the underlying expression evaluates over.
pub async fn collect_prometheus_shape(
    prom: &PrometheusClient,
    alertname: &str,
) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    let now = Utc::now();
    let firing_query = format!("count(ALERTS{{alertname=\"{alertname}\",alertstate=\"firing\"}})");
    if let Ok(result) = prom.query_instant(&firing_query, now).await {
        if let Some(v) = PrometheusClient::scalar(&result) {
            out.insert("firing_instances".to_string(), serde_json::json!(v));
        }
    }
    out
}

/// Estimate a 0-100 flap score from the container restart rate already
/// present in `k8s.restart_rate_5m_max` (the only flap signal available
/// without a dedicated Alertmanager state-transition history).
fn estimate_flap(investigation: &Investigation) -> NoiseFlapInsights {
    let restart_rate =
        investigation.analysis.features.as_ref().and_then(|f| f.k8s.restart_rate_5m_max).unwrap_or(0.0);
    let (score, notes) = if restart_rate >= 5.0 {
        (80, vec!["restart rate >= 5/5m suggests the pod is flapping, not failing once".to_string()])
    } else if restart_rate >= 2.0 {
        (40, vec!["restart rate >= 2/5m is mildly flappy".to_string()])
    } else {
        (0, Vec::new())
    };
    NoiseFlapInsights { lookback: "15m".to_string(), flaps_estimate: Some(restart_rate), flap_score_0_100: score, notes }
}

fn detect_cardinality(investigation: &Investigation) -> NoiseCardinalityInsights {
    let present: Vec<String> = EPHEMERAL_LABEL_CANDIDATES
        .iter()
        .filter(|l| investigation.alert.labels.contains_key(**l))
        .map(|l| l.to_string())
        .collect();

    let recommended_group_by: Vec<String> = investigation
        .alert
        .labels
        .keys()
        .filter(|k| !present.contains(k))
        .cloned()
        .collect();

    NoiseCardinalityInsights {
        ephemeral_labels_present: present.clone(),
        recommended_group_by,
        recommended_drop_labels: present,
    }
}

fn detect_missing_labels(investigation: &Investigation) -> NoiseMissingLabelsInsights {
    if !matches!(investigation.target.target_type, TargetType::Pod | TargetType::Workload) {
        return NoiseMissingLabelsInsights::default();
    }
    let missing: Vec<String> = CRITICAL_LABELS_FOR_POD
        .iter()
        .filter(|l| !investigation.alert.labels.contains_key(**l))
        .map(|l| l.to_string())
        .collect();
    let recommendation = if missing.is_empty() {
        Vec::new()
    } else {
        vec![format!("add {} to the alerting rule's labels or relabeling config", missing.join("/"))]
    };
    NoiseMissingLabelsInsights { missing, inferred: Vec::new(), recommendation }
}

/// Compute the full noise insight bag. Pure given already-collected
/// `prometheus_shape`; callers that have a live Prometheus client should use
/// [`collect_prometheus_shape`] first.
pub fn analyze(investigation: &Investigation, prometheus_shape: Option<HashMap<String, Value>>) -> NoiseInsights {
    NoiseInsights {
        label_shape: Some(investigation.alert.labels.clone()),
        prometheus: prometheus_shape,
        notes: Vec::new(),
        flap: Some(estimate_flap(investigation)),
        cardinality: Some(detect_cardinality(investigation)),
        missing_labels: Some(detect_missing_labels(investigation)),
    }
}
