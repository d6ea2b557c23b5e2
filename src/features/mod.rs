//! Derived-feature extraction: compute once, reuse everywhere. No
//! rendering, no scoring, no external I/O — ported from
//! `agent/pipeline/features.py`.

pub mod changes;
pub mod k8s;
pub mod logs;
pub mod metrics;
pub mod percentile;
pub mod quality;
pub mod util;

use crate::domain::{investigation::Investigation, DerivedFeatures};
use crate::pipeline::families::detect_family;
use crate::pipeline::family::get_family;

fn detect(investigation: &Investigation) -> String {
    let fam = get_family(investigation, "");
    if !fam.is_empty() {
        return fam.to_string();
    }
    detect_family(&investigation.alert.labels, investigation.target.playbook.as_deref())
}

/// Compute the full [`DerivedFeatures`] bundle for an investigation. Pure —
/// reads only `evidence`/`analysis`/`target`/`alert` already on the
/// investigation and performs no I/O.
pub fn compute_features(investigation: &Investigation) -> DerivedFeatures {
    let family = detect(investigation);
    let mut k8s_features = k8s::compute(investigation);

    let restart_data = investigation.evidence.metrics.restart_data.clone().unwrap_or_default();
    let series = match restart_data.get("restart_increase_5m") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_object().map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .collect(),
        _ => Vec::new(),
    };
    let vals = util::series_values(&series, investigation.target.container.as_deref());
    k8s_features.restart_rate_5m_max = vals.iter().cloned().fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.max(v))));

    let metrics_features = metrics::compute(investigation);
    let logs_features = logs::compute(investigation);
    let changes_features = changes::compute(investigation);
    let quality_features = quality::compute(investigation, &family, &k8s_features, &metrics_features, &logs_features);

    DerivedFeatures {
        family,
        k8s: k8s_features,
        metrics: metrics_features,
        logs: logs_features,
        changes: changes_features,
        quality: quality_features,
        job_metrics: None,
    }
}
