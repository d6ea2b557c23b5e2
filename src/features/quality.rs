//! Evidence-quality features: missing-input accounting, contradiction
//! flags, and impact-signal availability honesty. Ported from
//! `_quality_features()` in `agent/pipeline/features.py`.

use super::util::parse_iso_datetime;
use crate::domain::{investigation::Investigation, EvidenceQuality, FeaturesK8s, FeaturesLogs, FeaturesMetrics, FeaturesQuality};

pub fn compute(
    investigation: &Investigation,
    family: &str,
    k8s: &FeaturesK8s,
    metrics: &FeaturesMetrics,
    logs: &FeaturesLogs,
) -> FeaturesQuality {
    let mut missing: Vec<String> = Vec::new();
    let labels = &investigation.alert.labels;
    let mut missing_label_keys: Vec<&str> = Vec::new();

    if matches!(family, "crashloop" | "pod_not_healthy" | "cpu_throttling") {
        if labels.get("namespace").is_none() && labels.get("Namespace").is_none() {
            missing.push("labels.namespace".to_string());
            missing_label_keys.push("namespace");
        }
        if labels.get("pod").is_none() && labels.get("pod_name").is_none() && labels.get("podName").is_none() {
            missing.push("labels.pod".to_string());
            missing_label_keys.push("pod");
        }
    }
    if investigation.evidence.k8s.pod_info.is_none() {
        missing.push("k8s.pod_info".to_string());
    }
    if investigation.evidence.logs.logs_status.as_deref().map(|s| s == "unavailable").unwrap_or(true) {
        missing.push("logs".to_string());
    }
    if investigation.evidence.metrics.cpu_metrics.is_none() {
        missing.push("metrics.cpu".to_string());
    }
    if investigation.evidence.metrics.restart_data.is_none() {
        missing.push("metrics.restarts".to_string());
    }

    let mut contradiction_flags: Vec<String> = Vec::new();
    if family == "crashloop" {
        if k8s.ready == Some(true) {
            if let Some(rr) = k8s.restart_rate_5m_max {
                if rr <= 0.0 {
                    contradiction_flags.push("CRASHLOOP_CONTRADICTION_READY_NO_RESTARTS".to_string());
                }
            }
        }
    }
    if family == "cpu_throttling" {
        let t = metrics.cpu_throttle_p95_pct;
        let ratio = metrics.cpu_throttle_top_container_usage_limit_ratio.or_else(|| {
            match (metrics.cpu_usage_p95_cores, metrics.cpu_limit_cores) {
                (Some(usage), Some(limit)) if limit > 0.0 => Some(usage / limit),
                _ => None,
            }
        });
        if let (Some(t), Some(ratio)) = (t, ratio) {
            if t > 25.0 && ratio < 0.2 {
                contradiction_flags.push("THROTTLING_HIGH_BUT_USAGE_LOW".to_string());
            }
        }
    }

    let logs_available = logs.status.as_deref() == Some("ok");
    let http_metrics_available = metrics.http_5xx_rate_p95.is_some() || metrics.http_5xx_rate_max.is_some();
    let mut missing_impact_signals = Vec::new();
    if !logs_available {
        missing_impact_signals.push("logs".to_string());
    }
    if !http_metrics_available {
        missing_impact_signals.push("http_metrics".to_string());
    }
    let impact_signals_available = logs_available || http_metrics_available;

    let age_hours = parse_iso_datetime(investigation.alert.starts_at.as_deref())
        .map(|starts| (investigation.time_window.end_time - starts).num_seconds() as f64 / 3600.0)
        .map(|h| h.max(0.0));
    let is_long = age_hours.map(|h| h >= 72.0);
    let is_recent = age_hours.map(|h| h <= 1.0);

    let mut quality = EvidenceQuality::High;
    if missing.len() >= 2 {
        quality = EvidenceQuality::Medium;
    }
    if missing.len() >= 4 {
        quality = EvidenceQuality::Low;
    }
    if !missing_label_keys.is_empty() {
        quality = EvidenceQuality::Low;
    }

    FeaturesQuality {
        evidence_quality: Some(quality),
        missing_inputs: missing,
        contradiction_flags,
        impact_signals_available: Some(impact_signals_available),
        missing_impact_signals,
        alert_age_hours: age_hours,
        is_long_running: is_long,
        is_recently_started: is_recent,
    }
}
