//! Ported from `score_memory_pressure()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let near = f.metrics.memory_near_limit == Some(true);
    let evicted = f
        .k8s
        .recent_event_reasons_top
        .iter()
        .any(|e| e.reason.as_deref().unwrap_or("").eq_ignore_ascii_case("evicted"));

    if near {
        impact += add(&mut breakdown, &mut reasons, "MEM_NEAR_LIMIT", 70, Some("metrics.memory_near_limit"), Some("memory usage near limit".to_string()));
    }
    if evicted {
        impact += add(&mut breakdown, &mut reasons, "POD_EVICTED", 60, Some("k8s.recent_event_reasons_top"), Some("Evicted event present".to_string()));
    }

    let usage = f.metrics.memory_usage_p95_bytes;
    let limit = f.metrics.memory_limit_bytes;
    if usage.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_MEM_USAGE", 40, Some("metrics.memory_usage_p95_bytes"), Some("usage series present".to_string()));
    } else {
        confidence += add(&mut breakdown, &mut reasons, "NO_MEM_USAGE_SERIES", -40, Some("metrics.memory_usage_p95_bytes"), Some("no usage series".to_string()));
    }
    if limit.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_MEM_LIMIT", 20, Some("metrics.memory_limit_bytes"), Some("limit known".to_string()));
    }
    let low_usage = match (usage, limit) {
        (Some(u), Some(l)) if l > 0.0 => u < 0.1 * l,
        _ => false,
    };
    if low_usage {
        confidence += add(&mut breakdown, &mut reasons, "MEM_PRESSURE_CONTRADICTION_LOW_USAGE", -30, Some("metrics.memory_usage_p95_bytes"), Some("usage < 10% of limit".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }

    let mut noise = base_noise(investigation, &mut breakdown, &mut reasons);
    if low_usage {
        noise += add(&mut breakdown, &mut reasons, "NOISE_MEM_CONTRADICTION", 10, Some("metrics.memory_usage_p95_bytes"), Some("contradiction increases noise".to_string()));
    }
    if near || evicted {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_MEMORY", -20, Some("metrics.memory_near_limit"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "memory_pressure".to_string(),
        one_liner: "Memory usage is near the configured limit for this pod; risk of OOMKill is elevated.".to_string(),
        next_steps: vec![
            "Check memory usage vs limit for the window, and look for a steady climb (leak) vs a step change.".to_string(),
            "Increase memory limit/requests or investigate the workload for a leak/regression.".to_string(),
            "Correlate with recent deploys/config changes and container_last_terminated history.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
