//! Ported from `score_oom_killed()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let oomkilled = f
        .k8s
        .container_last_terminated_top
        .iter()
        .any(|t| t.reason.as_deref().unwrap_or("").eq_ignore_ascii_case("oomkilled"));
    let oom_events = f
        .k8s
        .recent_event_reasons_top
        .iter()
        .filter(|e| e.reason.as_deref().unwrap_or("").eq_ignore_ascii_case("oomkilling") || e.reason.as_deref().unwrap_or("").eq_ignore_ascii_case("oomkilled"))
        .map(|e| e.count.unwrap_or(1))
        .sum::<i64>();

    impact += add(&mut breakdown, &mut reasons, "OOM_ALERT_FIRING", 50, Some("alert.labels"), Some("OOM alert firing".to_string()));
    if oomkilled {
        impact += add(&mut breakdown, &mut reasons, "OOMKILLED", 40, Some("k8s.container_last_terminated_top"), Some("container last terminated OOMKilled".to_string()));
    }
    if oom_events >= 2 {
        impact += add(&mut breakdown, &mut reasons, "OOMKILLED_REPEAT", 20, Some("k8s.recent_event_reasons_top"), Some(format!("oom events={oom_events}")));
    }

    if oomkilled || oom_events >= 1 {
        confidence += add(&mut breakdown, &mut reasons, "EVID_OOM_K8S", 70, Some("k8s.container_last_terminated_top"), Some("K8s corroborates OOM".to_string()));
    } else {
        confidence += add(&mut breakdown, &mut reasons, "OOM_CORROBORATION_MISSING", -15, Some("k8s.container_last_terminated_top"), Some("no K8s corroboration for OOM".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }

    let mut noise = base_noise(investigation, &mut breakdown, &mut reasons);
    if oomkilled {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_OOM", -30, Some("k8s.container_last_terminated_top"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "oom_killed".to_string(),
        one_liner: "Container was OOMKilled; memory usage exceeded the configured limit.".to_string(),
        next_steps: vec![
            "Check container_last_terminated reason/exit_code and memory usage vs limit for this pod.".to_string(),
            "Increase memory limit or investigate a memory leak/regression from a recent change.".to_string(),
            "Confirm recurrence (restart count, repeated OOM events) before resizing limits.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
