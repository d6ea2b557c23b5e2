//! Ported from `score_k8s_rollout_health()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify, firing_instances};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let alertname = investigation.alert.label("alertname").unwrap_or_default().to_ascii_lowercase();
    let is_rollout_stuck = alertname.contains("daemonsetrolloutstuck") || alertname.contains("rolloutstuck");
    let is_job_failed = alertname.contains("jobfailed") || alertname.contains("kubejobfailed");
    let is_replicas_mismatch = alertname.contains("replicasmismatch") || alertname.contains("replicamismatch");

    if is_rollout_stuck {
        impact += add(&mut breakdown, &mut reasons, "ROLLOUT_STUCK", 80, Some("alert.alertname"), Some("rollout stuck alert".to_string()));
    } else if is_replicas_mismatch {
        impact += add(&mut breakdown, &mut reasons, "REPLICAS_MISMATCH", 60, Some("alert.alertname"), Some("replicas mismatch alert".to_string()));
    } else if is_job_failed {
        impact += add(&mut breakdown, &mut reasons, "JOB_FAILED", 70, Some("alert.alertname"), Some("job failed alert".to_string()));
    }

    if investigation.alert.label("alertname").is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_ROLLOUT_ALERTNAME", 60, Some("alert.alertname"), Some("alertname identifies rollout health issue".to_string()));
    }
    let workload_label = ["deployment", "daemonset", "statefulset", "job"]
        .iter()
        .find_map(|k| investigation.alert.label(k));
    if workload_label.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_WORKLOAD_LABEL", 10, Some("alert.labels"), Some("workload label present".to_string()));
    }

    let fi = firing_instances(investigation);
    let no_firing = fi.map(|n| n == 0.0).unwrap_or(false);
    let mut noise = 0;
    if no_firing {
        confidence += add(&mut breakdown, &mut reasons, "ROLLOUT_CONTRADICTION_NO_FIRING", -40, Some("noise.prometheus.firing_instances"), Some("firing_instances=0".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_ROLLOUT_CONTRADICTION", 15, Some("noise.prometheus.firing_instances"), Some("contradiction increases noise".to_string()));
    }

    let healthy_status = rollout_status_is_healthy(investigation);
    if healthy_status && impact >= 60 {
        confidence += add(&mut breakdown, &mut reasons, "ROLLOUT_CONTRADICTION_HEALTHY_STATUS", -50, Some("k8s.rollout_status"), Some("rollout_status indicates healthy".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_ROLLOUT_CONTRADICTION_HEALTHY_STATUS", 15, Some("k8s.rollout_status"), Some("contradiction increases noise".to_string()));
    }

    noise += base_noise(investigation, &mut breakdown, &mut reasons);
    if impact >= 60 {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_ROLLOUT", -20, Some("alert.alertname"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let (one_liner, next_steps) = if healthy_status && impact >= 60 {
        (
            "Rollout health alert fired, but the workload's current rollout status looks healthy; this may be a recovered or stale signal.".to_string(),
            vec![
                "Re-check rollout status (kubectl rollout status / get deploy) for the current state.".to_string(),
                "If this recurs, review the alert rule's for: duration against typical rollout time.".to_string(),
            ],
        )
    } else {
        (
            "Workload rollout is unhealthy (stuck, mismatched replicas, or failed job).".to_string(),
            vec![
                "Check deployment/daemonset/statefulset status and recent rollout history.".to_string(),
                "Inspect pod events for scheduling/image/readiness failures blocking the rollout.".to_string(),
                "Consider pausing/rolling back if a recent change introduced the regression.".to_string(),
            ],
        )
    };

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "k8s_rollout_health".to_string(),
        one_liner,
        next_steps,
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}

fn rollout_status_is_healthy(investigation: &Investigation) -> bool {
    let Some(obj) = investigation.evidence.k8s.rollout_status.as_ref() else { return false };
    let kind = investigation.target.workload_kind.as_deref().unwrap_or("").to_ascii_lowercase();

    let get_i64 = |k: &str| obj.get(k).and_then(|v| v.as_i64());
    match kind.as_str() {
        "deployment" => {
            let desired = get_i64("desired_replicas").or_else(|| get_i64("replicas"));
            let updated = get_i64("updated_replicas");
            let available = get_i64("available_replicas");
            matches!((desired, updated, available), (Some(d), Some(u), Some(a)) if d > 0 && u == d && a == d)
        }
        "daemonset" => {
            let desired = get_i64("desired_number_scheduled");
            let ready = get_i64("number_ready");
            matches!((desired, ready), (Some(d), Some(r)) if d > 0 && r == d)
        }
        "statefulset" => {
            let desired = get_i64("replicas");
            let ready = get_i64("ready_replicas");
            matches!((desired, ready), (Some(d), Some(r)) if d > 0 && r == d)
        }
        "job" => {
            let succeeded = get_i64("succeeded").unwrap_or(0);
            let failed = get_i64("failed").unwrap_or(0);
            succeeded > 0 && failed == 0
        }
        _ => false,
    }
}
