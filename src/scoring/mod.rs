//! Deterministic scoring: features → scores → verdict. Ported from
//! `agent/pipeline/scoring.py`. Intentionally explainable — every family
//! scorer starts impact/confidence/noise at 0 and only ever adds fixed,
//! named deltas before clamping to 0..100.

pub mod families;

use crate::domain::analysis::{DeterministicScores, DeterministicVerdict, ScoreBreakdownItem};
use crate::domain::analysis::{Classification, DerivedFeatures, DerivedSeverity};
use crate::domain::investigation::Investigation;

/// Append a scored delta to `breakdown`/`reasons` and return it, so callers
/// can fold it straight into a running total. A zero delta is recorded
/// nowhere — it isn't worth a reason code.
pub(crate) fn add(
    breakdown: &mut Vec<ScoreBreakdownItem>,
    reasons: &mut Vec<String>,
    code: &str,
    delta: i32,
    feature_ref: Option<&str>,
    why: Option<String>,
) -> i32 {
    if delta == 0 {
        return 0;
    }
    breakdown.push(ScoreBreakdownItem {
        code: code.to_string(),
        delta,
        feature_ref: feature_ref.map(str::to_string),
        why,
    });
    if !reasons.iter().any(|r| r == code) {
        reasons.push(code.to_string());
    }
    delta
}

pub(crate) fn clamp_0_100(x: i32) -> i32 {
    x.clamp(0, 100)
}

/// Best-effort scalar extraction from a `query_prometheus_instant()`-style
/// vector result: `[{"metric": {...}, "value": [ts, "123.4"]}]`.
pub(crate) fn prom_scalar(v: Option<&serde_json::Value>) -> Option<f64> {
    let arr = v?.as_array()?;
    let first = arr.first()?.as_object()?;
    let val = first.get("value")?.as_array()?;
    if val.len() != 2 {
        return None;
    }
    match &val[1] {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Dispatch to the per-family scorer, then apply the cross-family
/// postprocessing pass every family shares.
pub fn score_investigation(
    investigation: &mut Investigation,
    f: &DerivedFeatures,
) -> (DeterministicScores, DeterministicVerdict) {
    let (scores, verdict) = match f.family.as_str() {
        "crashloop" => families::crashloop::score(investigation, f),
        "pod_not_healthy" => families::pod_not_healthy::score(investigation, f),
        "cpu_throttling" => families::cpu_throttling::score(investigation, f),
        "http_5xx" => families::http_5xx::score(investigation, f),
        "oom_killed" => families::oom_killed::score(investigation, f),
        "memory_pressure" => families::memory_pressure::score(investigation, f),
        "meta" => families::meta::score(investigation, f),
        "target_down" => families::target_down::score(investigation, f),
        "k8s_rollout_health" => families::k8s_rollout_health::score(investigation, f),
        "observability_pipeline" => families::observability_pipeline::score(investigation, f),
        "job_failed" => families::job_failed::score(investigation, f),
        _ => families::generic::score(),
    };
    postprocess_verdict(f, scores, verdict)
}

const RECOVERED_HINTS: &[&str] = &[
    "CRASHLOOP_CONTRADICTION_READY_NO_RESTARTS",
    "TARGETDOWN_CONTRADICTION_NO_FIRING",
    "ROLLOUT_CONTRADICTION_NO_FIRING",
    "ROLLOUT_CONTRADICTION_HEALTHY_STATUS",
];

/// Cross-cutting deterministic tweaks shared by every family: explicit
/// artifact-split wording, a long-running-and-still-informational tip, and
/// the derived severity guardrail.
fn postprocess_verdict(
    f: &DerivedFeatures,
    mut scores: DeterministicScores,
    mut verdict: DeterministicVerdict,
) -> (DeterministicScores, DeterministicVerdict) {
    if verdict.classification == Classification::Artifact {
        let add_reason = |scores: &mut DeterministicScores, code: &str| {
            if !scores.reason_codes.iter().any(|c| c == code) {
                scores.reason_codes.push(code.to_string());
            }
        };

        let is_recovered = scores.reason_codes.iter().any(|c| RECOVERED_HINTS.contains(&c.as_str()));

        if scores.reason_codes.iter().any(|c| c == "OOM_CORROBORATION_MISSING") {
            verdict.one_liner = "OOM alert fired (derived from metrics), but the agent could not retrieve \
                corroborating K8s evidence for the container/pod in this window (missing K8s context or stale \
                window)."
                .to_string();
            add_reason(&mut scores, "ARTIFACT_LOW_CONFIDENCE");
        } else if is_recovered {
            add_reason(&mut scores, "ARTIFACT_RECOVERED");
            if !verdict.one_liner.to_ascii_lowercase().starts_with("recovered") {
                verdict.one_liner = format!("Recovered/stale signal: {}", verdict.one_liner);
            }
        } else {
            add_reason(&mut scores, "ARTIFACT_LOW_CONFIDENCE");
            if !verdict.one_liner.to_ascii_lowercase().starts_with("low-confidence") {
                verdict.one_liner = format!("Low-confidence attribution: {}", verdict.one_liner);
            }
        }
    }

    if f.quality.is_long_running == Some(true) && verdict.classification == Classification::Informational {
        let tip = "Alert is long-running and informational; consider adjusting threshold/window or adding an \
            impact condition (e.g., require CPU near limit or correlate with errors/latency) to reduce chronic \
            noise."
            .to_string();
        if !verdict.next_steps.contains(&tip) {
            verdict.next_steps.push(tip);
        }
    }

    let impact = scores.impact_score;
    let confidence = scores.confidence_score;
    let noise = scores.noise_score;

    let mut severity = DerivedSeverity::Info;
    if verdict.classification == Classification::Actionable {
        severity = DerivedSeverity::Warning;
        if confidence >= 60 && noise <= 60 && impact >= 85 && confidence >= 70 && noise <= 40 {
            severity = DerivedSeverity::Critical;
        }
        if confidence < 60 || noise > 60 {
            severity = DerivedSeverity::Warning;
        }
    }
    verdict.severity = Some(severity);

    (scores, verdict)
}

/// Shared classification gate used by most families: artifact below the
/// confidence floor, noisy above the noise ceiling, actionable only when
/// all three gates clear.
pub(crate) fn classify(impact: i32, confidence: i32, noise: i32, confidence_floor: i32) -> Classification {
    if confidence < confidence_floor {
        Classification::Artifact
    } else if noise >= 70 {
        Classification::Noisy
    } else if impact >= 60 && confidence >= 60 && noise <= 60 {
        Classification::Actionable
    } else {
        Classification::Informational
    }
}

/// Noise contribution shared by every family: flap score buckets plus
/// ephemeral-label cardinality (minus `pod`/`pod_name` when the workload
/// identity is already known).
pub(crate) fn base_noise(
    investigation: &Investigation,
    breakdown: &mut Vec<ScoreBreakdownItem>,
    reasons: &mut Vec<String>,
) -> i32 {
    let mut noise = 0;
    let Some(ni) = &investigation.analysis.noise else { return 0 };

    let flap_score = ni.flap.as_ref().map(|f| f.flap_score_0_100).unwrap_or(0);
    if flap_score >= 80 {
        noise += add(breakdown, reasons, "NOISE_FLAP_HIGH", 40, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
    } else if flap_score >= 40 {
        noise += add(breakdown, reasons, "NOISE_FLAP_MED", 20, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
    }

    let mut eph: Vec<String> = ni.cardinality.as_ref().map(|c| c.ephemeral_labels_present.clone()).unwrap_or_default();
    if investigation.target.workload_kind.is_some() && investigation.target.workload_name.is_some() {
        eph.retain(|e| e != "pod" && e != "pod_name");
    }
    if !eph.is_empty() {
        let delta = (10 * eph.len() as i32).min(30);
        let why = eph.iter().take(6).cloned().collect::<Vec<_>>().join(",");
        noise += add(breakdown, reasons, "NOISE_CARDINALITY", delta, Some("noise.cardinality.ephemeral_labels_present"), Some(why));
    }
    noise
}

pub(crate) fn firing_instances(investigation: &Investigation) -> Option<f64> {
    let ni = investigation.analysis.noise.as_ref()?;
    let prom = ni.prometheus.as_ref()?;
    match prom.get("firing_instances")? {
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
