//! Ported from `score_target_down()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify, firing_instances};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let fi = firing_instances(investigation);

    match fi {
        Some(n) if n >= 1.0 => {
            impact += add(&mut breakdown, &mut reasons, "TARGETS_DOWN", 70, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={n}")));
            if n >= 5.0 {
                impact += add(&mut breakdown, &mut reasons, "TARGETS_DOWN_MANY", 20, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={n}")));
            }
            if n >= 20.0 {
                impact += add(&mut breakdown, &mut reasons, "TARGETS_DOWN_MASS", 10, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={n}")));
            }
        }
        _ => {
            impact += add(&mut breakdown, &mut reasons, "TARGET_DOWN_ALERT", 50, Some("alert.labels"), Some("target down alert".to_string()));
        }
    }

    if investigation.alert.label("alertname").is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_TARGETDOWN_NAME", 60, Some("alert.alertname"), Some("alertname identifies target down".to_string()));
    }
    if investigation.target.instance.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_INSTANCE_LABEL", 20, Some("target.instance"), Some("instance label present".to_string()));
    }
    if investigation.target.job.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_JOB_LABEL", 10, Some("target.job"), Some("job label present".to_string()));
    }

    let no_firing = fi.map(|n| n == 0.0).unwrap_or(false);
    let mut noise = 0;
    if no_firing {
        confidence += add(&mut breakdown, &mut reasons, "TARGETDOWN_CONTRADICTION_NO_FIRING", -40, Some("noise.prometheus.firing_instances"), Some("firing_instances=0".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_TARGETDOWN_CONTRADICTION", 20, Some("noise.prometheus.firing_instances"), Some("contradiction increases noise".to_string()));
    }

    let (up_down, up_total) = up_job_counts(investigation);
    let up_none = matches!((up_down, up_total), (Some(d), Some(t)) if t > 0.0 && d == 0.0);
    if up_none {
        confidence += add(&mut breakdown, &mut reasons, "TARGETDOWN_CONTRADICTION_UP_NONE", -30, Some("metrics.prom_baseline.up_job_down"), Some("up{job} shows no targets down".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_TARGETDOWN_CONTRADICTION_UP_NONE", 15, Some("metrics.prom_baseline.up_job_down"), Some("contradiction increases noise".to_string()));
    }

    noise += base_noise_excluding_instance(investigation, &mut breakdown, &mut reasons);
    let strong = fi.map(|n| n >= 1.0).unwrap_or(false) && !no_firing;
    if strong {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_TARGETDOWN", -20, Some("noise.prometheus.firing_instances"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let (one_liner, next_steps) = if up_none {
        (
            "TargetDown fired, but the up{job} series shows no targets currently down; this alert may have recovered or the label scope mismatches the series.".to_string(),
            vec![
                "Re-check up{job=\"...\"} for the alert's exact label set and time window.".to_string(),
                "If this recurs, review scrape interval/timeout and the alert rule's for: duration.".to_string(),
            ],
        )
    } else {
        (
            "One or more scrape targets are down; Prometheus cannot collect metrics from them.".to_string(),
            vec![
                "Check target health/network path (service, pod, security group/NetworkPolicy) for the affected job/instance.".to_string(),
                "Confirm the exporter/application is up and listening on the expected port.".to_string(),
                "Review recent deploys or scaling events that may have removed the target.".to_string(),
            ],
        )
    };

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "target_down".to_string(),
        one_liner,
        next_steps,
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}

fn up_job_counts(investigation: &Investigation) -> (Option<f64>, Option<f64>) {
    let extra = &investigation.evidence.metrics.extra;
    let baseline = extra.get("prom_baseline").and_then(|v| v.as_object());
    let down = baseline.and_then(|b| b.get("up_job_down")).and_then(|v| v.as_f64());
    let total = baseline.and_then(|b| b.get("up_job_total")).and_then(|v| v.as_f64());
    (down, total)
}

fn base_noise_excluding_instance(
    investigation: &Investigation,
    breakdown: &mut Vec<crate::domain::analysis::ScoreBreakdownItem>,
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
    eph.retain(|e| e != "instance" && e != "endpoint");
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
