//! Ported from `score_observability_pipeline()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify, firing_instances};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let alertname = investigation.alert.label("alertname").unwrap_or_default().to_ascii_lowercase();
    if alertname.contains("alertingrules") && alertname.contains("error") {
        impact += add(&mut breakdown, &mut reasons, "ALERTING_RULES_ERROR", 80, Some("alert.alertname"), Some("alerting rules failing to evaluate".to_string()));
    } else if alertname.contains("recordingrules") && (alertname.contains("nodata") || alertname.contains("no_data")) {
        impact += add(&mut breakdown, &mut reasons, "RECORDING_RULES_NO_DATA", 60, Some("alert.alertname"), Some("recording rules producing no data".to_string()));
    } else if alertname.contains("ingest") && alertname.contains("reject") {
        impact += add(&mut breakdown, &mut reasons, "INGESTION_REJECTS", 70, Some("alert.alertname"), Some("ingestion rejections detected".to_string()));
    } else if alertname.contains("toomanylogs") || (alertname.contains("logs") && alertname.contains("volume")) {
        impact += add(&mut breakdown, &mut reasons, "TOO_MANY_LOGS", 50, Some("alert.alertname"), Some("log volume anomaly".to_string()));
    }

    if investigation.alert.label("alertname").is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_OBS_ALERTNAME", 60, Some("alert.alertname"), Some("alertname identifies observability pipeline issue".to_string()));
    }
    if investigation.target.namespace.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_NAMESPACE", 10, Some("target.namespace"), Some("namespace present".to_string()));
    }

    let fi = firing_instances(investigation);
    let no_firing = fi.map(|n| n == 0.0).unwrap_or(false);
    let mut noise = 0;
    if no_firing {
        confidence += add(&mut breakdown, &mut reasons, "OBS_CONTRADICTION_NO_FIRING", -40, Some("noise.prometheus.firing_instances"), Some("firing_instances=0".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_OBS_CONTRADICTION", 15, Some("noise.prometheus.firing_instances"), Some("contradiction increases noise".to_string()));
    }

    noise += base_noise(investigation, &mut breakdown, &mut reasons);
    if impact >= 60 {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_OBS", -10, Some("alert.alertname"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "observability_pipeline".to_string(),
        one_liner: "The observability pipeline itself (rules evaluation, ingestion, or log volume) shows signs of trouble.".to_string(),
        next_steps: vec![
            "Check Prometheus/Mimir rule evaluation errors and ingestion rejection rates.".to_string(),
            "Review recent config changes to scrape configs, recording/alerting rules, or log pipelines.".to_string(),
            "If log volume spiked, identify the source workload before raising retention/cost limits.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
