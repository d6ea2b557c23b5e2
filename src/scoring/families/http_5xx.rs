//! Ported from `score_http_5xx()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100, classify};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let p95 = f.metrics.http_5xx_rate_p95;
    let mx = f.metrics.http_5xx_rate_max;

    if p95.map(|v| v >= 1.0).unwrap_or(false) {
        impact += add(&mut breakdown, &mut reasons, "HTTP5XX_P95_HIGH", 80, Some("metrics.http_5xx_rate_p95"), Some(format!("p95={:.3}/s", p95.unwrap())));
    } else if p95.map(|v| v >= 0.1).unwrap_or(false) {
        impact += add(&mut breakdown, &mut reasons, "HTTP5XX_P95_ELEVATED", 60, Some("metrics.http_5xx_rate_p95"), Some(format!("p95={:.3}/s", p95.unwrap())));
    } else if mx.map(|v| v >= 0.1).unwrap_or(false) {
        impact += add(&mut breakdown, &mut reasons, "HTTP5XX_SPIKES", 30, Some("metrics.http_5xx_rate_max"), Some(format!("max={:.3}/s", mx.unwrap())));
    }

    if p95.is_some() || mx.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_HTTP5XX_METRIC", 50, Some("metrics.http_5xx_rate_p95"), Some("http_5xx series present".to_string()));
    } else {
        confidence += add(&mut breakdown, &mut reasons, "NO_HTTP5XX_METRIC", -40, Some("metrics.http_5xx_rate_p95"), Some("no http_5xx series".to_string()));
    }

    let mut noise = 0;
    if p95.map(|v| v <= 0.001).unwrap_or(false) && mx.map(|v| v <= 0.001).unwrap_or(false) {
        confidence += add(&mut breakdown, &mut reasons, "HTTP5XX_CONTRADICTION_NEAR_ZERO", -40, Some("metrics.http_5xx_rate_p95"), Some("series near zero".to_string()));
        noise += add(&mut breakdown, &mut reasons, "NOISE_HTTP5XX_CONTRADICTION", 20, Some("metrics.http_5xx_rate_p95"), Some("contradiction increases noise".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }

    noise += base_noise(investigation, &mut breakdown, &mut reasons);
    if p95.map(|v| v >= 0.1).unwrap_or(false) {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_HTTP5XX", -20, Some("metrics.http_5xx_rate_p95"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "http_5xx".to_string(),
        one_liner: "HTTP 5xx errors are elevated in this window; investigate upstream dependencies and recent changes.".to_string(),
        next_steps: vec![
            "Confirm 5xx metric scope (service/namespace) and whether it is sustained.".to_string(),
            "Check recent deploys/rollouts and upstream timeouts in logs/traces if available.".to_string(),
            "Correlate with latency spikes and error logs for the same window.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
