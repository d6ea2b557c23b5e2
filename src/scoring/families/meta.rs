//! Ported from `score_meta()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{Classification, DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, base_noise, clamp_0_100};

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut confidence = 0;

    let is_inhibitor = investigation.alert.label("alertname") == Some("InfoInhibitor");

    let mut noise = base_noise(investigation, &mut breakdown, &mut reasons);
    if is_inhibitor {
        noise += add(&mut breakdown, &mut reasons, "META_ALERT", 90, Some("alert.alertname"), Some("InfoInhibitor is a meta alert".to_string()));
        confidence += add(&mut breakdown, &mut reasons, "EVID_META_ALERTNAME", 70, Some("alert.alertname"), Some("alertname identifies meta alert".to_string()));
        add(&mut breakdown, &mut reasons, "IMPACT_LOW_META", 0, Some("alert.alertname"), Some("meta alerts carry no direct impact".to_string()));
    } else {
        noise += add(&mut breakdown, &mut reasons, "META_FAMILY", 60, Some("alert.labels"), Some("classified as meta family".to_string()));
        confidence += add(&mut breakdown, &mut reasons, "EVID_META_FAMILY", 40, Some("alert.labels"), Some("family classification corroborates".to_string()));
    }

    let impact = clamp_0_100(0);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);

    let classification = if noise >= 70 { Classification::Noisy } else { Classification::Informational };

    let one_liner = if is_inhibitor {
        "InfoInhibitor is a meta alert used by Alertmanager to suppress lower-severity alerts; it is not itself actionable.".to_string()
    } else {
        "This alert is a meta/inhibitor-style signal rather than a direct symptom of a failing workload.".to_string()
    };

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "meta".to_string(),
        one_liner,
        next_steps: vec![
            "No direct action needed; check whether it is suppressing other alerts as intended.".to_string(),
            "If this fires unexpectedly often, review the alerting rule and routing tree.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
