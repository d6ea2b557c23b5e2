//! Fallback scorer for families `score_investigation()` doesn't recognize.
//! Ported from the `else` branch of the family dispatch in
//! `agent/pipeline/scoring.py`.

use crate::domain::analysis::{Classification, DeterministicScores, DeterministicVerdict};

pub fn score() -> (DeterministicScores, DeterministicVerdict) {
    let scores = DeterministicScores {
        impact_score: 0,
        confidence_score: 0,
        noise_score: 0,
        reason_codes: vec!["UNSUPPORTED_FAMILY".to_string()],
        breakdown: Vec::new(),
    };
    let verdict = DeterministicVerdict {
        classification: Classification::Informational,
        severity: None,
        primary_driver: "generic".to_string(),
        one_liner: "This alert family has no dedicated scoring model yet; review the raw evidence manually.".to_string(),
        next_steps: vec![
            "Review the gathered evidence (K8s, metrics, logs) in the Appendix.".to_string(),
            "Consider adding a dedicated playbook for this alert family.".to_string(),
        ],
    };
    (scores, verdict)
}
