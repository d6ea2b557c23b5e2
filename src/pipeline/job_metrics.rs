//! Job-specific derived metrics, computed only for the `job_failed` family.
//! Ported from `agent/pipeline/job_metrics.py`: summarizes a Job's
//! completion/failure counts and log-parsing stats into the catch-all
//! `DerivedFeatures.job_metrics` bag, which the Markdown report's appendix
//! prints verbatim as a small table rather than through named fields (the
//! set of interesting job counters varies too much across job types to be
//! worth a dedicated struct — see `DESIGN.md`).

use crate::domain::investigation::Investigation;
use serde_json::Value;
use std::collections::HashMap;

pub fn compute(investigation: &Investigation) -> HashMap<String, Value> {
    let mut out = HashMap::new();

    if let Some(rollout) = &investigation.evidence.k8s.rollout_status {
        for key in ["active", "succeeded", "failed", "completions", "parallelism"] {
            if let Some(v) = rollout.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        }
    }

    if let Some(parsing) = &investigation.evidence.logs.parsing_metadata {
        for key in ["error_count", "fatal_count", "exception_count", "total_lines"] {
            if let Some(v) = parsing.get(key) {
                out.insert(format!("logs_{key}"), v.clone());
            }
        }
    }

    if let Some(pod_info) = &investigation.evidence.k8s.pod_info {
        if let Some(phase) = pod_info.get("phase") {
            out.insert("pod_phase".to_string(), phase.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertInstance, TimeWindow};
    use chrono::Utc;

    #[test]
    fn empty_evidence_yields_empty_metrics() {
        let inv = Investigation::new(
            AlertInstance::default(),
            TimeWindow { window: "5m".into(), start_time: Utc::now(), end_time: Utc::now() },
        );
        assert!(compute(&inv).is_empty());
    }

    #[test]
    fn pulls_rollout_counts() {
        let mut inv = Investigation::new(
            AlertInstance::default(),
            TimeWindow { window: "5m".into(), start_time: Utc::now(), end_time: Utc::now() },
        );
        inv.evidence.k8s.rollout_status =
            Some(HashMap::from([("failed".to_string(), Value::from(2))]));
        let metrics = compute(&inv);
        assert_eq!(metrics.get("failed").and_then(Value::as_i64), Some(2));
    }
}
