//! Optional, best-effort confidence calibration against previously resolved
//! similar cases. Ported from `agent/diagnostics/memory_calibration.py`.
//!
//! The Postgres-backed case memory store itself is out of scope for this
//! crate (see `DESIGN.md`); the retrieval seam lives in
//! `providers::postgres` ([`CaseRetriever`]/[`NullCaseRetriever`]). This
//! module owns the resolution-category mapping and the boost arithmetic,
//! which are plain and fully testable without a database.

use crate::domain::analysis::Hypothesis;
use crate::domain::investigation::Investigation;
use crate::providers::postgres::{CaseRetriever, SimilarCase};
use std::collections::HashMap;

pub use crate::providers::postgres::NullCaseRetriever;

/// Map a hypothesis ID to the coarse resolution category it would fall
/// under if confirmed, or `None` if the hypothesis has no memory-backed
/// category. Ported verbatim from `_hypothesis_to_resolution_category`.
fn hypothesis_to_resolution_category(hypothesis_id: &str) -> Option<&'static str> {
    match hypothesis_id.trim().to_lowercase().as_str() {
        "cpu_capacity_limit" => Some("capacity"),
        "memory_limit_oom" => Some("capacity"),
        "memory_pressure" => Some("capacity"),
        "rollout_blocked_or_regression" => Some("k8s_rollout"),
        "misconfig_or_missing_secret_configmap" => Some("config"),
        "image_pull_failure" => Some("config"),
        "meta_alert" => Some("unknown"),
        "scrape_target_unreachable" => Some("unknown"),
        "upstream_or_regression" => Some("unknown"),
        "crashloop_app_failure" => Some("unknown"),
        "obs_pipeline_degraded" => Some("unknown"),
        _ => None,
    }
}

/// Count resolved similar cases by category. Returns `(total, counts)`.
fn resolution_stats(similar: &[SimilarCase]) -> (usize, HashMap<String, usize>) {
    let mut total = 0;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for case in similar {
        let cat = case.resolution_category.trim().to_lowercase();
        if cat.is_empty() {
            continue;
        }
        total += 1;
        *counts.entry(cat).or_insert(0) += 1;
    }
    (total, counts)
}

/// Best-effort, non-blocking memory-based calibration. Boosts a
/// hypothesis's confidence when similar resolved cases are dominated by its
/// resolution category; never decreases confidence. Ported verbatim from
/// `maybe_boost_hypotheses_from_memory`, minus the `MEMORY_ENABLED` gate
/// (callers decide whether to pass a real retriever at all).
pub fn maybe_boost_hypotheses_from_memory(investigation: &Investigation, hyps: &mut [Hypothesis], retriever: &dyn CaseRetriever) {
    if hyps.is_empty() {
        return;
    }

    let similar = retriever.find_similar_runs(investigation, 20);
    if similar.is_empty() {
        return;
    }

    let (total, counts) = resolution_stats(&similar);
    if total < 3 {
        return;
    }

    for hyp in hyps.iter_mut() {
        let Some(category) = hypothesis_to_resolution_category(&hyp.hypothesis_id) else { continue };
        let n = counts.get(category).copied().unwrap_or(0);
        let frac = n as f64 / total as f64;
        if n >= 2 && frac >= 0.6 {
            let bump = if frac < 0.8 { 10 } else { 20 };
            hyp.confidence_0_100 = (hyp.confidence_0_100 + bump).clamp(0, 100);

            let note = format!("Memory: {n}/{total} similar resolved cases were categorized as `{category}`.");
            if !hyp.why.contains(&note) {
                hyp.why.push(note);
            }
            let reference = "memory.similar_cases".to_string();
            if !hyp.supporting_refs.contains(&reference) {
                hyp.supporting_refs.push(reference);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use chrono::Utc;

    fn investigation() -> Investigation {
        let alert = AlertInstance::default();
        let window = TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() };
        Investigation::new(alert, window)
    }

    fn hypothesis(id: &str, confidence: i32) -> Hypothesis {
        Hypothesis { hypothesis_id: id.to_string(), title: id.to_string(), confidence_0_100: confidence, why: Vec::new(), supporting_refs: Vec::new(), counter_refs: Vec::new(), next_tests: Vec::new(), proposed_actions: Vec::new() }
    }

    struct FixedRetriever(Vec<SimilarCase>);
    impl CaseRetriever for FixedRetriever {
        fn find_similar_runs(&self, _investigation: &Investigation, _limit: usize) -> Vec<SimilarCase> {
            self.0.clone()
        }
    }

    #[test]
    fn null_retriever_never_boosts() {
        let inv = investigation();
        let mut hyps = vec![hypothesis("memory_pressure", 50)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &NullCaseRetriever);
        assert_eq!(hyps[0].confidence_0_100, 50);
    }

    #[test]
    fn dominant_category_boosts_by_ten() {
        let inv = investigation();
        let similar = vec![
            SimilarCase { resolution_category: "capacity".to_string() },
            SimilarCase { resolution_category: "capacity".to_string() },
            SimilarCase { resolution_category: "config".to_string() },
        ];
        let retriever = FixedRetriever(similar);
        let mut hyps = vec![hypothesis("memory_pressure", 50)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &retriever);
        assert_eq!(hyps[0].confidence_0_100, 60);
        assert!(hyps[0].why.iter().any(|w| w.contains("2/3 similar resolved cases")));
        assert!(hyps[0].supporting_refs.contains(&"memory.similar_cases".to_string()));
    }

    #[test]
    fn strongly_dominant_category_boosts_by_twenty() {
        let inv = investigation();
        let similar = vec![SimilarCase { resolution_category: "capacity".to_string() }; 5];
        let retriever = FixedRetriever(similar);
        let mut hyps = vec![hypothesis("cpu_capacity_limit", 40)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &retriever);
        assert_eq!(hyps[0].confidence_0_100, 60);
    }

    #[test]
    fn boost_never_exceeds_100() {
        let inv = investigation();
        let similar = vec![SimilarCase { resolution_category: "capacity".to_string() }; 5];
        let retriever = FixedRetriever(similar);
        let mut hyps = vec![hypothesis("memory_pressure", 95)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &retriever);
        assert_eq!(hyps[0].confidence_0_100, 100);
    }

    #[test]
    fn too_few_similar_cases_skips_calibration() {
        let inv = investigation();
        let similar = vec![SimilarCase { resolution_category: "capacity".to_string() }; 2];
        let retriever = FixedRetriever(similar);
        let mut hyps = vec![hypothesis("memory_pressure", 50)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &retriever);
        assert_eq!(hyps[0].confidence_0_100, 50);
    }

    #[test]
    fn unmapped_hypothesis_id_is_never_boosted() {
        let inv = investigation();
        let similar = vec![SimilarCase { resolution_category: "capacity".to_string() }; 5];
        let retriever = FixedRetriever(similar);
        let mut hyps = vec![hypothesis("crashloop_oom", 50)];
        maybe_boost_hypotheses_from_memory(&inv, &mut hyps, &retriever);
        assert_eq!(hyps[0].confidence_0_100, 50);
    }
}
