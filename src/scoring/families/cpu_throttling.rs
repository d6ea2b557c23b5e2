//! Ported from `score_cpu_throttling()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{Classification, DebugInfo, DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, clamp_0_100};

pub fn score(investigation: &mut Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;
    let mut noise = 0;

    let t = f.metrics.cpu_throttle_p95_pct;
    let near = f.metrics.cpu_near_limit == Some(true);

    let usage_vs_limit = if investigation.target.container.is_none() && f.metrics.cpu_throttle_top_container_usage_limit_ratio.is_some() {
        f.metrics.cpu_throttle_top_container_usage_limit_ratio
    } else {
        match (f.metrics.cpu_usage_p95_cores, f.metrics.cpu_limit_cores) {
            (Some(u), Some(lim)) if lim > 0.0 => Some(u / lim),
            _ => None,
        }
    };

    if let Some(t) = t {
        if t > 25.0 {
            let delta = if near { 60 } else { 30 };
            impact += add(&mut breakdown, &mut reasons, "THROTTLING_P95_HIGH", delta, Some("metrics.cpu_throttle_p95_pct"), Some(format!("p95={t:.2}% (near_limit={near})")));
        }
    }

    if t.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_THROTTLING_METRIC", 40, Some("metrics.cpu_throttle_p95_pct"), Some("throttling series present".to_string()));
    }
    if let Some(uvl) = usage_vs_limit {
        confidence += add(&mut breakdown, &mut reasons, "EVID_USAGE_LIMIT_COMPUTED", 20, Some("metrics.cpu_usage_p95_cores,metrics.cpu_limit_cores"), Some(format!("p95 usage/limit={uvl:.2}")));
    }
    if f.k8s.ready == Some(true) {
        confidence += add(&mut breakdown, &mut reasons, "EVID_K8S_READY", 10, Some("k8s.ready"), Some("pod Ready=True".to_string()));
    }
    if investigation.target.namespace.is_some() && investigation.target.pod.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_TARGET_LABELS", 10, Some("target.namespace,target.pod"), Some("namespace+pod present".to_string()));
    }
    if t.map(|v| v <= 1.0).unwrap_or(false) {
        confidence += add(&mut breakdown, &mut reasons, "THROTTLING_NOT_REPRODUCED", -40, Some("metrics.cpu_throttle_p95_pct"), Some(format!("p95={:.2}%", t.unwrap())));
        noise += add(&mut breakdown, &mut reasons, "NOISE_RECOVERED_OR_MISMATCH", 20, Some("metrics.cpu_throttle_p95_pct"), Some("alert may have recovered or query/label mismatch".to_string()));
    }
    if t.map(|v| v > 25.0).unwrap_or(false) && usage_vs_limit.map(|v| v < 0.2).unwrap_or(false) {
        confidence += add(&mut breakdown, &mut reasons, "THROTTLING_HIGH_BUT_USAGE_LOW", -10, Some("metrics.cpu_usage_p95_cores,metrics.cpu_limit_cores"), Some(format!("usage/limit={:.2} < 0.20", usage_vs_limit.unwrap())));
        noise += add(&mut breakdown, &mut reasons, "NOISE_POSSIBLE_ARTIFACT", 15, Some("metrics.cpu_throttle_p95_pct"), Some("high throttling with low CPU usage".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }

    if let Some(ni) = &investigation.analysis.noise {
        let flap_score = ni.flap.as_ref().map(|f| f.flap_score_0_100).unwrap_or(0);
        if flap_score >= 80 {
            noise += add(&mut breakdown, &mut reasons, "NOISE_FLAP_HIGH", 40, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
        } else if flap_score >= 40 {
            noise += add(&mut breakdown, &mut reasons, "NOISE_FLAP_MED", 20, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
        }
        let mut eph: Vec<String> = ni.cardinality.as_ref().map(|c| c.ephemeral_labels_present.clone()).unwrap_or_default();
        if investigation.target.workload_kind.is_some() && investigation.target.workload_name.is_some() {
            eph.retain(|e| e != "pod" && e != "pod_name");
        }
        if !eph.is_empty() {
            let delta = (10 * eph.len() as i32).min(30);
            let why = eph.iter().take(6).cloned().collect::<Vec<_>>().join(",");
            noise += add(&mut breakdown, &mut reasons, "NOISE_CARDINALITY", delta, Some("noise.cardinality.ephemeral_labels_present"), Some(why));
        }
    }
    let contradicted_by_low_usage = t.map(|v| v > 25.0).unwrap_or(false) && usage_vs_limit.map(|v| v < 0.2).unwrap_or(false);
    if t.map(|v| v > 25.0).unwrap_or(false) && !contradicted_by_low_usage {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_THROTTLING", -10, Some("metrics.cpu_throttle_p95_pct"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);

    let classification = if confidence < 30
        && (t.is_none()
            || t.map(|v| v <= 1.0).unwrap_or(false)
            || f.quality.missing_inputs.iter().any(|m| m == "labels.namespace")
            || f.quality.missing_inputs.iter().any(|m| m == "labels.pod"))
    {
        Classification::Artifact
    } else if noise >= 70 {
        Classification::Noisy
    } else if impact >= 60 && confidence >= 60 && noise <= 60 && near {
        Classification::Actionable
    } else {
        Classification::Informational
    };

    let (one_liner, next_steps) = if confidence < 30 {
        (
            "Insufficient or inconsistent evidence to confirm CPU throttling for this pod in the selected window.".to_string(),
            vec![
                "Verify alert labels (namespace/pod/container) and ensure PromQL filters exclude infra/empty containers (container!=POD, container!=\"\", image!=\"\").".to_string(),
                "Re-run investigation using the alert start window or widen the time range.".to_string(),
            ],
        )
    } else if t.map(|v| v > 25.0).unwrap_or(false) && near {
        (
            "CPU throttling is high and CPU usage is near the configured limit; this is likely capacity-related.".to_string(),
            vec![
                "Increase CPU limit or scale replicas and re-check throttling p95.".to_string(),
                "Correlate with latency/errors during the same window (if available) to confirm user impact.".to_string(),
            ],
        )
    } else if t.map(|v| v > 25.0).unwrap_or(false) && !near {
        if usage_vs_limit.map(|v| v < 0.2).unwrap_or(false) {
            let uvl = usage_vs_limit.unwrap();
            let one_liner = format!(
                "CPU throttling p95 is high, but CPU usage is far from the configured limit; usage/limit p95 is ~{:.2} ({:.0}%), so raising limits is unlikely to help.",
                uvl,
                uvl * 100.0
            );
            let mut steps = if let Some(top) = &f.metrics.cpu_throttle_top_container {
                vec![
                    format!("Inferred top throttled container (from metrics): `{top}` (p95 throttling ~{:.2}%).", f.metrics.cpu_throttle_top_container_p95_pct.unwrap_or(0.0)),
                    "Prometheus: per-container throttling (top 3) (see debug promql in JSON / Appendix).".to_string(),
                    "If no logs/app metrics are available for this target, consider enabling Loki for this namespace or exposing RED metrics to assess impact.".to_string(),
                ]
            } else {
                vec![
                    "Prometheus: per-container throttling (top 3) (see debug promql in JSON / Appendix).".to_string(),
                    "If no logs/app metrics are available for this target, consider enabling Loki for this namespace or exposing RED metrics to assess impact.".to_string(),
                ]
            };
            let ns = investigation.target.namespace.clone().unwrap_or_default();
            let pod = investigation.target.pod.clone().unwrap_or_default();
            let query = format!(
                "topk(3, max by(container) (100 * sum by(container) (increase(container_cpu_cfs_throttled_periods_total{{namespace=\"{ns}\",pod=\"{pod}\",image!=\"\",container!=\"\",container!=\"POD\"}}[5m])) / clamp_min(sum by(container) (increase(container_cpu_cfs_periods_total{{namespace=\"{ns}\",pod=\"{pod}\",image!=\"\",container!=\"\",container!=\"POD\"}}[5m])), 1)))"
            );
            investigation.analysis.debug.get_or_insert_with(DebugInfo::default).promql.insert("cpu_throttling_top_containers".to_string(), query);
            steps.truncate(3);
            (one_liner, steps)
        } else {
            (
                "CPU throttling p95 is high, but CPU usage is not near the limit; validate whether this is impacting the service before taking action.".to_string(),
                vec![
                    "Correlate with latency/errors or timeout logs during the same window.".to_string(),
                    "If impact exists, consider scaling replicas or increasing CPU limit; otherwise treat as informational.".to_string(),
                ],
            )
        }
    } else {
        (
            "CPU throttling is not elevated in the selected window; the alert may have recovered.".to_string(),
            vec![
                "Re-run using the alert start time window or widen the time range.".to_string(),
                "If the alert keeps flapping, review the alert rule threshold/window and label filters.".to_string(),
            ],
        )
    };

    let verdict = DeterministicVerdict { classification, severity: None, primary_driver: "cpu_throttling".to_string(), one_liner, next_steps };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
