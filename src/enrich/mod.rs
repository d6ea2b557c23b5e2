//! Family-specific, on-call-first enrichment. Ported from
//! `agent/pipeline/enrich.py`: one `_enrich_*` function per known family,
//! each building a deterministic `label` plus `why`/`next` bullet lists from
//! already-collected evidence and features. Additive to [`crate::pipeline::verdict`]'s
//! base triage decision, never a replacement for it.
//!
//! Every `why`/`next` string is written with `{namespace}`/`{pod}`/
//! `{container}`/`{bucket_name}`/`{sa_name}` placeholders and resolved
//! against evidence by [`build_family_enrichment`] before it reaches the
//! `Decision` the caller sees (spec.md §4.3 step 11).

use crate::domain::analysis::Decision;
use crate::domain::investigation::Investigation;
use crate::pipeline::family::get_family;
use crate::placeholder;

fn podnh_label(investigation: &Investigation) -> String {
    match (&investigation.target.namespace, &investigation.target.pod) {
        (Some(ns), Some(pod)) => format!("pod {ns}/{pod}"),
        (Some(ns), None) => format!("workload in {ns}"),
        _ => "target".to_string(),
    }
}

fn kubectl_describe(investigation: &Investigation) -> Option<String> {
    let ns = investigation.target.namespace.as_deref()?;
    let pod = investigation.target.pod.as_deref()?;
    Some(format!("kubectl describe pod {pod} -n {ns}"))
}

fn kubectl_logs(investigation: &Investigation) -> Option<String> {
    let ns = investigation.target.namespace.as_deref()?;
    let pod = investigation.target.pod.as_deref()?;
    let c = investigation.target.container.as_deref();
    Some(match c {
        Some(c) => format!("kubectl logs {pod} -n {ns} -c {c} --previous --tail=200"),
        None => format!("kubectl logs {pod} -n {ns} --previous --tail=200"),
    })
}

fn enrich_crashloop(investigation: &Investigation) -> Decision {
    let f = investigation.analysis.features.as_ref();
    let mut why = vec![format!("{} is repeatedly restarting (CrashLoopBackOff or high restart rate).", podnh_label(investigation))];
    if let Some(f) = f {
        if let Some(rr) = f.k8s.restart_rate_5m_max {
            why.push(format!("restart_rate_5m_max={rr:.2}"));
        }
    }
    let mut next = vec![
        "sum(increase(kube_pod_container_status_restarts_total{namespace=\"{namespace}\",pod=\"{pod}\"}[15m]))".to_string(),
    ];
    if let Some(cmd) = kubectl_logs(investigation) {
        next.push(cmd);
    }
    if let Some(cmd) = kubectl_describe(investigation) {
        next.push(cmd);
    }
    next.push("Check the Appendix Logs snippet and last-terminated reason before assuming OOM or a bad deploy.".to_string());
    Decision { label: Some("suspected_crashloop".to_string()), why, next }
}

fn enrich_pod_not_healthy(investigation: &Investigation) -> Decision {
    let f = investigation.analysis.features.as_ref();
    let waiting = f.and_then(|f| f.k8s.waiting_reason.clone()).unwrap_or_default();
    let label = match waiting.as_str() {
        "ImagePullBackOff" | "ErrImagePull" => "suspected_image_pull_backoff",
        "CrashLoopBackOff" => "suspected_crashloop",
        _ => "pod_not_ready",
    };
    let mut why = vec![format!("{} is not Ready.", podnh_label(investigation))];
    if !waiting.is_empty() {
        why.push(format!("container waiting reason: {waiting}"));
    }
    let mut next = vec!["kube_pod_status_ready{namespace=\"{namespace}\",pod=\"{pod}\"} == 0".to_string()];
    if label == "suspected_image_pull_backoff" {
        next.push("Verify the image tag/digest exists in the registry and the pull secret is attached to the service account.".to_string());
        next.push("aws ecr describe-images --repository-name {repo} --image-ids imageTag={tag}".to_string());
    }
    if let Some(cmd) = kubectl_describe(investigation) {
        next.push(cmd);
    }
    Decision { label: Some(label.to_string()), why, next }
}

fn enrich_oom_killed(investigation: &Investigation) -> Decision {
    let f = investigation.analysis.features.as_ref();
    let mut why = vec![format!("{} was OOMKilled (derived from K8s events/metrics).", podnh_label(investigation))];
    if let Some(f) = f {
        if let Some(limit) = f.metrics.memory_limit_bytes {
            why.push(format!("memory_limit_bytes={limit}"));
        }
    }
    let next = vec![
        "max_over_time(container_memory_working_set_bytes{namespace=\"{namespace}\",pod=\"{pod}\"}[15m])".to_string(),
        "Compare p95 usage to the configured memory limit/request; raise the limit or fix the leak before retrying.".to_string(),
        "Check the Appendix for container_last_terminated reason=OOMKilled to confirm this isn't an artifact.".to_string(),
    ];
    Decision { label: Some("suspected_oom_crash".to_string()), why, next }
}

fn enrich_memory_pressure(investigation: &Investigation) -> Decision {
    let why = vec!["Node or pod memory usage is trending near its limit.".to_string()];
    let next = vec![
        "(container_memory_working_set_bytes{namespace=\"{namespace}\",pod=\"{pod}\"} / container_spec_memory_limit_bytes{namespace=\"{namespace}\",pod=\"{pod}\"}) > 0.9".to_string(),
        "Check Capacity / Rightsizing in the Appendix for a request/limit recommendation before scaling blindly.".to_string(),
    ];
    let _ = investigation;
    Decision { label: Some("suspected_memory_pressure".to_string()), why, next }
}

fn enrich_cpu_throttling(investigation: &Investigation) -> Decision {
    let f = investigation.analysis.features.as_ref();
    let mut why = vec!["Container CPU usage is being throttled against its configured limit.".to_string()];
    if let Some(f) = f {
        if let Some(pct) = f.metrics.cpu_throttle_p95_pct {
            why.push(format!("cpu_throttle_p95_pct={pct:.2}"));
        }
    }
    let next = vec![
        "rate(container_cpu_cfs_throttled_periods_total{namespace=\"{namespace}\",pod=\"{pod}\"}[5m]) / rate(container_cpu_cfs_periods_total{namespace=\"{namespace}\",pod=\"{pod}\"}[5m])".to_string(),
        "If throttling correlates with traffic, raise the CPU limit or remove it; the Capacity section has a p95-based suggestion.".to_string(),
    ];
    Decision { label: Some("suspected_cpu_throttling".to_string()), why, next }
}

fn enrich_http_5xx(investigation: &Investigation) -> Decision {
    let why = vec!["Elevated 5xx rate observed for this target in the alert window.".to_string()];
    let next = vec![
        "sum(rate(http_requests_total{job=\"{job}\",code=~\"5..\"}[5m])) / sum(rate(http_requests_total{job=\"{job}\"}[5m]))".to_string(),
        "Check Appendix GitHub/Changes for a recent deploy correlated with the onset of errors.".to_string(),
        "Check the Appendix Logs snippet for stack traces tied to the failing endpoint.".to_string(),
    ];
    let _ = investigation;
    Decision { label: Some("suspected_http_5xx".to_string()), why, next }
}

fn enrich_target_down(investigation: &Investigation) -> Decision {
    let mut why = vec!["Prometheus `up{...} == 0` for this scrape target.".to_string()];
    let f = investigation.analysis.features.as_ref();
    let has_k8s = investigation.target.has_k8s_identity();
    if !has_k8s {
        why.push("No K8s identity resolved from labels; cannot confirm whether the pod itself is unhealthy.".to_string());
    }
    let mut next = vec!["up{job=\"{job}\",instance=\"{instance}\"} == 0".to_string()];
    if has_k8s {
        if let Some(cmd) = kubectl_describe(investigation) {
            next.push(cmd);
        }
    } else {
        next.push("Resolve namespace/pod from the scrape job's service discovery config before assuming infra failure.".to_string());
    }
    let _ = f;
    Decision { label: Some(if has_k8s { "suspected_target_down".to_string() } else { "blocked_no_k8s_context".to_string() }), why, next }
}

fn enrich_k8s_rollout_health(investigation: &Investigation) -> Decision {
    let why = vec!["Rollout did not reach the desired ready/updated replica count within the window.".to_string()];
    let next = vec![
        "kube_deployment_status_replicas_unavailable{namespace=\"{namespace}\",deployment=\"{workload_name}\"} > 0".to_string(),
        "kubectl rollout status deployment/{workload_name} -n {namespace}".to_string(),
        "If this followed a deploy, compare the new pod template against the previous revision before rolling back.".to_string(),
    ];
    let _ = investigation;
    Decision { label: Some("suspected_rollout_stuck".to_string()), why, next }
}

fn enrich_observability_pipeline(investigation: &Investigation) -> Decision {
    let why = vec!["A scrape/log-shipping pipeline component itself appears degraded, not the workload it observes.".to_string()];
    let next = vec![
        "up{job=\"{job}\"} == 0".to_string(),
        "Check the exporter/agent's own logs and restarts before investigating the targets it scrapes.".to_string(),
    ];
    let _ = investigation;
    Decision { label: Some("suspected_observability_pipeline_issue".to_string()), why, next }
}

fn enrich_job_failed(investigation: &Investigation) -> Decision {
    let f = investigation.analysis.features.as_ref();
    let mut why = vec!["Kubernetes Job failed (backoff limit reached or explicit failure condition).".to_string()];
    if let Some(jm) = f.and_then(|f| f.job_metrics.as_ref()) {
        if let Some(ec) = jm.get("exit_code") {
            why.push(format!("exit_code={ec}"));
        }
    }
    let next = vec![
        "kube_job_status_failed{namespace=\"{namespace}\",job_name=\"{job}\"} > 0".to_string(),
        "kubectl logs job/{job} -n {namespace} --tail=200".to_string(),
        "Check the Job Metrics in the Appendix (exit_code/exit_reason/attempts) before retrying.".to_string(),
    ];
    Decision { label: Some("suspected_job_failure".to_string()), why, next }
}

fn enrich_meta(investigation: &Investigation) -> Decision {
    let why = vec!["This is a meta/grouping alert (e.g. InfoInhibitor), not a direct symptom.".to_string()];
    let next = vec!["No direct remediation; check the inhibited alerts it groups for the underlying signal.".to_string()];
    let _ = investigation;
    Decision { label: Some("meta_alert".to_string()), why, next }
}

/// Build the placeholder substitution context for this investigation's
/// `why`/`next` templates: target identity straight off `investigation.target`
/// plus whatever bucket/service-account names [`placeholder::build_context`]
/// can infer from logs/pod evidence.
fn substitution_context(investigation: &Investigation) -> std::collections::HashMap<String, String> {
    let log_text = investigation
        .evidence
        .logs
        .parsed_errors
        .as_ref()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    let mut ctx = placeholder::build_context(
        investigation.target.namespace.as_deref(),
        investigation.target.pod.as_deref(),
        investigation.target.container.as_deref(),
        &log_text,
        investigation.evidence.k8s.pod_info.as_ref(),
    );
    if let Some(job) = &investigation.target.job {
        ctx.insert("job".to_string(), job.clone());
    }
    if let Some(workload_name) = &investigation.target.workload_name {
        ctx.insert("workload_name".to_string(), workload_name.clone());
    }
    if let Some(instance) = &investigation.target.instance {
        ctx.insert("instance".to_string(), instance.clone());
    }
    ctx
}

fn resolve_decision(mut decision: Decision, ctx: &std::collections::HashMap<String, String>) -> Decision {
    decision.why = decision.why.iter().map(|s| placeholder::resolve(s, ctx)).collect();
    decision.next = decision.next.iter().map(|s| placeholder::resolve(s, ctx)).collect();
    decision
}

/// Dispatch to the per-family enrichment function. Returns `None` for the
/// `generic` family (and any unrecognized family), matching
/// `build_family_enrichment()`'s fallback. Every returned `why`/`next`
/// string has its `{namespace}`/`{pod}`/… placeholders resolved against
/// this investigation's target and evidence.
pub fn build_family_enrichment(investigation: &Investigation) -> Option<Decision> {
    let family = get_family(investigation, "").to_string();
    let decision = match family.as_str() {
        "crashloop" => enrich_crashloop(investigation),
        "pod_not_healthy" => enrich_pod_not_healthy(investigation),
        "oom_killed" => enrich_oom_killed(investigation),
        "memory_pressure" => enrich_memory_pressure(investigation),
        "cpu_throttling" => enrich_cpu_throttling(investigation),
        "http_5xx" => enrich_http_5xx(investigation),
        "target_down" => enrich_target_down(investigation),
        "k8s_rollout_health" => enrich_k8s_rollout_health(investigation),
        "observability_pipeline" => enrich_observability_pipeline(investigation),
        "job_failed" => enrich_job_failed(investigation),
        "meta" => enrich_meta(investigation),
        _ => return None,
    };
    Some(resolve_decision(decision, &substitution_context(investigation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use chrono::Utc;

    fn fresh_investigation(family: &str) -> Investigation {
        let mut inv = Investigation::new(
            AlertInstance::default(),
            TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() },
        );
        inv.meta.insert("family".to_string(), serde_json::Value::String(family.to_string()));
        inv
    }

    #[test]
    fn generic_family_has_no_enrichment() {
        assert!(build_family_enrichment(&fresh_investigation("generic")).is_none());
    }

    #[test]
    fn crashloop_enrichment_has_label_and_next_steps() {
        let d = build_family_enrichment(&fresh_investigation("crashloop")).unwrap();
        assert_eq!(d.label.as_deref(), Some("suspected_crashloop"));
        assert!(!d.next.is_empty());
    }
}
