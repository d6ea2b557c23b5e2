//! Base triage decision: on-call-first framing built purely from scope and
//! "can we even investigate this" discriminators, before any family-specific
//! enrichment runs. Ported from `build_base_decision()` in
//! `agent/pipeline/verdict.py`.

use crate::domain::analysis::Decision;
use crate::domain::investigation::Investigation;
use crate::scoring::firing_instances;

fn alertname(investigation: &Investigation) -> String {
    investigation.alert.alertname().unwrap_or("Unknown").to_string()
}

/// Label the blast radius from Prometheus's own firing/active instance
/// counts, when available. Falls back to "Scope=unknown" rather than
/// guessing from alert labels alone. Thresholds per spec.md §4.5 /
/// `verdict.py::_scope_label`.
fn scope_label(investigation: &Investigation) -> String {
    let Some(fi) = firing_instances(investigation) else {
        return "Scope=unknown".to_string();
    };
    let n = fi as i64;
    match n {
        1 => "Single-instance".to_string(),
        2..=5 => "Small".to_string(),
        6..=20 => "Multi-instance".to_string(),
        21..=49 => "Broad".to_string(),
        50..=100 => "Widespread".to_string(),
        n if n >= 101 => "Massive".to_string(),
        _ => "Scope=unknown".to_string(),
    }
}

fn prometheus_unavailable(investigation: &Investigation) -> bool {
    investigation
        .analysis
        .noise
        .as_ref()
        .map(|n| n.prometheus.is_none())
        .unwrap_or(true)
}

fn target_identity_missing(investigation: &Investigation) -> bool {
    use crate::domain::target::TargetType;
    matches!(investigation.target.target_type, TargetType::Pod | TargetType::Workload)
        && !investigation.target.has_k8s_identity()
}

fn k8s_context_missing(investigation: &Investigation) -> bool {
    investigation.target.has_k8s_identity() && investigation.evidence.k8s.pod_info.is_none()
}

fn job_pods_not_found(investigation: &Investigation) -> bool {
    investigation
        .analysis
        .features
        .as_ref()
        .map(|f| f.family == "job_failed")
        .unwrap_or(false)
        && investigation.evidence.k8s.pod_info.is_none()
        && investigation.target.workload_name.is_some()
}

fn logs_missing(investigation: &Investigation) -> bool {
    matches!(investigation.evidence.logs.logs_status.as_deref(), None | Some("unavailable") | Some("error"))
}

fn missing_labels(investigation: &Investigation) -> Vec<String> {
    investigation
        .analysis
        .noise
        .as_ref()
        .and_then(|n| n.missing_labels.as_ref())
        .map(|m| m.missing.clone())
        .unwrap_or_default()
}

/// Fixed priority order for discriminator tags, most-blocking first.
/// Matches spec.md §4.5 and `verdict.py::_DISCRIMINATOR_ORDER`.
const DISCRIMINATOR_ORDER: &[&str] = &[
    "blocked_prometheus_unavailable",
    "blocked_no_target_identity",
    "blocked_no_k8s_context",
    "blocked_job_pods_not_found",
    "logs_missing",
    "blocked_no_scope_no_identity",
];

/// De-dupe while keeping first-seen order, then sort by the fixed priority
/// table (unknown tags sort last, stably).
fn order_discriminators(mut discriminators: Vec<&'static str>) -> Vec<&'static str> {
    let mut seen = std::collections::HashSet::new();
    discriminators.retain(|d| seen.insert(*d));
    discriminators.sort_by_key(|d| DISCRIMINATOR_ORDER.iter().position(|o| o == d).unwrap_or(usize::MAX));
    discriminators
}

/// Build the base, family-agnostic triage decision. Every applicable
/// discriminator is accumulated (not just the highest-priority one), then
/// de-duped and sorted into the fixed priority order before being joined
/// into the label, per spec.md §4.5/§8 scenario 6 ("both discriminators
/// appear in the Decision label in priority order").
pub fn build_base_decision(investigation: &Investigation) -> Decision {
    let scope = scope_label(investigation);
    let name = alertname(investigation);
    let mut why = vec![format!("Alert: {name}"), scope.clone()];
    let mut next: Vec<String> = Vec::new();

    let missing = missing_labels(investigation);
    let prom_unavailable = prometheus_unavailable(investigation);
    let identity_missing = target_identity_missing(investigation);
    let no_scope_no_identity = prom_unavailable && identity_missing;

    let mut discriminators: Vec<&'static str> = Vec::new();

    if prom_unavailable {
        why.push("Prometheus evidence was unavailable for this alert window.".to_string());
        next.push("Confirm Prometheus is reachable and the alert's PromQL expression still resolves.".to_string());
        discriminators.push("blocked_prometheus_unavailable");
    }
    if identity_missing {
        why.push("Alert labels did not resolve to a namespace + pod/workload identity.".to_string());
        next.push("Check the alert rule's labels; this playbook needs namespace and pod or workload_name.".to_string());
        discriminators.push("blocked_no_target_identity");
    }
    if k8s_context_missing(investigation) {
        why.push("Could not fetch Kubernetes pod context (API error, RBAC, or the pod no longer exists).".to_string());
        if let (Some(ns), Some(pod)) = (&investigation.target.namespace, &investigation.target.pod) {
            next.push(format!("kubectl get pod {pod} -n {ns} -o yaml"));
        }
        discriminators.push("blocked_no_k8s_context");
    }
    if job_pods_not_found(investigation) {
        why.push("No pods were found for this Job in the evidence window (may have already been garbage-collected).".to_string());
        next.push("kubectl get pods -n <ns> -l job-name=<job> --show-labels".to_string());
        discriminators.push("blocked_job_pods_not_found");
    }
    if logs_missing(investigation) {
        why.push("Log evidence was unavailable or failed to collect for this window.".to_string());
        next.push("Verify the logging backend URL/credentials and that the selector matches a real label set.".to_string());
        discriminators.push("logs_missing");
    }
    if no_scope_no_identity {
        why.push("Neither scope nor a K8s target identity could be determined from this alert's labels.".to_string());
        next.push("Add namespace/pod (or workload) labels to the alerting rule so investigations can scope evidence.".to_string());
        discriminators.push("blocked_no_scope_no_identity");
    }

    let discriminators = order_discriminators(discriminators);

    let disc_txt = if discriminators.is_empty() {
        "Discriminator=present".to_string()
    } else if discriminators.len() == 1 {
        format!("Discriminator={}", discriminators[0])
    } else {
        format!("Discriminators={}", discriminators.join(","))
    };
    let label = format!("{scope} • Impact=unknown • {disc_txt}");

    if !missing.is_empty() {
        why.push(format!("Missing critical labels: {}", missing.join(", ")));
    }

    why.truncate(10);
    next.truncate(7);
    Decision { label: Some(label), why, next }
}
