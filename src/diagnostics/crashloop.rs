//! Crashloop diagnostic module: a four-layer, deterministic diagnosis that
//! tries the cheapest, highest-signal explanation first. Ported 1:1 from
//! `agent/diagnostics/crashloop_diagnostics.py`:
//!
//! 1. Exit-code differentiation (137=OOM, 139=segfault, 0=probe kill,
//!    1=app error with a crash-duration heuristic).
//! 2. Probe-failure events (liveness/readiness `Unhealthy`).
//! 3. Log-pattern matches against current *and* previous-container logs.
//! 4. A generic fallback hypothesis when nothing more specific matched.

use super::patterns::{crashloop_patterns, resolve_placeholders, LogPatternMatcher};
use super::DiagnosticModule;
use crate::domain::analysis::Hypothesis;
use crate::domain::investigation::Investigation;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

static MATCHER: Lazy<LogPatternMatcher> = Lazy::new(|| LogPatternMatcher::new(crashloop_patterns()));

pub struct CrashLoopDiagnosticModule;

impl DiagnosticModule for CrashLoopDiagnosticModule {
    fn module_id(&self) -> &'static str {
        "crashloop"
    }

    fn applies(&self, investigation: &Investigation) -> bool {
        investigation.analysis.features.as_ref().map(|f| f.family == "crashloop").unwrap_or(false)
    }

    fn diagnose(&self, investigation: &Investigation) -> Vec<Hypothesis> {
        let mut hyps = Vec::new();
        let features = investigation.analysis.features.as_ref();

        layer1_exit_code(investigation, features, &mut hyps);
        layer2_probe_failure(investigation, &mut hyps);
        layer3_log_patterns(investigation, &mut hyps);
        layer4_fallback(features, &mut hyps);

        hyps
    }
}

fn layer1_exit_code(investigation: &Investigation, features: Option<&crate::domain::analysis::DerivedFeatures>, hyps: &mut Vec<Hypothesis>) {
    let term = features.and_then(|f| f.k8s.container_last_terminated_top.first());
    let exit_code = term.and_then(|t| t.exit_code);
    let exit_reason = term.and_then(|t| t.reason.as_deref()).unwrap_or("").trim().to_string();

    if exit_code == Some(137) || exit_reason.eq_ignore_ascii_case("oomkilled") {
        hyps.push(Hypothesis {
            hypothesis_id: "crashloop_oom".to_string(),
            title: "Container OOMKilled (exit code 137)".to_string(),
            confidence_0_100: 80,
            why: vec![
                format!("Container terminated with exit code {} (reason={}).", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "137".to_string()), if exit_reason.is_empty() { "n/a".to_string() } else { exit_reason.clone() }),
                "Exit code 137 indicates the container was killed by the OOM killer.".to_string(),
            ],
            supporting_refs: vec!["features.k8s.container_last_terminated_top".to_string()],
            counter_refs: Vec::new(),
            next_tests: vec![
                "Check memory limits vs actual usage:".to_string(),
                "max by (container) (kube_pod_container_resource_limits{namespace=\"<ns>\",pod=\"<pod>\",resource=\"memory\"})".to_string(),
                "quantile_over_time(0.95, container_memory_working_set_bytes{namespace=\"<ns>\",pod=\"<pod>\",container!=\"POD\",image!=\"\"}[30m])".to_string(),
                "kubectl -n <ns> describe pod <pod>  # check lastState.terminated.reason".to_string(),
            ],
            proposed_actions: Vec::new(),
        });
    } else if exit_code == Some(139) {
        hyps.push(Hypothesis {
            hypothesis_id: "crashloop_segfault".to_string(),
            title: "Container segmentation fault (exit code 139)".to_string(),
            confidence_0_100: 75,
            why: vec![
                "Container terminated with exit code 139 (SIGSEGV).".to_string(),
                "This usually indicates a memory corruption bug in native code.".to_string(),
            ],
            supporting_refs: vec!["features.k8s.container_last_terminated_top".to_string()],
            counter_refs: Vec::new(),
            next_tests: vec![
                "kubectl -n <ns> logs <pod> -c <container> --previous --tail=200".to_string(),
                "Check if a recent image update introduced native library changes.".to_string(),
                "kubectl -n <ns> describe pod <pod>  # check image tag/digest".to_string(),
            ],
            proposed_actions: Vec::new(),
        });
    } else if exit_code == Some(0) {
        hyps.push(Hypothesis {
            hypothesis_id: "crashloop_liveness_probe".to_string(),
            title: "Container exits cleanly but restarts (possible liveness probe kill)".to_string(),
            confidence_0_100: 70,
            why: vec![
                "Container exited with code 0 (clean exit) but is restarting.".to_string(),
                "This often indicates a liveness probe is killing the container before it becomes ready.".to_string(),
            ],
            supporting_refs: vec!["features.k8s.container_last_terminated_top".to_string(), "k8s.pod_events".to_string()],
            counter_refs: Vec::new(),
            next_tests: vec![
                "kubectl -n <ns> describe pod <pod>  # check liveness probe config and events".to_string(),
                "Review liveness probe timeout/period settings — may need tuning for slow-starting apps.".to_string(),
            ],
            proposed_actions: Vec::new(),
        });
    } else if exit_code == Some(1) {
        let crash_duration = investigation.meta.get("crash_duration_seconds").and_then(Value::as_f64);
        let (confidence, hint) = match crash_duration {
            Some(d) if d < 10.0 => (65, "Instant crash (<10s) suggests config or dependency issue at startup."),
            Some(d) if d > 60.0 => (60, "Slow crash (>60s) suggests runtime failure (timeout, memory leak, etc.)."),
            _ => (60, "Application error — check logs for the root cause."),
        };
        hyps.push(Hypothesis {
            hypothesis_id: "crashloop_app_error".to_string(),
            title: "Application error (exit code 1)".to_string(),
            confidence_0_100: confidence,
            why: vec!["Container terminated with exit code 1 (application error).".to_string(), hint.to_string()],
            supporting_refs: vec!["features.k8s.container_last_terminated_top".to_string(), "logs.logs".to_string()],
            counter_refs: Vec::new(),
            next_tests: vec!["kubectl -n <ns> logs <pod> -c <container> --previous --tail=200".to_string(), "kubectl -n <ns> describe pod <pod>".to_string()],
            proposed_actions: Vec::new(),
        });
    }
}

fn layer2_probe_failure(investigation: &Investigation, hyps: &mut Vec<Hypothesis>) {
    let probe_type = investigation.meta.get("probe_failure_type").and_then(Value::as_str).unwrap_or("");
    if probe_type == "liveness" {
        if !hyps.iter().any(|h| h.hypothesis_id == "crashloop_liveness_probe") {
            hyps.push(Hypothesis {
                hypothesis_id: "crashloop_liveness_probe_failure".to_string(),
                title: "Liveness probe failing (container killed by kubelet)".to_string(),
                confidence_0_100: 75,
                why: vec![
                    "Liveness probe Unhealthy events detected in pod events.".to_string(),
                    "Kubelet kills the container when liveness probe fails, causing CrashLoopBackOff.".to_string(),
                ],
                supporting_refs: vec!["k8s.pod_events".to_string(), "meta.probe_failure_type".to_string()],
                counter_refs: Vec::new(),
                next_tests: vec![
                    "kubectl -n <ns> describe pod <pod>  # check liveness probe configuration".to_string(),
                    "Review probe initialDelaySeconds — may be too short for slow-starting apps.".to_string(),
                    "Check if the health endpoint is actually responding:".to_string(),
                    "kubectl -n <ns> exec <pod> -- curl -s localhost:<port>/healthz".to_string(),
                ],
                proposed_actions: Vec::new(),
            });
        }
    } else if probe_type == "readiness" {
        hyps.push(Hypothesis {
            hypothesis_id: "crashloop_readiness_probe_failure".to_string(),
            title: "Readiness probe failing (container not receiving traffic)".to_string(),
            confidence_0_100: 60,
            why: vec![
                "Readiness probe Unhealthy events detected in pod events.".to_string(),
                "Readiness failures alone don't cause restarts but indicate the app is not healthy.".to_string(),
            ],
            supporting_refs: vec!["k8s.pod_events".to_string(), "meta.probe_failure_type".to_string()],
            counter_refs: Vec::new(),
            next_tests: vec![
                "kubectl -n <ns> describe pod <pod>  # check readiness probe configuration".to_string(),
                "Check application startup time and whether readiness endpoint works.".to_string(),
            ],
            proposed_actions: Vec::new(),
        });
    }
}

fn layer3_log_patterns(investigation: &Investigation, hyps: &mut Vec<Hypothesis>) {
    let mut combined: Vec<HashMap<String, Value>> = Vec::new();
    if let Some(errs) = &investigation.evidence.logs.parsed_errors {
        combined.extend(errs.iter().cloned());
    }
    if let Some(Value::Array(prev)) = investigation.meta.get("previous_logs_parsed_errors") {
        for entry in prev {
            if let Value::Object(map) = entry {
                combined.push(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            }
        }
    }
    if combined.is_empty() {
        return;
    }

    let namespace = investigation.target.namespace.clone().unwrap_or_else(|| "default".to_string());
    let pod = investigation.target.pod.clone().unwrap_or_else(|| "unknown".to_string());

    for (pattern, mut captures) in MATCHER.find_matches(&combined) {
        captures.entry("namespace".to_string()).or_insert_with(|| namespace.clone());
        captures.entry("pod".to_string()).or_insert_with(|| pod.clone());

        let matching_count = MATCHER.matching_count(pattern, &combined);
        let mut why = vec![resolve_placeholders(pattern.why_template, &captures), format!("Found {matching_count} matching error pattern(s) in logs")];
        if let Some(sample) = MATCHER.sample(pattern, &combined) {
            why.push(format!("Sample: {}", sample.chars().take(200).collect::<String>()));
        }

        let mut next_tests: Vec<String> = pattern.remediation_steps.iter().map(|s| resolve_placeholders(s, &captures)).collect();
        if !pattern.remediation_steps.is_empty() && !pattern.next_tests.is_empty() {
            next_tests.push(String::new());
        }
        next_tests.extend(pattern.next_tests.iter().map(|s| resolve_placeholders(s, &captures)));

        hyps.push(Hypothesis {
            hypothesis_id: pattern.pattern_id.to_string(),
            title: pattern.title.to_string(),
            confidence_0_100: pattern.confidence,
            why,
            supporting_refs: vec!["evidence.logs.parsed_errors".to_string(), "meta.previous_logs_parsed_errors".to_string()],
            counter_refs: Vec::new(),
            next_tests,
            proposed_actions: Vec::new(),
        });
    }
}

fn layer4_fallback(features: Option<&crate::domain::analysis::DerivedFeatures>, hyps: &mut Vec<Hypothesis>) {
    if !hyps.is_empty() {
        return;
    }
    let mut score = 55;
    if let Some(f) = features {
        if f.k8s.restart_rate_5m_max.unwrap_or(0.0) >= 3.0 {
            score += 15;
        }
        if f.logs.status.as_deref() == Some("ok") {
            score += 10;
        }
    }
    hyps.push(Hypothesis {
        hypothesis_id: "crashloop_generic".to_string(),
        title: "Application crash / startup failure (CrashLoopBackOff)".to_string(),
        confidence_0_100: score.clamp(0, 100),
        why: vec![
            "CrashLoop signals present (waiting reason and/or restart rate).".to_string(),
            "No specific error pattern matched — check logs for the root cause.".to_string(),
        ],
        supporting_refs: vec!["features.k8s.waiting_reason".to_string(), "features.k8s.restart_rate_5m_max".to_string(), "logs.logs".to_string()],
        counter_refs: Vec::new(),
        next_tests: vec!["kubectl -n <ns> logs <pod> -c <container> --previous --tail=200".to_string(), "kubectl -n <ns> describe pod <pod>  # events + lastState.terminated".to_string()],
        proposed_actions: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use crate::domain::analysis::{DerivedFeatures, FeaturesK8s, K8sContainerLastTerminated};
    use chrono::Utc;

    fn investigation_with(term: Option<K8sContainerLastTerminated>) -> Investigation {
        let alert = AlertInstance::default();
        let window = TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() };
        let mut inv = Investigation::new(alert, window);
        let k8s = FeaturesK8s { container_last_terminated_top: term.into_iter().collect(), ..Default::default() };
        let features = DerivedFeatures { family: "crashloop".to_string(), k8s, metrics: Default::default(), logs: Default::default(), changes: Default::default(), quality: Default::default(), job_metrics: None };
        inv.analysis.features = Some(features);
        inv
    }

    #[test]
    fn exit_code_137_yields_oom_hypothesis_at_confidence_80() {
        let inv = investigation_with(Some(K8sContainerLastTerminated { container: "app".to_string(), reason: Some("OOMKilled".to_string()), exit_code: Some(137) }));
        let module = CrashLoopDiagnosticModule;
        let hyps = module.diagnose(&inv);
        let oom = hyps.iter().find(|h| h.hypothesis_id == "crashloop_oom").expect("should emit crashloop_oom");
        assert_eq!(oom.confidence_0_100, 80);
    }

    #[test]
    fn exit_code_139_yields_segfault_hypothesis() {
        let inv = investigation_with(Some(K8sContainerLastTerminated { container: "app".to_string(), reason: Some("Error".to_string()), exit_code: Some(139) }));
        let module = CrashLoopDiagnosticModule;
        let hyps = module.diagnose(&inv);
        assert!(hyps.iter().any(|h| h.hypothesis_id == "crashloop_segfault"));
    }

    #[test]
    fn no_signal_falls_back_to_generic_hypothesis() {
        let inv = investigation_with(None);
        let module = CrashLoopDiagnosticModule;
        let hyps = module.diagnose(&inv);
        assert_eq!(hyps.len(), 1);
        assert_eq!(hyps[0].hypothesis_id, "crashloop_generic");
    }

    #[test]
    fn log_pattern_layer_matches_dependency_connection_refused() {
        let mut inv = investigation_with(None);
        inv.evidence.logs.parsed_errors = Some(vec![HashMap::from([("message".to_string(), Value::String("dial tcp 10.0.0.1:5432: connection refused".to_string()))])]);
        let module = CrashLoopDiagnosticModule;
        let hyps = module.diagnose(&inv);
        assert!(hyps.iter().any(|h| h.hypothesis_id == "crashloop_dependency_connection"));
    }
}
