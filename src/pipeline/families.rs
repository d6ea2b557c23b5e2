//! Best-effort family detection from raw alert labels, used only as a
//! fallback when no canonical family has been set on `Investigation.meta`
//! yet (see [`crate::pipeline::family::get_family`]) — for example when a
//! unit test constructs an `Investigation` directly, or on the very first
//! pass through the pipeline before `set_canonical_family` runs.
//!
//! The alertname → family table below is grounded in the closed alertname
//! set enumerated in `agent/memory/caseize.py` (`KubernetesPodNotHealthy`,
//! `KubernetesPodNotHealthyCritical`, `KubernetesContainerOomKiller`,
//! `KubeJobFailed`) plus the family names the scoring/diagnostics/enrich
//! modules dispatch on elsewhere in the original system.

use serde_json::Value;
use std::collections::HashMap;

/// Guess a family from raw labels and an optional declared playbook
/// annotation. `playbook`, when present, always wins — it's an explicit
/// author declaration on the alerting rule.
pub fn detect_family(labels: &HashMap<String, Value>, playbook: Option<&str>) -> String {
    if let Some(p) = playbook {
        if crate::pipeline::family::is_known_family(p) {
            return p.to_string();
        }
    }

    let alertname = labels.get("alertname").and_then(Value::as_str).unwrap_or("");
    let family = match alertname {
        "KubernetesContainerOomKiller" | "KubePodOomKilled" => Some("oom_killed"),
        "KubernetesPodNotHealthy" | "KubernetesPodNotHealthyCritical" | "KubernetesPodCrashLooping" => {
            Some("pod_not_healthy")
        }
        "KubeContainerWaiting" | "KubernetesContainerRestartHigh" => Some("crashloop"),
        "KubeCPUThrottlingHigh" | "CPUThrottlingHigh" => Some("cpu_throttling"),
        "KubeJobFailed" | "KubeJobCompletion" => Some("job_failed"),
        "KubeDeploymentRolloutStuck" | "KubeStatefulSetRolloutStuck" | "KubeDaemonSetRolloutStuck" => {
            Some("k8s_rollout_health")
        }
        "TargetDown" | "ProbeFailing" | "BlackboxProbeFailed" => Some("target_down"),
        "HighHttp5xxRate" | "ElevatedHttp5xxRate" => Some("http_5xx"),
        "KubeMemoryPressure" | "NodeMemoryPressure" => Some("memory_pressure"),
        "PrometheusTargetMissing" | "LokiRequestErrors" | "AlertmanagerNotificationFailing" => {
            Some("observability_pipeline")
        }
        "Watchdog" | "DeadMansSwitch" => Some("meta"),
        _ => None,
    };
    if let Some(f) = family {
        return f.to_string();
    }

    // Fall back to a coarse substring match on the alertname itself for
    // organizations with their own naming conventions.
    let lower = alertname.to_ascii_lowercase();
    if lower.contains("crashloop") {
        "crashloop".to_string()
    } else if lower.contains("oom") {
        "oom_killed".to_string()
    } else if lower.contains("throttl") {
        "cpu_throttling".to_string()
    } else if lower.contains("5xx") {
        "http_5xx".to_string()
    } else if lower.contains("memory") {
        "memory_pressure".to_string()
    } else if lower.contains("rollout") {
        "k8s_rollout_health".to_string()
    } else if lower.contains("down") || lower.contains("probe") {
        "target_down".to_string()
    } else if lower.contains("job") {
        "job_failed".to_string()
    } else {
        crate::pipeline::family::DEFAULT_FAMILY.to_string()
    }
}
