//! K8s-derived features: pod phase/readiness, restart/waiting/termination
//! summaries, and event counts. Ported from `_k8s_features()` in
//! `agent/pipeline/features.py`.

use super::util::{dig, truncate};
use crate::domain::{
    investigation::Investigation, FeaturesK8s, K8sConditionSummary, K8sContainerLastTerminated,
    K8sContainerWaiting, K8sEventSummary,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

fn waiting_priority(reason: &str) -> i32 {
    match reason {
        "ImagePullBackOff" => 0,
        "ErrImagePull" => 1,
        "CreateContainerConfigError" => 2,
        "CreateContainerError" => 3,
        "CrashLoopBackOff" => 4,
        "RunContainerError" => 5,
        "ContainerCreating" => 20,
        _ => 100,
    }
}

fn terminated_priority(reason: &str) -> i32 {
    match reason {
        "OOMKilled" => 0,
        "Error" => 1,
        "Completed" => 50,
        _ => 100,
    }
}

fn event_timestamp(event: &serde_json::Map<String, Value>) -> f64 {
    for key in ["last_timestamp", "event_time", "first_timestamp"] {
        if let Some(Value::String(s)) = event.get(key) {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return dt.with_timezone(&Utc).timestamp() as f64;
            }
        }
    }
    0.0
}

pub fn compute(investigation: &Investigation) -> FeaturesK8s {
    let k8s = &investigation.evidence.k8s;
    let pod_info = k8s.pod_info.clone().unwrap_or_default();

    let phase = pod_info.get("phase").and_then(Value::as_str).map(str::to_string);
    let status_reason = pod_info.get("status_reason").and_then(Value::as_str).map(str::to_string);
    let status_message = truncate(pod_info.get("status_message").and_then(Value::as_str), 200);

    let mut ready = None;
    for condition in &k8s.pod_conditions {
        if condition.get("type").and_then(Value::as_str) == Some("Ready") {
            ready = Some(condition.get("status").and_then(Value::as_str) == Some("True"));
            break;
        }
    }

    let mut not_ready_conditions: Vec<K8sConditionSummary> = k8s
        .pod_conditions
        .iter()
        .filter_map(|c| {
            let ctype = c.get("type").and_then(Value::as_str)?.trim();
            let status = c.get("status").and_then(Value::as_str)?.trim();
            if ctype.is_empty() || status.is_empty() || status == "True" {
                return None;
            }
            Some(K8sConditionSummary {
                kind: ctype.to_string(),
                status: status.to_string(),
                reason: c.get("reason").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect();
    not_ready_conditions.sort_by(|a, b| a.kind.cmp(&b.kind));

    let mut waiting_reason: Option<String> = None;
    let mut restart_count: Option<i64> = None;
    let mut waiting_summaries: Vec<K8sContainerWaiting> = Vec::new();
    let mut last_term_summaries: Vec<K8sContainerLastTerminated> = Vec::new();

    if let Some(Value::Array(statuses)) = pod_info.get("container_statuses") {
        for cs in statuses {
            let Some(obj) = cs.as_object() else { continue };
            let name = obj.get("name").and_then(Value::as_str).unwrap_or("").trim().to_string();
            if let Some(target_container) = investigation.target.container.as_deref() {
                if name != target_container {
                    continue;
                }
            }
            if let Some(rc) = obj.get("restart_count").and_then(Value::as_i64) {
                restart_count = Some(rc);
            }

            let map: std::collections::HashMap<String, Value> =
                obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

            if let Some(Value::Object(w)) = dig(&map, &["state", "waiting"]) {
                waiting_reason = w.get("reason").and_then(Value::as_str).map(str::to_string);
                if !name.is_empty() {
                    waiting_summaries.push(K8sContainerWaiting {
                        container: name.clone(),
                        reason: w.get("reason").and_then(Value::as_str).map(str::to_string),
                        message: truncate(w.get("message").and_then(Value::as_str), 200),
                    });
                }
            }

            let terminated = dig(&map, &["last_state", "terminated"])
                .or_else(|| dig(&map, &["state", "terminated"]));
            if let Some(Value::Object(t)) = terminated {
                if !name.is_empty() {
                    let exit_code = t
                        .get("exit_code")
                        .or_else(|| t.get("exitCode"))
                        .and_then(Value::as_i64)
                        .map(|v| v as i32);
                    last_term_summaries.push(K8sContainerLastTerminated {
                        container: name.clone(),
                        reason: t.get("reason").and_then(Value::as_str).map(str::to_string),
                        exit_code,
                    });
                }
            }
        }
    }

    waiting_summaries.sort_by_key(|w| (waiting_priority(w.reason.as_deref().unwrap_or("")), w.container.clone()));
    waiting_summaries.truncate(3);
    last_term_summaries
        .sort_by_key(|t| (terminated_priority(t.reason.as_deref().unwrap_or("")), t.container.clone()));
    last_term_summaries.truncate(3);

    let mut warning_events_count = 0i64;
    let mut oom_killed_events = 0i64;
    let mut evicted = false;
    for event in &k8s.pod_events {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
        if kind == "warning" {
            warning_events_count += 1;
        }
        let reason = event.get("reason").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
        let message = event.get("message").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
        if reason.contains("oom") || message.contains("oomkilled") {
            oom_killed_events += 1;
        }
        if reason.contains("evict") || message.contains("evicted") {
            evicted = true;
        }
    }

    let mut raw_events: Vec<&std::collections::HashMap<String, Value>> = k8s.pod_events.iter().collect();
    raw_events.sort_by(|a, b| {
        let oa = to_map_object(a);
        let ob = to_map_object(b);
        let ta = event_timestamp(&oa);
        let tb = event_timestamp(&ob);
        tb.partial_cmp(&ta).unwrap_or(std::cmp::Ordering::Equal)
    });
    let recent_event_reasons_top = raw_events
        .into_iter()
        .take(5)
        .map(|e| K8sEventSummary {
            reason: e.get("reason").and_then(Value::as_str).map(str::to_string),
            count: e.get("count").and_then(Value::as_i64),
            kind: e.get("type").and_then(Value::as_str).map(str::to_string),
            message: truncate(e.get("message").and_then(Value::as_str), 200),
        })
        .collect();

    let mut oom_killed = waiting_reason.as_deref().map(|r| r.to_ascii_lowercase().contains("oom")).unwrap_or(false);
    if oom_killed_events > 0 {
        oom_killed = true;
    }
    if last_term_summaries
        .iter()
        .any(|t| t.reason.as_deref().unwrap_or("").eq_ignore_ascii_case("oomkilled"))
    {
        oom_killed = true;
    }

    FeaturesK8s {
        pod_phase: phase,
        ready,
        waiting_reason,
        restart_count,
        restart_rate_5m_max: None,
        warning_events_count: Some(warning_events_count),
        oom_killed: Some(oom_killed),
        oom_killed_events: Some(oom_killed_events),
        evicted: Some(evicted),
        status_reason,
        status_message,
        not_ready_conditions,
        container_waiting_reasons_top: waiting_summaries,
        container_last_terminated_top: last_term_summaries,
        recent_event_reasons_top,
    }
}

fn to_map_object(m: &std::collections::HashMap<String, Value>) -> serde_json::Map<String, Value> {
    m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
