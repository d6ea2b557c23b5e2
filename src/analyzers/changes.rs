//! Change-correlation analyzer: builds a timeline of recent Kubernetes
//! events/rollouts for the target workload and scores how likely they are
//! to explain the alert. Ported from `agent/pipeline/changes.py`. Distinct
//! from [`crate::features::changes`], which only extracts a boolean/flag
//! summary for scoring — this module does the provider query and timeline
//! construction those flags are derived from.

use crate::domain::analysis::{ChangeCorrelation, ChangeEvent, ChangeTimeline};
use crate::domain::investigation::Investigation;
use crate::providers::kubernetes::KubernetesProvider;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Event reasons that indicate a deploy/scale/config change rather than a
/// routine scheduling event.
const CHANGE_EVENT_REASONS: &[&str] =
    &["ScalingReplicaSet", "SuccessfulCreate", "Killing", "FailedMount", "FailedScheduling"];

fn event_to_change(e: &std::collections::HashMap<String, Value>, namespace: &str) -> Option<ChangeEvent> {
    let reason = e.get("reason").and_then(Value::as_str)?;
    if !CHANGE_EVENT_REASONS.contains(&reason) {
        return None;
    }
    Some(ChangeEvent {
        timestamp: e.get("last_timestamp").and_then(Value::as_str).map(str::to_string),
        kind: "Event".to_string(),
        name: reason.to_string(),
        namespace: namespace.to_string(),
        reason: Some(reason.to_string()),
        message: e.get("message").and_then(Value::as_str).map(str::to_string),
        source: "kubernetes".to_string(),
    })
}

/// Fetch rollout status plus recent pod events for the target workload and
/// fold them into a [`ChangeCorrelation`] summary. Requires K8s identity;
/// callers should skip this analyzer otherwise (mirrors
/// `build_base_decision`'s `blocked_no_target_identity` gate).
pub async fn analyze(
    investigation: &Investigation,
    k8s: &KubernetesProvider,
) -> Result<ChangeCorrelation, crate::error::ProviderError> {
    let namespace = investigation.target.namespace.as_deref().unwrap_or("");
    let events = if let Some(pod) = &investigation.target.pod {
        k8s.get_pod_events(namespace, pod).await?
    } else {
        Vec::new()
    };

    let change_events: Vec<ChangeEvent> = events.iter().filter_map(|e| event_to_change(e, namespace)).collect();

    let workload = if let (Some(kind), Some(name)) = (&investigation.target.workload_kind, &investigation.target.workload_name) {
        Some(k8s.get_rollout_status(namespace, kind, name).await?)
    } else {
        None
    };

    let last_change_time = change_events
        .iter()
        .filter_map(|e| e.timestamp.as_deref())
        .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .max()
        .map(|dt| dt.to_rfc3339());

    let has_recent_change = last_change_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| {
            let age = Utc::now().signed_duration_since(dt.with_timezone(&Utc));
            age.num_minutes() <= investigation.time_window.window_minutes()
        })
        .unwrap_or(false);

    let score = if has_recent_change { 0.8 } else { 0.0 };
    let summary = if has_recent_change {
        Some(format!("{} Kubernetes change event(s) within the alert window", change_events.len()))
    } else {
        None
    };

    Ok(ChangeCorrelation {
        has_recent_change: Some(has_recent_change),
        score: Some(score),
        summary,
        last_change_time: last_change_time.clone(),
        timeline: Some(ChangeTimeline {
            source: "kubernetes".to_string(),
            workload,
            events: change_events,
            last_change_time,
        }),
    })
}

trait WindowMinutes {
    fn window_minutes(&self) -> i64;
}

impl WindowMinutes for crate::domain::alert::TimeWindow {
    fn window_minutes(&self) -> i64 {
        self.end_time.signed_duration_since(self.start_time).num_minutes().max(15)
    }
}
