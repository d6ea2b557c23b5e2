//! Dedup-key derivation and state normalization. Ported from
//! `agent/memory/caseize.py` (`_case_key_for_fingerprint` /
//! `_case_key_for_workload`) and the `endsAt`/zero-time handling implied by
//! spec.md §4.1 step 1.

use crate::domain::alert::{AlertInstance, EndsAtKind, NormalizedState};
use crate::domain::target::TargetRef;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Alertmanager's placeholder for "no end time yet" — RFC3339 zero value.
/// A firing alert carries this in `endsAt` until it resolves or expires;
/// it must never be mistaken for an actual resolution timestamp.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// The closed set of alertnames for which pod churn within one rollout
/// should collapse into a single workload-scoped investigation, rather
/// than one investigation per pod. Ported verbatim from
/// `caseize.py::_case_key_for_workload`'s alertname allowlist — extend this
/// set explicitly (never infer membership) per spec.md §9's open question.
pub const ROLLOUT_WORKLOAD_ALERTNAMES: &[&str] = &[
    "KubernetesPodNotHealthy",
    "KubernetesPodNotHealthyCritical",
    "KubernetesContainerOomKiller",
    "KubeJobFailed",
];

/// Normalize an alert's raw `endsAt` into (`NormalizedState`, `EndsAtKind`).
/// Per-alert `endsAt` wins over the parent webhook's `status` field — an
/// individual alert can resolve while Alertmanager still reports
/// `status=firing` for the batch as a whole (spec.md §4.1 step 1).
pub fn normalize_state(ends_at: Option<&str>) -> (NormalizedState, EndsAtKind) {
    match ends_at {
        None => (NormalizedState::Firing, EndsAtKind::Unknown),
        Some(raw) if raw == ZERO_TIME => (NormalizedState::Firing, EndsAtKind::ExpiresAt),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(_) => (NormalizedState::Resolved, EndsAtKind::ResolvedAt),
            Err(_) => (NormalizedState::Unknown, EndsAtKind::Unknown),
        },
    }
}

/// Apply [`normalize_state`] to an [`AlertInstance`] in place, following
/// the per-alert-wins-over-parent-status rule.
pub fn normalize_alert(alert: &mut AlertInstance) {
    let (state, kind) = normalize_state(alert.ends_at.as_deref());
    alert.normalized_state = Some(state);
    alert.ends_at_kind = Some(kind);
}

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// Lightweight hex encoding so this module doesn't need a separate crate
/// dependency for an 8-line helper.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// A coarse time bucket so that two alerts firing within the same window
/// but delivered in separate webhook batches (e.g. a flapping alert that
/// resolves and re-fires within seconds) still hash to the same
/// fingerprint key, smoothing sub-TTL churn without defeating dedup across
/// genuinely distinct incidents hours apart. Five-minute buckets, aligned
/// to the epoch.
pub fn time_bucket(now: DateTime<Utc>, bucket_seconds: i64) -> i64 {
    now.timestamp().div_euclid(bucket_seconds.max(1))
}

/// Stable, sorted `"k=v"` rendering of an alert's labels for hashing —
/// order must not affect the resulting key.
fn sorted_labels(labels: &std::collections::HashMap<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> = labels.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

/// Per-alert dedup key: `sha256(alertname, labels, fingerprint, time-bucket)`.
/// Mirrors `_case_key_for_fingerprint`, widened with the label/time-bucket
/// components spec.md §4.1 step 4 calls for so two *different* fingerprints
/// for the same semantic alert (Alertmanager fingerprints are a hash of the
/// label set it rendered, which can shift across Alertmanager versions)
/// still collapse within the same bucket.
pub fn fingerprint_key(alert: &AlertInstance, now: DateTime<Utc>) -> String {
    let alertname = alert.alertname().unwrap_or("unknown");
    let labels = sorted_labels(&alert.labels);
    let bucket = time_bucket(now, 300).to_string();
    sha256_hex(&[alertname.as_bytes(), labels.as_bytes(), alert.fingerprint.as_bytes(), bucket.as_bytes()])
}

/// Rollout-workload dedup key for the closed alertname set above:
/// `sha256(alertname, cluster, namespace, workload_kind, workload_name,
/// [container-if-OomKiller])`. Returns `None` when the alertname isn't in
/// the closed set or required identity is missing — callers fall back to
/// [`fingerprint_key`] in that case.
pub fn rollout_workload_key(alert: &AlertInstance, target: &TargetRef) -> Option<String> {
    let alertname = alert.alertname()?;
    if !ROLLOUT_WORKLOAD_ALERTNAMES.contains(&alertname) {
        return None;
    }
    let cluster = target.cluster.as_deref()?;
    let namespace = target.namespace.as_deref()?;
    let workload_kind = target.workload_kind.as_deref()?;
    let workload_name = target.workload_name.as_deref()?;
    // Container is only part of the key for the OOM-killer alert (spec.md
    // §9 open question: extend explicitly, never infer).
    let container = if alertname == "KubernetesContainerOomKiller" {
        target.container.as_deref().unwrap_or("")
    } else {
        ""
    };
    Some(sha256_hex(&[
        alertname.as_bytes(),
        cluster.as_bytes(),
        namespace.as_bytes(),
        workload_kind.as_bytes(),
        workload_name.as_bytes(),
        container.as_bytes(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn alert(fingerprint: &str, ends_at: Option<&str>) -> AlertInstance {
        AlertInstance { fingerprint: fingerprint.to_string(), ends_at: ends_at.map(str::to_string), ..Default::default() }
    }

    #[test]
    fn zero_time_is_firing_not_resolved() {
        let (state, kind) = normalize_state(Some(ZERO_TIME));
        assert_eq!(state, NormalizedState::Firing);
        assert_eq!(kind, EndsAtKind::ExpiresAt);
    }

    #[test]
    fn real_timestamp_is_resolved() {
        let (state, kind) = normalize_state(Some("2026-07-28T12:00:00Z"));
        assert_eq!(state, NormalizedState::Resolved);
        assert_eq!(kind, EndsAtKind::ResolvedAt);
    }

    #[test]
    fn missing_ends_at_is_firing() {
        let (state, _) = normalize_state(None);
        assert_eq!(state, NormalizedState::Firing);
    }

    #[test]
    fn fingerprint_key_is_stable() {
        let now = Utc::now();
        let a = alert("fp1", None);
        assert_eq!(fingerprint_key(&a, now), fingerprint_key(&a, now));
    }

    #[test]
    fn rollout_key_requires_closed_set_membership() {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), Value::String("SomeOtherAlert".into()));
        let a = AlertInstance { labels, ..Default::default() };
        let target = TargetRef {
            cluster: Some("prod".into()),
            namespace: Some("ns".into()),
            workload_kind: Some("Deployment".into()),
            workload_name: Some("api".into()),
            ..Default::default()
        };
        assert!(rollout_workload_key(&a, &target).is_none());
    }

    #[test]
    fn rollout_key_collapses_different_pods_same_workload() {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), Value::String("KubernetesPodNotHealthy".into()));
        let a1 = AlertInstance { fingerprint: "fp-a".into(), labels: labels.clone(), ..Default::default() };
        let a2 = AlertInstance { fingerprint: "fp-b".into(), labels, ..Default::default() };
        let target = TargetRef {
            cluster: Some("prod".into()),
            namespace: Some("ns".into()),
            workload_kind: Some("Deployment".into()),
            workload_name: Some("api".into()),
            pod: Some("api-abc".into()),
            ..Default::default()
        };
        let target2 = TargetRef { pod: Some("api-xyz".into()), ..target.clone() };
        assert_eq!(rollout_workload_key(&a1, &target), rollout_workload_key(&a2, &target2));
    }
}
