//! Deterministic case-index assignment (spec.md §6's "Case index contract":
//! `index_incident_run(...)` returns `(stored, reason, case_id?)`) and the
//! case-key derivation it rests on (spec.md §5: fingerprint path / workload
//! path for the closed rollout alertname set / day-bucketed group
//! fallback). Ported from `agent/memory/caseize.py`'s
//! `_case_key_for_fingerprint`/`_case_key_for_workload`/
//! `_case_key_for_group`/`caseize_run`.
//!
//! The Postgres-backed `cases`/`investigation_runs` tables `caseize_run`
//! upserts into are out of scope per spec.md's Non-goals (the Postgres
//! "memory" subsystem is an optional calibration hook only); this module
//! carries the [`CaseIndex`] trait plus an in-memory default so the
//! *deterministic case-key derivation* — the part spec.md actually
//! requires the core to own — is implemented and testable without a
//! database. A real Postgres-backed `CaseIndex` would replace
//! [`InMemoryCaseIndex`] behind the same trait.

use crate::domain::investigation::Investigation;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use sha2::{Digest, Sha256};

fn sha256_hex(raw: &[u8]) -> String {
    let digest = Sha256::digest(raw);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Canonical JSON encoding of `payload`: `serde_json::Map` is a `BTreeMap`
/// in this crate (the `preserve_order` feature is not enabled), so object
/// keys serialize in sorted order — the same `sort_keys=True` guarantee
/// `caseize.py` relies on for a stable hash.
fn canonical_json(payload: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&payload).expect("json payload is always serializable")
}

/// The subset of an investigation's identity `caseize_run` keys off.
/// Mirrors `caseize.py::CaseizeInput`.
#[derive(Debug, Clone, Default)]
pub struct CaseizeInput {
    pub alert_fingerprint: Option<String>,
    pub alertname: Option<String>,
    pub family: Option<String>,
    pub cluster: Option<String>,
    pub target_type: Option<String>,
    pub namespace: Option<String>,
    pub container: Option<String>,
    pub workload_kind: Option<String>,
    pub workload_name: Option<String>,
    pub service: Option<String>,
    pub instance: Option<String>,
}

impl CaseizeInput {
    /// Build from a finished investigation's target/meta/alert fields.
    pub fn from_investigation(investigation: &Investigation) -> Self {
        let target_type = serde_json::to_value(investigation.target.target_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        let family = investigation
            .meta
            .get("family")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| investigation.analysis.features.as_ref().map(|f| f.family.clone()));
        Self {
            alert_fingerprint: Some(investigation.alert.fingerprint.clone()).filter(|s| !s.is_empty()),
            alertname: investigation.alert.alertname().map(str::to_string),
            family,
            cluster: investigation.target.cluster.clone(),
            target_type,
            namespace: investigation.target.namespace.clone(),
            container: investigation.target.container.clone(),
            workload_kind: investigation.target.workload_kind.clone(),
            workload_name: investigation.target.workload_name.clone(),
            service: investigation.target.service.clone(),
            instance: investigation.target.instance.clone(),
        }
    }
}

/// `fp:<fingerprint>` — the simplest, most common case key.
pub fn case_key_for_fingerprint(fingerprint: &str) -> String {
    format!("fp:{fingerprint}")
}

/// Stable case key for rollout-noisy alerts, keyed by workload identity
/// rather than per-pod fingerprint churn. `None` unless every required
/// field is present *and* the alertname is in the closed rollout set
/// (reuses [`crate::ingest::dedup::ROLLOUT_WORKLOAD_ALERTNAMES`] — the same
/// closed set the ingestion-time dedup key uses, so the two agree on which
/// alerts collapse by workload). `container` only participates in the hash
/// for `KubernetesContainerOomKiller`, same as the dedup key.
pub fn case_key_for_workload(input: &CaseizeInput) -> Option<String> {
    let cluster = input.cluster.as_deref()?;
    let namespace = input.namespace.as_deref()?;
    let workload_kind = input.workload_kind.as_deref()?;
    let workload_name = input.workload_name.as_deref()?;
    let alertname = input.alertname.as_deref()?;
    let family = input.family.as_deref()?;
    if !crate::ingest::dedup::ROLLOUT_WORKLOAD_ALERTNAMES.contains(&alertname) {
        return None;
    }
    let container = if alertname == "KubernetesContainerOomKiller" { input.container.as_deref() } else { None };
    let payload = json!({
        "k": "workload",
        "cluster": cluster,
        "namespace": namespace,
        "workload_kind": workload_kind,
        "workload_name": workload_name,
        "family": family,
        "alertname": alertname,
        "container": container,
    });
    Some(format!("wl:{}", sha256_hex(&canonical_json(payload))))
}

/// Best-effort grouping key for runs with neither a usable fingerprint nor
/// workload identity, bucketed by UTC day so the key doesn't drift mid-day
/// under concurrent webhook deliveries. `day_bucket` is caller-supplied
/// (e.g. `"utc:2026-07-29"`) rather than computed from a live clock inside
/// this function, so the derivation stays pure and testable.
pub fn case_key_for_group(input: &CaseizeInput, day_bucket: &str) -> String {
    let payload = json!({
        "k": "group_day",
        "day": day_bucket,
        "cluster": input.cluster,
        "target_type": input.target_type,
        "namespace": input.namespace,
        "workload_kind": input.workload_kind,
        "workload_name": input.workload_name,
        "service": input.service,
        "instance": input.instance,
        "family": input.family,
        "alertname": input.alertname,
    });
    format!("g:{}", sha256_hex(&canonical_json(payload)))
}

/// Seam for the case index: assigns a stable `case_id` to a finished
/// investigation run, deduplicating concurrent/repeat runs that key to the
/// same case. Spec.md §6's `(stored, reason, case_id?)` contract.
pub trait CaseIndex: Send + Sync {
    /// `stored` is `true` the first time this run's case key is seen,
    /// `false` when an existing case is reused. `reason` names which path
    /// produced the assignment (`workload_upsert`, `fingerprint_upsert`,
    /// `group_upsert`, or an `_existing` suffix on repeat). `case_id` is
    /// `None` only if case indexing itself could not run (e.g. the input
    /// carried no identity at all to key on, which should not happen for a
    /// real investigation).
    fn index_incident_run(&self, input: &CaseizeInput, now: DateTime<Utc>) -> (bool, String, Option<String>);
}

/// In-memory `CaseIndex`: a process-wide `case_key -> case_id` table. Reuse
/// across redelivered/duplicate runs works within one process's lifetime;
/// a Postgres-backed implementation is needed for reuse across restarts or
/// multiple workers, which is explicitly out of scope here (spec.md
/// Non-goals).
pub struct InMemoryCaseIndex {
    cases: DashMap<String, String>,
}

impl InMemoryCaseIndex {
    pub fn new() -> Self {
        Self { cases: DashMap::new() }
    }

    fn upsert(&self, key: String, reason: &'static str) -> (bool, String, Option<String>) {
        if let Some(existing) = self.cases.get(&key) {
            return (false, format!("{reason}_existing"), Some(existing.clone()));
        }
        let case_id = crate::storage::new_case_id();
        self.cases.insert(key, case_id.clone());
        (true, reason.to_string(), Some(case_id))
    }
}

impl Default for InMemoryCaseIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseIndex for InMemoryCaseIndex {
    fn index_incident_run(&self, input: &CaseizeInput, now: DateTime<Utc>) -> (bool, String, Option<String>) {
        // Prefer workload identity for rollout-noisy alertnames (ignore
        // per-pod fingerprint churn), then fall back to fingerprint, then
        // to the day-bucketed group key. Mirrors `caseize_run`'s ordering.
        if let Some(key) = case_key_for_workload(input) {
            return self.upsert(key, "workload_upsert");
        }
        if let Some(fp) = input.alert_fingerprint.as_deref().filter(|s| !s.trim().is_empty()) {
            return self.upsert(case_key_for_fingerprint(fp), "fingerprint_upsert");
        }
        let day_bucket = format!("utc:{}", now.format("%Y-%m-%d"));
        self.upsert(case_key_for_group(input, &day_bucket), "group_upsert")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> CaseizeInput {
        CaseizeInput {
            alert_fingerprint: Some("fp-1".to_string()),
            alertname: Some("KubePodCrashLooping".to_string()),
            family: Some("crashloop".to_string()),
            cluster: Some("prod".to_string()),
            target_type: Some("pod".to_string()),
            namespace: Some("payments".to_string()),
            container: Some("api".to_string()),
            workload_kind: Some("Deployment".to_string()),
            workload_name: Some("payments-api".to_string()),
            service: None,
            instance: None,
        }
    }

    #[test]
    fn fingerprint_key_is_stable_and_namespaced() {
        assert_eq!(case_key_for_fingerprint("abc"), case_key_for_fingerprint("abc"));
        assert!(case_key_for_fingerprint("abc").starts_with("fp:"));
    }

    #[test]
    fn workload_key_requires_closed_alertname_set() {
        let input = base_input();
        assert!(case_key_for_workload(&input).is_none(), "KubePodCrashLooping is not in the rollout set");
    }

    #[test]
    fn workload_key_collapses_distinct_pods_same_workload() {
        let mut a = base_input();
        a.alertname = Some("KubernetesPodNotHealthy".to_string());
        a.alert_fingerprint = Some("fp-pod-a".to_string());
        let mut b = a.clone();
        b.alert_fingerprint = Some("fp-pod-b".to_string());
        assert_eq!(case_key_for_workload(&a), case_key_for_workload(&b));
    }

    #[test]
    fn oom_killer_alertname_includes_container_in_key() {
        let mut a = base_input();
        a.alertname = Some("KubernetesContainerOomKiller".to_string());
        a.container = Some("api".to_string());
        let mut b = a.clone();
        b.container = Some("sidecar".to_string());
        assert_ne!(case_key_for_workload(&a), case_key_for_workload(&b));
    }

    #[test]
    fn in_memory_index_reuses_case_id_on_repeat_fingerprint() {
        let index = InMemoryCaseIndex::new();
        let mut input = base_input();
        input.alertname = Some("SomeOtherAlert".to_string());
        let now = Utc::now();
        let (stored1, reason1, id1) = index.index_incident_run(&input, now);
        let (stored2, reason2, id2) = index.index_incident_run(&input, now);
        assert!(stored1);
        assert_eq!(reason1, "fingerprint_upsert");
        assert!(!stored2);
        assert_eq!(reason2, "fingerprint_upsert_existing");
        assert_eq!(id1, id2);
    }

    #[test]
    fn in_memory_index_prefers_workload_path_over_fingerprint() {
        let index = InMemoryCaseIndex::new();
        let mut input = base_input();
        input.alertname = Some("KubernetesPodNotHealthy".to_string());
        let (_, reason, _) = index.index_incident_run(&input, Utc::now());
        assert_eq!(reason, "workload_upsert");
    }

    #[test]
    fn group_fallback_used_without_fingerprint_or_workload_identity() {
        let index = InMemoryCaseIndex::new();
        let input = CaseizeInput { alertname: Some("Generic".to_string()), family: Some("generic".to_string()), ..Default::default() };
        let (stored, reason, case_id) = index.index_incident_run(&input, Utc::now());
        assert!(stored);
        assert_eq!(reason, "group_upsert");
        assert!(case_id.is_some());
    }
}
