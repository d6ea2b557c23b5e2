//! Single source of truth for the key used as both the object-store case
//! key and the queue publish's duplicate-window message id, so the
//! freshness gate and JetStream's own dedup window always agree (spec.md
//! §9 design note: "centralize in one module").

use crate::domain::alert::AlertInstance;
use crate::domain::target::TargetRef;
use crate::ingest::dedup::{fingerprint_key, rollout_workload_key};
use chrono::{DateTime, Utc};

/// The dedup key this alert resolves to: the rollout-workload key when the
/// alertname is in the closed set and workload identity is resolvable,
/// otherwise the per-alert fingerprint key. This is the exact value used
/// for the object-store `<alertname>/<key>.md` path and the queue's
/// `Nats-Msg-Id` header — see [`crate::providers::object_store::case_key`]
/// and [`crate::providers::queue::QueueClient::publish`].
pub fn resolve_dedup_key(alert: &AlertInstance, target: &TargetRef, now: DateTime<Utc>) -> String {
    rollout_workload_key(alert, target).unwrap_or_else(|| fingerprint_key(alert, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_fingerprint_key_outside_closed_set() {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), Value::String("KubeCPUThrottlingHigh".into()));
        let alert = AlertInstance { fingerprint: "fp1".into(), labels, ..Default::default() };
        let target = TargetRef::default();
        let now = Utc::now();
        assert_eq!(resolve_dedup_key(&alert, &target, now), fingerprint_key(&alert, now));
    }
}
