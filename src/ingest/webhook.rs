//! Alertmanager v4 webhook handling: payload parsing, firing/resolved
//! normalization, allowlist filtering, in-batch dedup, the freshness gate,
//! and durable enqueue. Ported from `agent/api/webhook.py`.

use crate::config::DedupConfig;
use crate::domain::alert::{AlertInstance, TimeWindow};
use crate::error::{AgentError, IngestError, Result};
use crate::ingest::dedup::normalize_alert;
use crate::ingest::idempotency::resolve_dedup_key;
use crate::pipeline::target::parse_target;
use crate::providers::queue::QueueClient;
use crate::storage::CaseStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// The raw Alertmanager v4 webhook body: a `status` for the batch as a
/// whole plus the per-alert array. Per-alert state wins over this parent
/// status (spec.md §4.1 step 1).
#[derive(Debug, Clone, Deserialize)]
pub struct AlertmanagerWebhookPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub alerts: Vec<AlertInstance>,
}

/// The durable job enqueued for each alert that survives ingestion. Wire
/// shape from spec.md §6: `{ alert, time_window, received_at, parent_status? }`.
/// `time_window` is the human window string (e.g. `"15m"`); the worker
/// reconstructs an absolute [`TimeWindow`] at investigation time so the
/// query range reflects when the job actually runs, not when it was
/// enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertJob {
    pub alert: AlertInstance,
    pub time_window: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_status: Option<String>,
}

/// Response body stats returned to Alertmanager after a webhook POST,
/// per spec.md §6.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookStats {
    pub received: usize,
    pub processed_firing: usize,
    pub skipped_resolved: usize,
    pub skipped_allowlist: usize,
    pub skipped_already_exists: usize,
    pub stored_new: usize,
    pub errors: usize,
}

/// Build the absolute time window an investigation's evidence queries use,
/// anchored on `alert.starts_at` when present, else "now".
pub fn build_time_window(window: &str, alert: &AlertInstance, minutes: i64, now: DateTime<Utc>) -> TimeWindow {
    let start_time = alert
        .starts_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now - Duration::minutes(minutes));
    TimeWindow { window: window.to_string(), start_time, end_time: now }
}

/// Process one Alertmanager webhook payload end to end: normalize,
/// allowlist-filter, in-batch dedup, freshness-gate, and enqueue. Returns
/// the stats object the HTTP handler echoes back to Alertmanager.
///
/// `allowlist` is `None` when unset (no filtering applied, matching
/// spec.md's "optional" allowlist).
pub async fn handle_webhook_payload(
    mut payload: AlertmanagerWebhookPayload,
    allowlist: Option<&HashSet<String>>,
    dedup: &DedupConfig,
    case_store: &CaseStore,
    queue: &QueueClient,
) -> Result<WebhookStats> {
    let now = Utc::now();
    let mut stats = WebhookStats { received: payload.alerts.len(), ..Default::default() };
    let mut seen_keys: HashSet<String> = HashSet::new();

    for alert in payload.alerts.iter_mut() {
        normalize_alert(alert);

        if alert.is_resolved() {
            stats.skipped_resolved += 1;
            continue;
        }

        let alertname = alert.alertname().unwrap_or("").to_string();
        if let Some(allow) = allowlist {
            if !allow.contains(&alertname) {
                stats.skipped_allowlist += 1;
                continue;
            }
        }

        stats.processed_firing += 1;

        let target = parse_target(alert);
        let key = resolve_dedup_key(alert, &target, now);

        // In-batch dedup: a second alert in this same payload resolving to
        // the same key never reaches the freshness gate or queue twice.
        if !seen_keys.insert(key.clone()) {
            stats.skipped_already_exists += 1;
            continue;
        }

        let is_rollout_key = crate::ingest::dedup::rollout_workload_key(alert, &target).is_some();
        let effective_dedup = if is_rollout_key {
            DedupConfig { freshness_ttl_seconds: dedup.freshness_ttl_seconds.max(dedup.freshness_ttl_seconds * 4) }
        } else {
            dedup.clone()
        };

        match case_store.is_case_fresh(&alertname, &key, &effective_dedup, now).await {
            Ok(true) => {
                stats.skipped_already_exists += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                // Per spec.md §4.1: a head error other than "not found" is
                // "unknown → proceed" — writes are idempotent on key
                // collision, so there is nothing unsafe about continuing.
                warn!(error = %e, %alertname, "freshness check failed, proceeding");
            }
        }

        let job = AlertJob {
            alert: alert.clone(),
            time_window: "15m".to_string(),
            received_at: now,
            parent_status: payload.status.clone(),
        };

        match queue.publish(&job, &key).await {
            Ok(()) => {
                stats.stored_new += 1;
                info!(%alertname, %key, "enqueued alert job");
            }
            Err(e) => {
                stats.errors += 1;
                return Err(AgentError::Ingest(IngestError::Store(e)));
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;

    fn firing_alert(alertname: &str, fingerprint: &str) -> AlertInstance {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), Value::String(alertname.to_string()));
        AlertInstance { fingerprint: fingerprint.to_string(), labels, ends_at: None, ..Default::default() }
    }

    #[test]
    fn resolved_alert_is_skipped_before_dedup() {
        let mut alert = firing_alert("KubePodCrashLooping", "fp1");
        alert.ends_at = Some("2026-07-28T12:00:00Z".to_string());
        normalize_alert(&mut alert);
        assert!(alert.is_resolved());
    }

    #[test]
    fn build_time_window_uses_starts_at_when_present() {
        let mut alert = firing_alert("KubePodCrashLooping", "fp1");
        alert.starts_at = Some("2026-07-28T11:45:00Z".to_string());
        let now = DateTime::parse_from_rfc3339("2026-07-28T12:00:00Z").unwrap().with_timezone(&Utc);
        let window = build_time_window("15m", &alert, 15, now);
        assert_eq!(window.start_time.to_rfc3339(), "2026-07-28T11:45:00+00:00");
        assert_eq!(window.end_time, now);
    }
}

/// Load the allowlist from [`Config`], if configured. Spec.md §6:
/// `ALERTNAME_ALLOWLIST` is a comma-separated env var; absence means "no
/// filtering".
pub fn allowlist_from_env() -> Option<HashSet<String>> {
    std::env::var("ALERTNAME_ALLOWLIST").ok().map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}
