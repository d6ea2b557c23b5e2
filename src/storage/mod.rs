//! Case persistence: dedup/case-key derivation, freshness gating, and
//! reading/writing `Investigation` records and rendered reports through
//! [`crate::providers::object_store::ObjectStore`]. Ported from
//! `agent/storage/keys.py` (key derivation) and the freshness check shared
//! by `agent/storage/local_store.py` / `agent/storage/s3_store.py`.
//!
//! [`caseize`] carries the separate case-index contract (spec.md §6):
//! assigning every successfully persisted run a stable `case_id`.

pub mod caseize;

use crate::config::DedupConfig;
use crate::domain::investigation::Investigation;
use crate::error::{AgentError, PipelineError, Result};
use crate::providers::object_store::{case_key, report_key, ObjectStore};
use caseize::{CaseIndex, CaseizeInput, InMemoryCaseIndex};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A short, filesystem/S3-key-safe hash of a dedup key, used as the case
/// directory name so fingerprints with characters object-store backends
/// dislike (`/`, `:`) never leak into a key path.
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

pub fn new_case_id() -> String {
    Uuid::new_v4().to_string()
}

/// Whether an existing case for `fingerprint` is still "fresh" (within
/// `freshness_ttl_seconds`) and a new investigation should therefore be
/// skipped. Mirrors `is_fresh()` in `agent/storage/local_store.py`.
pub fn is_fresh(last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>, dedup: &DedupConfig) -> bool {
    match last_modified {
        Some(ts) => (now - ts).num_seconds() < dedup.freshness_ttl_seconds as i64,
        None => false,
    }
}

/// Store for persisted `Investigation` records and their rendered reports.
pub struct CaseStore {
    object_store: ObjectStore,
    case_index: Arc<dyn CaseIndex>,
}

impl CaseStore {
    pub fn new(object_store: ObjectStore) -> Self {
        Self::with_case_index(object_store, Arc::new(InMemoryCaseIndex::new()))
    }

    /// Construct with an explicit [`CaseIndex`] backend (e.g. a
    /// Postgres-backed one), bypassing the in-memory default.
    pub fn with_case_index(object_store: ObjectStore, case_index: Arc<dyn CaseIndex>) -> Self {
        Self { object_store, case_index }
    }

    /// Freshness-gate check for `<alertname>/<key>.md` (spec.md §4.1 step 5):
    /// head the report object; if it exists and is newer than the
    /// configured TTL, the caller should skip re-investigating. A head
    /// error other than "not found" (e.g. a bare 403) is folded into
    /// `exists=false` by [`ObjectStore`] itself, so it is treated the same
    /// as "unknown, proceed" here.
    pub async fn is_case_fresh(&self, alertname: &str, key: &str, dedup: &DedupConfig, now: DateTime<Utc>) -> Result<bool> {
        let report = report_key(alertname, key);
        let last_modified = self.object_store.last_modified(&report).await.map_err(AgentError::Provider)?;
        Ok(is_fresh(last_modified, now, dedup))
    }

    /// Persist an investigation and its rendered Markdown report. Both
    /// writes are unconditional puts keyed on the same `(alertname, key)`
    /// pair the freshness gate reads — a redelivered job overwrites the
    /// same object rather than creating a duplicate, which is what makes
    /// publication safe under at-least-once delivery (spec.md §5).
    pub async fn save(&self, investigation: &Investigation, key: &str, report_markdown: &str) -> Result<()> {
        let alertname = investigation.alert.alertname().unwrap_or("unknown").to_string();
        let body = serde_json::to_vec_pretty(investigation).map_err(PipelineError::Serde)?;
        self.object_store.put(&case_key(&alertname, key), &body).await.map_err(AgentError::Provider)?;
        self.object_store
            .put(&report_key(&alertname, key), report_markdown.as_bytes())
            .await
            .map_err(AgentError::Provider)?;
        self.index_case(investigation);
        Ok(())
    }

    /// Assign a `case_id` to a successfully persisted run (spec.md §6's
    /// case index contract). Indexing runs CPU-bound and in-process only —
    /// never raises and never aborts publication of the report/analysis
    /// that already landed in object storage.
    fn index_case(&self, investigation: &Investigation) {
        let input = CaseizeInput::from_investigation(investigation);
        let (stored, reason, case_id) = self.case_index.index_incident_run(&input, Utc::now());
        match case_id {
            Some(case_id) => info!(%case_id, stored, %reason, "case indexed"),
            None => warn!(%reason, "case indexing produced no case_id"),
        }
    }

    /// Load a previously saved investigation, if any.
    pub async fn load(&self, alertname: &str, key: &str) -> Result<Option<Investigation>> {
        let k = case_key(alertname, key);
        let Some(body) = self.object_store.get(&k).await.map_err(AgentError::Provider)? else {
            return Ok(None);
        };
        let investigation = serde_json::from_slice(&body).map_err(PipelineError::Serde)?;
        Ok(Some(investigation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_within_ttl() {
        let dedup = DedupConfig { freshness_ttl_seconds: 600 };
        let now = Utc::now();
        assert!(is_fresh(Some(now - Duration::seconds(100)), now, &dedup));
        assert!(!is_fresh(Some(now - Duration::seconds(1000)), now, &dedup));
        assert!(!is_fresh(None, now, &dedup));
    }

    #[test]
    fn hash_key_is_stable_and_hex() {
        let a = hash_key("fp:abc123");
        let b = hash_key("fp:abc123");
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
