//! Log-evidence features: backend/status passthrough plus a cheap
//! timeout/error line count. Ported from `_logs_features()` in
//! `agent/pipeline/features.py`.

use crate::domain::{investigation::Investigation, FeaturesLogs};
use serde_json::Value;

pub fn compute(investigation: &Investigation) -> FeaturesLogs {
    let logs = &investigation.evidence.logs;
    let (timeout_hits, error_hits) = if logs.logs.is_empty() {
        (None, None)
    } else {
        let mut timeouts = 0i64;
        let mut errors = 0i64;
        for entry in &logs.logs {
            let message = entry.get("message").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();
            if message.contains("timeout") || message.contains("timed out") {
                timeouts += 1;
            }
            if message.contains("error") || message.contains("exception") {
                errors += 1;
            }
        }
        (Some(timeouts), Some(errors))
    };

    FeaturesLogs {
        status: logs.logs_status.clone(),
        backend: logs.logs_backend.clone(),
        reason: logs.logs_reason.clone(),
        query_used: logs.logs_query.clone(),
        timeout_hits,
        error_hits,
    }
}
