//! Change-correlation features, read out of `Analysis.change` (computed
//! earlier in the pipeline by [`crate::analyzers::changes`]). Ported from
//! `_changes_features()` in `agent/pipeline/features.py`.

use crate::domain::{investigation::Investigation, FeaturesChanges};
use serde_json::Value;

pub fn compute(investigation: &Investigation) -> FeaturesChanges {
    let change = investigation.analysis.change.as_ref();
    let rollout_within_window = change.and_then(|c| c.has_recent_change);
    let last_change_ts = change.and_then(|c| c.last_change_time.clone());

    let workload = change.and_then(|c| c.timeline.as_ref()).and_then(|t| t.workload.as_ref());
    let workload_kind = workload.and_then(|w| w.get("kind")).and_then(Value::as_str).map(str::to_string);
    let workload_name = workload.and_then(|w| w.get("name")).and_then(Value::as_str).map(str::to_string);

    FeaturesChanges { rollout_within_window, last_change_ts, workload_kind, workload_name }
}
