//! The canonical "family" of an investigation — one of a closed set of
//! incident archetypes the rest of the pipeline dispatches on (diagnostics,
//! scoring, enrichment). Stored once in `Investigation.meta` and read back
//! from there first so every later stage agrees, even if the feature
//! extractor that originally computed it disagrees with a stage that runs
//! after a retry. Ported from `agent/core/family.py`.

use crate::domain::Investigation;
use serde_json::Value;

pub const DEFAULT_FAMILY: &str = "generic";

/// The closed set of incident families the agent recognizes. `Other` is
/// never produced by [`set_canonical_family`] itself — it exists so callers
/// that only need "is this a known family" can match exhaustively without
/// panicking on an unrecognized string loaded from old persisted data.
pub const KNOWN_FAMILIES: &[&str] = &[
    "crashloop",
    "pod_not_healthy",
    "cpu_throttling",
    "http_5xx",
    "oom_killed",
    "memory_pressure",
    "k8s_rollout_health",
    "target_down",
    "observability_pipeline",
    "meta",
    "job_failed",
    "generic",
];

pub fn is_known_family(family: &str) -> bool {
    KNOWN_FAMILIES.contains(&family)
}

/// Record the canonical family for this investigation, along with which
/// stage set it (for debugging disagreements between the feature extractor
/// and a later re-classification).
pub fn set_canonical_family(investigation: &mut Investigation, family: &str, source: &str) {
    investigation.meta.insert("family".to_string(), Value::String(family.to_string()));
    investigation.meta.insert("family_source".to_string(), Value::String(source.to_string()));
}

/// Read the canonical family, preferring (in order): `meta.family`, the
/// deprecated `meta.family_hint` (back-compat with older persisted
/// investigations), `analysis.features.family`, then `default`.
pub fn get_family<'a>(investigation: &'a Investigation, default: &'a str) -> &'a str {
    if let Some(Value::String(f)) = investigation.meta.get("family") {
        return f.as_str();
    }
    if let Some(Value::String(f)) = investigation.meta.get("family_hint") {
        return f.as_str();
    }
    if let Some(features) = investigation.analysis.features.as_ref() {
        return features.family.as_str();
    }
    default
}

/// Read which stage set the canonical family, if recorded.
pub fn get_family_source(investigation: &Investigation) -> Option<&str> {
    match investigation.meta.get("family_source") {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertInstance, TimeWindow};
    use chrono::Utc;

    fn empty_investigation() -> Investigation {
        Investigation::new(
            AlertInstance::default(),
            TimeWindow { window: "5m".into(), start_time: Utc::now(), end_time: Utc::now() },
        )
    }

    #[test]
    fn defaults_to_generic_with_no_signal() {
        let inv = empty_investigation();
        assert_eq!(get_family(&inv, DEFAULT_FAMILY), "generic");
    }

    #[test]
    fn meta_family_wins_over_family_hint() {
        let mut inv = empty_investigation();
        inv.meta.insert("family_hint".to_string(), Value::String("pod_not_healthy".into()));
        set_canonical_family(&mut inv, "crashloop", "pipeline");
        assert_eq!(get_family(&inv, DEFAULT_FAMILY), "crashloop");
        assert_eq!(get_family_source(&inv), Some("pipeline"));
    }
}
