//! Small helpers shared by the feature extractors. Ported from the
//! module-private helpers at the top of `agent/pipeline/features.py`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

pub fn to_float(v: Option<&Value>) -> Option<f64> {
    match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Truncate a string to at most `n` characters, appending an ellipsis when
/// truncated.
pub fn truncate(s: Option<&str>, n: usize) -> Option<String> {
    let s = s?;
    if s.chars().count() <= n {
        return Some(s.to_string());
    }
    let truncated: String = s.chars().take(n.saturating_sub(1)).collect();
    Some(format!("{truncated}\u{2026}"))
}

/// Best-effort RFC3339 parse, tolerating a trailing `Z`.
pub fn parse_iso_datetime(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s?;
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Extract numeric values from a Prometheus-shaped series list:
/// `[{"metric": {...}, "values": [[ts, "value"], ...]}, ...]`, optionally
/// filtered to samples tagged with a given `container` label.
pub fn series_values(series: &[HashMap<String, Value>], container: Option<&str>) -> Vec<f64> {
    let mut out = Vec::new();
    for sample in series {
        if let Some(wanted) = container {
            let metric_container = sample
                .get("metric")
                .and_then(Value::as_object)
                .and_then(|m| m.get("container"))
                .and_then(Value::as_str);
            if let Some(c) = metric_container {
                if c != wanted {
                    continue;
                }
            }
        }
        if let Some(Value::Array(values)) = sample.get("values") {
            for pair in values {
                if let Value::Array(tuple) = pair {
                    if let Some(v) = tuple.get(1) {
                        if let Some(f) = to_float(Some(v)) {
                            out.push(f);
                        }
                    }
                }
            }
        }
    }
    out
}

/// Read a nested value out of a `HashMap<String, Value>` tree by key path,
/// returning `None` as soon as a key is missing or an intermediate value
/// isn't an object.
pub fn dig<'a>(map: &'a HashMap<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let mut cur: &Value = map.get(*keys.first()?)?;
    for key in &keys[1..] {
        cur = cur.as_object()?.get(*key)?;
    }
    Some(cur)
}
