//! Prometheus-derived features: CPU throttling/usage, memory, HTTP 5xx, and
//! the pod-phase-signal flag. Ported from `_metrics_features()` and its
//! helpers in `agent/pipeline/features.py`.

use super::percentile::percentile;
use super::util::series_values;
use crate::domain::{investigation::Investigation, FeaturesMetrics};
use serde_json::Value;
use std::collections::HashMap;

fn first_sample_value(series: &[HashMap<String, Value>], container: Option<&str>) -> Option<f64> {
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
            if let Some(Value::Array(first)) = values.first() {
                if let Some(v) = first.get(1) {
                    if let Some(n) = super::util::to_float(Some(v)) {
                        return Some(n);
                    }
                }
            }
        }
    }
    None
}

fn series_list<'a>(map: &'a HashMap<String, Value>, key: &str) -> Vec<HashMap<String, Value>> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_object().map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn compute(investigation: &Investigation) -> FeaturesMetrics {
    let container = investigation.target.container.as_deref();
    let metrics = &investigation.evidence.metrics;

    let throttling = metrics.throttling_data.clone().unwrap_or_default();
    let throttle_series = series_list(&throttling, "throttling_percentage");
    let throttle_p95 = percentile(&series_values(&throttle_series, container), 0.95);

    let mut top_container: Option<String> = None;
    let mut top_container_p95: Option<f64> = None;
    let mut by_container: HashMap<String, Vec<f64>> = HashMap::new();
    for sample in &throttle_series {
        let c = sample.get("metric").and_then(Value::as_object).and_then(|m| m.get("container")).and_then(Value::as_str);
        let Some(c) = c else { continue };
        if c.is_empty() || c == "POD" {
            continue;
        }
        if let Some(Value::Array(values)) = sample.get("values") {
            let vals: Vec<f64> = values
                .iter()
                .filter_map(|pair| pair.as_array().and_then(|t| t.get(1)).and_then(|v| super::util::to_float(Some(v))))
                .collect();
            by_container.entry(c.to_string()).or_default().extend(vals);
        }
    }
    for (c, vals) in &by_container {
        if let Some(p95) = percentile(vals, 0.95) {
            if top_container_p95.is_none() || p95 > top_container_p95.unwrap() {
                top_container_p95 = Some(p95);
                top_container = Some(c.clone());
            }
        }
    }

    let cpu = metrics.cpu_metrics.clone().unwrap_or_default();
    let usage_series = series_list(&cpu, "cpu_usage");
    let cpu_usage_p95 = percentile(&series_values(&usage_series, container), 0.95);
    let cpu_limits = series_list(&cpu, "cpu_limits");
    let cpu_limit = first_sample_value(&cpu_limits, container);

    let cpu_near_limit = match (cpu_usage_p95, cpu_limit) {
        (Some(usage), Some(limit)) if limit > 0.0 => Some(usage / limit >= 0.8),
        _ => None,
    };

    let top_ratio = top_container.as_deref().and_then(|top| {
        let top_usage_p95 = percentile(&series_values(&usage_series, Some(top)), 0.95)?;
        let top_limit = first_sample_value(&cpu_limits, Some(top))?;
        if top_limit > 0.0 {
            Some(top_usage_p95 / top_limit)
        } else {
            None
        }
    });

    let pod_phase_signal = metrics.pod_phase_signal.clone().unwrap_or_default();
    let signal_series = series_list(&pod_phase_signal, "pod_phase_signal");
    let unhealthy = signal_series.iter().any(|s| {
        matches!(s.get("values"), Some(Value::Array(values)) if values.iter().any(|pair| {
            pair.as_array().and_then(|t| t.get(1)).and_then(|v| super::util::to_float(Some(v))).map(|f| f > 0.0).unwrap_or(false)
        }))
    });

    let http = metrics.http_5xx.clone().unwrap_or_default();
    let http_series = series_list(&http, "series");
    let http_vals = series_values(&http_series, container);
    let (http_p95, http_max) = if http_vals.is_empty() {
        (None, None)
    } else {
        (percentile(&http_vals, 0.95), http_vals.iter().cloned().fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.max(v)))))
    };

    let memory = metrics.memory_metrics.clone().unwrap_or_default();
    let mem_usage_series = series_list(&memory, "memory_usage_bytes");
    let mem_usage_p95 = percentile(&series_values(&mem_usage_series, container), 0.95);
    let mem_limits = series_list(&memory, "memory_limits_bytes");
    let mem_limit = first_sample_value(&mem_limits, container);
    let mem_near = match (mem_usage_p95, mem_limit) {
        (Some(usage), Some(limit)) if limit > 0.0 => Some(usage / limit >= 0.9),
        _ => None,
    };

    FeaturesMetrics {
        cpu_throttle_p95_pct: throttle_p95,
        cpu_usage_p95_cores: cpu_usage_p95,
        cpu_limit_cores: cpu_limit,
        cpu_near_limit,
        pod_unhealthy_phase_observed: Some(unhealthy),
        http_5xx_rate_p95: http_p95,
        http_5xx_rate_max: http_max,
        memory_usage_p95_bytes: mem_usage_p95,
        memory_limit_bytes: mem_limit,
        memory_near_limit: mem_near,
        cpu_throttle_top_container: top_container,
        cpu_throttle_top_container_p95_pct: top_container_p95,
        cpu_throttle_top_container_usage_limit_ratio: top_ratio,
    }
}
