//! Capacity / rightsizing analyzer. Grounded only on the behavior exercised
//! by `tests/test_capacity.py`, `tests/test_capacity_dedupe.py`, and
//! `tests/test_capacity_rightsizing_recommendation.py` — the
//! `agent/pipeline/capacity.py` source itself was not present in the
//! retrieved pack (see `DESIGN.md`).

use crate::domain::analysis::CapacityReport;
use crate::domain::investigation::Investigation;
use crate::providers::prometheus::PrometheusClient;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

struct ContainerUsage {
    container: String,
    cpu_usage_cores: Option<f64>,
    cpu_request_cores: Option<f64>,
    mem_usage_bytes: Option<f64>,
    mem_request_bytes: Option<f64>,
}

fn scalar_map(result: &[HashMap<String, Value>]) -> HashMap<String, f64> {
    let mut out = HashMap::new();
    for row in result {
        let Some(container) = row.get("metric").and_then(Value::as_object).and_then(|m| m.get("container")).and_then(Value::as_str) else {
            continue;
        };
        if let Some(v) = row.get("value").and_then(Value::as_array).and_then(|a| a.get(1)).and_then(Value::as_str).and_then(|s| s.parse().ok()) {
            out.insert(container.to_string(), v);
        }
    }
    out
}

fn millicores(cores: f64) -> i64 {
    (cores * 1000.0).round() as i64
}

fn rightsizing_recommendation(container: &str, request_cores: f64, p95_usage_cores: f64) -> String {
    let req_m = millicores(request_cores);
    let p95_m = millicores(p95_usage_cores);
    let low = (p95_m as f64 * 1.3).round() as i64;
    let high = (p95_m as f64 * 2.0).round().max((low + 10) as f64) as i64;
    format!("{container}: CPU request {req_m}m is oversized vs p95 usage ~{p95_m}m; consider {low}m-{high}m")
}

/// Instant-query current usage/requests for every container in the target
/// workload's namespace, grouped by container label.
async fn collect_instant(
    prom: &PrometheusClient,
    namespace: &str,
    workload: &str,
    at: DateTime<Utc>,
) -> (HashMap<String, f64>, HashMap<String, f64>, HashMap<String, f64>, HashMap<String, f64>) {
    let cpu_usage_q = format!(
        "sum by (container) (rate(container_cpu_usage_seconds_total{{namespace=\"{namespace}\",pod=~\"{workload}.*\"}}[5m]))"
    );
    let cpu_req_q = format!(
        "sum by (container) (kube_pod_container_resource_requests{{namespace=\"{namespace}\",pod=~\"{workload}.*\",resource=\"cpu\"}})"
    );
    let mem_usage_q = format!(
        "sum by (container) (container_memory_working_set_bytes{{namespace=\"{namespace}\",pod=~\"{workload}.*\"}})"
    );
    let mem_req_q = format!(
        "sum by (container) (kube_pod_container_resource_requests{{namespace=\"{namespace}\",pod=~\"{workload}.*\",resource=\"memory\"}})"
    );

    let cpu_usage = prom.query_instant(&cpu_usage_q, at).await.map(|r| scalar_map(&r)).unwrap_or_default();
    let cpu_req = prom.query_instant(&cpu_req_q, at).await.map(|r| scalar_map(&r)).unwrap_or_default();
    let mem_usage = prom.query_instant(&mem_usage_q, at).await.map(|r| scalar_map(&r)).unwrap_or_default();
    let mem_req = prom.query_instant(&mem_req_q, at).await.map(|r| scalar_map(&r)).unwrap_or_default();
    (cpu_usage, cpu_req, mem_usage, mem_req)
}

/// Range-query CPU usage over the window and compute p95 per container, used
/// only when a container's request is at least 2x its instant usage (a
/// rightsizing recommendation is worth the extra query).
async fn p95_cpu_usage(
    prom: &PrometheusClient,
    namespace: &str,
    workload: &str,
    container: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<f64> {
    let query = format!(
        "rate(container_cpu_usage_seconds_total{{namespace=\"{namespace}\",pod=~\"{workload}.*\",container=\"{container}\"}}[5m])"
    );
    let result = prom.query_range(&query, start, end, 60).await.ok()?;
    let mut samples: Vec<f64> = result
        .into_iter()
        .filter_map(|row| row.get("values").and_then(Value::as_array).cloned())
        .flatten()
        .filter_map(|pair| pair.as_array().and_then(|a| a.get(1)).and_then(Value::as_str).and_then(|s| s.parse().ok()))
        .collect();
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((samples.len() as f64 - 1.0) * 0.95).round() as usize;
    Some(samples[idx])
}

/// Mutate `investigation.analysis.capacity` with a best-effort report.
/// Sets `status = "unavailable"` (never an error) when the target lacks a
/// resolvable workload to scope Prometheus queries against.
pub async fn analyze_capacity(investigation: &mut Investigation, prom: &PrometheusClient) {
    let report = match build_capacity_report_for_investigation(investigation, Utc::now(), 5, prom).await {
        Some(report) => report,
        None => CapacityReport { status: Some("unavailable".to_string()), ..Default::default() },
    };
    investigation.analysis.capacity = Some(report);
}

/// Build the capacity report for an investigation, or `None` when the
/// target doesn't resolve to a namespace + workload.
pub async fn build_capacity_report_for_investigation(
    investigation: &Investigation,
    end_time: DateTime<Utc>,
    top_n: usize,
    prom: &PrometheusClient,
) -> Option<CapacityReport> {
    let namespace = investigation.target.namespace.as_deref()?;
    let workload = investigation.target.workload_name.as_deref().or(investigation.target.pod.as_deref())?;
    let start_time = end_time - chrono::Duration::hours(1);

    let (cpu_usage, cpu_req, mem_usage, mem_req) = collect_instant(prom, namespace, workload, end_time).await;

    let mut containers: Vec<ContainerUsage> = cpu_req
        .keys()
        .chain(mem_req.keys())
        .cloned()
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .map(|c| ContainerUsage {
            cpu_usage_cores: cpu_usage.get(&c).copied(),
            cpu_request_cores: cpu_req.get(&c).copied(),
            mem_usage_bytes: mem_usage.get(&c).copied(),
            mem_request_bytes: mem_req.get(&c).copied(),
            container: c,
        })
        .collect();
    containers.sort_by(|a, b| a.container.cmp(&b.container));

    let mut recommendations = Vec::new();
    let mut over_cpu: Vec<HashMap<String, Value>> = Vec::new();
    let mut under_cpu: Vec<HashMap<String, Value>> = Vec::new();
    let mut over_mem: Vec<HashMap<String, Value>> = Vec::new();
    let mut under_mem: Vec<HashMap<String, Value>> = Vec::new();

    for c in &containers {
        if let (Some(req), Some(usage)) = (c.cpu_request_cores, c.cpu_usage_cores) {
            if req > 0.0 && usage / req < 0.5 {
                let p95 = p95_cpu_usage(prom, namespace, workload, &c.container, start_time, end_time).await.unwrap_or(usage);
                recommendations.push(rightsizing_recommendation(&c.container, req, p95));
                over_cpu.push(HashMap::from([
                    ("container".to_string(), Value::String(c.container.clone())),
                    ("request_cores".to_string(), serde_json::json!(req)),
                    ("p95_usage_cores".to_string(), serde_json::json!(p95)),
                ]));
            } else if req > 0.0 && usage / req > 1.0 {
                under_cpu.push(HashMap::from([
                    ("container".to_string(), Value::String(c.container.clone())),
                    ("request_cores".to_string(), serde_json::json!(req)),
                    ("usage_cores".to_string(), serde_json::json!(usage)),
                ]));
            }
        }
        if let (Some(req), Some(usage)) = (c.mem_request_bytes, c.mem_usage_bytes) {
            if req > 0.0 && usage / req < 0.5 {
                over_mem.push(HashMap::from([
                    ("container".to_string(), Value::String(c.container.clone())),
                    ("request_bytes".to_string(), serde_json::json!(req)),
                    ("usage_bytes".to_string(), serde_json::json!(usage)),
                ]));
            } else if req > 0.0 && usage / req > 1.0 {
                under_mem.push(HashMap::from([
                    ("container".to_string(), Value::String(c.container.clone())),
                    ("request_bytes".to_string(), serde_json::json!(req)),
                    ("usage_bytes".to_string(), serde_json::json!(usage)),
                ]));
            }
        }
    }

    over_cpu.truncate(top_n);
    under_cpu.truncate(top_n);
    over_mem.truncate(top_n);
    under_mem.truncate(top_n);

    Some(CapacityReport {
        status: Some("ok".to_string()),
        error: None,
        scope: Some(HashMap::from([
            ("namespace".to_string(), Value::String(namespace.to_string())),
            ("workload".to_string(), Value::String(workload.to_string())),
        ])),
        queries_used: None,
        recommendations,
        rightsizing_cpu: None,
        top_cpu_over_request: Some(over_cpu),
        top_cpu_under_request: Some(under_cpu),
        top_mem_over_request: Some(over_mem),
        top_mem_under_request: Some(under_mem),
    })
}
