//! Evidence collection: fans the parsed [`TargetRef`] out to whichever
//! providers are configured and populates `Investigation.evidence`. Ported
//! from `agent/pipeline/collect.py`'s per-source collector dispatch. Every
//! source is independently best-effort: a provider error is recorded on
//! `investigation.errors` rather than aborting the investigation, so a
//! missing Loki deployment still lets K8s/Prometheus evidence through.

use crate::domain::investigation::Investigation;
use crate::providers::aws::AwsProvider;
use crate::providers::github::GitHubClient;
use crate::providers::kubernetes::KubernetesProvider;
use crate::providers::logs::LogsClient;
use crate::providers::prometheus::PrometheusClient;
use serde_json::Value;
use std::collections::HashMap;

/// Optional provider handles. `None` means "not configured" — the
/// corresponding evidence bag is left at its zero value rather than erroring
/// (mirrors every provider module in `agent/providers/*_provider.py`
/// returning `None`/empty on missing configuration rather than raising).
#[derive(Default)]
pub struct ProviderBundle {
    pub kubernetes: Option<KubernetesProvider>,
    pub prometheus: Option<PrometheusClient>,
    pub logs: Option<LogsClient>,
    pub aws: Option<AwsProvider>,
    pub github: Option<GitHubClient>,
}

fn series_value(name: &str, rows: Vec<HashMap<String, Value>>) -> (String, Value) {
    (name.to_string(), serde_json::to_value(rows).unwrap_or(Value::Array(Vec::new())))
}

/// Collect Kubernetes pod-level evidence for a target with a resolvable
/// namespace + pod identity.
async fn collect_k8s(investigation: &mut Investigation, k8s: &KubernetesProvider) {
    let (Some(namespace), Some(pod)) =
        (investigation.target.namespace.clone(), investigation.target.pod.clone())
    else {
        return;
    };

    match k8s.get_pod_info(&namespace, &pod).await {
        Ok(info) => investigation.evidence.k8s.pod_info = Some(info),
        Err(e) => investigation.push_error(format!("k8s.get_pod_info: {e}")),
    }
    match k8s.get_pod_conditions(&namespace, &pod).await {
        Ok(conditions) => investigation.evidence.k8s.pod_conditions = conditions,
        Err(e) => investigation.push_error(format!("k8s.get_pod_conditions: {e}")),
    }
    match k8s.get_pod_events(&namespace, &pod).await {
        Ok(events) => investigation.evidence.k8s.pod_events = events,
        Err(e) => investigation.push_error(format!("k8s.get_pod_events: {e}")),
    }
    match k8s.get_owner_chain(&namespace, &pod).await {
        Ok(owner) => investigation.evidence.k8s.owner_chain = Some(owner),
        Err(e) => investigation.push_error(format!("k8s.get_owner_chain: {e}")),
    }

    if let (Some(kind), Some(name)) =
        (investigation.target.workload_kind.clone(), investigation.target.workload_name.clone())
    {
        match k8s.get_rollout_status(&namespace, &kind, &name).await {
            Ok(status) => investigation.evidence.k8s.rollout_status = Some(status),
            Err(e) => investigation.push_error(format!("k8s.get_rollout_status: {e}")),
        }
    }
}

/// Collect the fixed set of range-query metrics every family's feature
/// extractor reads (`features::metrics::compute`), scoped to the target's
/// namespace + pod-name prefix.
async fn collect_metrics(investigation: &mut Investigation, prom: &PrometheusClient) {
    let Some(namespace) = investigation.target.namespace.clone() else { return };
    let pod_selector = investigation.target.pod.clone().unwrap_or_else(|| ".*".to_string());
    let end = investigation.time_window.end_time;
    let start = investigation.time_window.start_time;

    let queries: &[(&str, &str, &str)] = &[
        (
            "throttling_data",
            "throttling_percentage",
            "100 * sum by (container) (rate(container_cpu_cfs_throttled_periods_total{namespace=\"NS\",pod=~\"POD.*\"}[5m])) / sum by (container) (rate(container_cpu_cfs_periods_total{namespace=\"NS\",pod=~\"POD.*\"}[5m]))",
        ),
        (
            "cpu_metrics",
            "cpu_usage",
            "sum by (container) (rate(container_cpu_usage_seconds_total{namespace=\"NS\",pod=~\"POD.*\"}[5m]))",
        ),
        (
            "memory_metrics",
            "memory_usage_bytes",
            "sum by (container) (container_memory_working_set_bytes{namespace=\"NS\",pod=~\"POD.*\"})",
        ),
        (
            "http_5xx",
            "series",
            "sum by (container) (rate(http_requests_total{namespace=\"NS\",pod=~\"POD.*\",status=~\"5..\"}[5m]))",
        ),
    ];

    for (bag, key, template) in queries {
        let query = template.replace("NS", &namespace).replace("POD", &pod_selector);
        match prom.query_range(&query, start, end, 60).await {
            Ok(rows) => {
                let (k, v) = series_value(key, rows);
                let entry: HashMap<String, Value> = HashMap::from([(k, v)]);
                set_metrics_bag(investigation, bag, entry);
            }
            Err(e) => investigation.push_error(format!("prometheus.{bag}: {e}")),
        }
    }

    let limit_queries: &[(&str, &str, &str)] = &[
        ("cpu_metrics", "cpu_limits", "kube_pod_container_resource_limits{namespace=\"NS\",pod=~\"POD.*\",resource=\"cpu\"}"),
        (
            "memory_metrics",
            "memory_limits_bytes",
            "kube_pod_container_resource_limits{namespace=\"NS\",pod=~\"POD.*\",resource=\"memory\"}",
        ),
    ];
    for (bag, key, template) in limit_queries {
        let query = template.replace("NS", &namespace).replace("POD", &pod_selector);
        match prom.query_instant(&query, end).await {
            Ok(rows) => {
                let rows: Vec<HashMap<String, Value>> =
                    rows.into_iter().map(|r| HashMap::from([("metric".to_string(), r.get("metric").cloned().unwrap_or_default()), ("values".to_string(), Value::Array(vec![r.get("value").cloned().unwrap_or_default()]))])).collect();
                let (k, v) = series_value(key, rows);
                let entry: HashMap<String, Value> = HashMap::from([(k, v)]);
                merge_metrics_bag(investigation, bag, entry);
            }
            Err(e) => investigation.push_error(format!("prometheus.{bag}.limits: {e}")),
        }
    }

    let restart_query = format!(
        "sum by (container) (increase(kube_pod_container_status_restarts_total{{namespace=\"{namespace}\",pod=~\"{pod_selector}.*\"}}[5m]))"
    );
    match prom.query_range(&restart_query, start, end, 60).await {
        Ok(rows) => {
            let (k, v) = series_value("restart_increase_5m", rows);
            investigation.evidence.metrics.restart_data = Some(HashMap::from([(k, v)]));
        }
        Err(e) => investigation.push_error(format!("prometheus.restart_data: {e}")),
    }
}

fn set_metrics_bag(investigation: &mut Investigation, bag: &str, entry: HashMap<String, Value>) {
    let metrics = &mut investigation.evidence.metrics;
    match bag {
        "throttling_data" => metrics.throttling_data = Some(entry),
        "cpu_metrics" => metrics.cpu_metrics = Some(entry),
        "memory_metrics" => metrics.memory_metrics = Some(entry),
        "http_5xx" => metrics.http_5xx = Some(entry),
        "pod_phase_signal" => metrics.pod_phase_signal = Some(entry),
        _ => {}
    }
}

fn merge_metrics_bag(investigation: &mut Investigation, bag: &str, entry: HashMap<String, Value>) {
    let metrics = &mut investigation.evidence.metrics;
    let target = match bag {
        "cpu_metrics" => &mut metrics.cpu_metrics,
        "memory_metrics" => &mut metrics.memory_metrics,
        _ => return,
    };
    match target {
        Some(existing) => existing.extend(entry),
        None => *target = Some(entry),
    }
}

/// Collect application logs for the target pod, then run a best-effort
/// error-line scan into `parsed_errors` (ERROR/FATAL/Exception lines).
async fn collect_logs(investigation: &mut Investigation, logs: &LogsClient) {
    let (Some(namespace), Some(pod)) =
        (investigation.target.namespace.clone(), investigation.target.pod.clone())
    else {
        investigation.evidence.logs.logs_status = Some("unavailable".to_string());
        investigation.evidence.logs.logs_reason = Some("no pod identity on target".to_string());
        return;
    };

    let selector = LogsClient::pod_selector(&namespace, &pod, investigation.target.container.as_deref());
    investigation.evidence.logs.logs_query = Some(selector.clone());
    investigation.evidence.logs.logs_backend = Some("loki".to_string());

    match logs.query_range(&selector, investigation.time_window.start_time, investigation.time_window.end_time, 500).await {
        Ok(lines) => {
            let parsed = parse_error_lines(&lines);
            investigation.evidence.logs.logs_status = Some("ok".to_string());
            investigation.evidence.logs.parsing_metadata = Some(HashMap::from([
                ("total_lines".to_string(), Value::Number(lines.len().into())),
                ("error_count".to_string(), Value::Number(parsed.len().into())),
            ]));
            investigation.evidence.logs.logs = lines;
            investigation.evidence.logs.parsed_errors = Some(parsed);
        }
        Err(e) => {
            investigation.evidence.logs.logs_status = Some("unavailable".to_string());
            investigation.evidence.logs.logs_reason = Some(e.to_string());
        }
    }
}

fn parse_error_lines(lines: &[HashMap<String, Value>]) -> Vec<HashMap<String, Value>> {
    lines
        .iter()
        .filter(|entry| {
            entry
                .get("message")
                .and_then(Value::as_str)
                .map(|m| {
                    let upper = m.to_ascii_uppercase();
                    upper.contains("ERROR") || upper.contains("FATAL") || upper.contains("EXCEPTION")
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Best-effort GitHub evidence, gated on a `repo` annotation already present
/// on the alert (repo discovery heuristics live in `agent/providers/github_provider.py`
/// and were not ported — see `DESIGN.md`).
async fn collect_github(investigation: &mut Investigation, github: &GitHubClient) {
    let Some(repo) = investigation.alert.annotation("repo").map(str::to_string) else { return };
    investigation.evidence.github.repo = Some(repo.clone());
    investigation.evidence.github.repo_discovery_method = Some("annotation".to_string());

    match github.recent_commits(&repo, 10).await {
        Ok(commits) => investigation.evidence.github.recent_commits = commits,
        Err(e) => investigation.push_error(format!("github.recent_commits: {e}")),
    }
    match github.workflow_runs(&repo, 10).await {
        Ok(runs) => investigation.evidence.github.workflow_runs = runs,
        Err(e) => investigation.push_error(format!("github.workflow_runs: {e}")),
    }
}

/// Collect CloudTrail evidence for the resolved workload name, when AWS is
/// configured. EC2/RDS/ECR evidence is collected by
/// [`crate::enrich`]'s `image_pull`/capacity paths on demand rather than
/// unconditionally here, since most families never need it.
async fn collect_aws(investigation: &mut Investigation, aws: &AwsProvider) {
    let Some(resource) = investigation
        .target
        .workload_name
        .clone()
        .or_else(|| investigation.target.pod.clone())
    else {
        return;
    };
    match aws
        .lookup_events(&resource, investigation.time_window.start_time, investigation.time_window.end_time)
        .await
    {
        Ok(events) => investigation.evidence.aws.cloudtrail_events = Some(events),
        Err(e) => investigation.push_error(format!("aws.lookup_events: {e}")),
    }
}

/// Run every configured collector against `investigation`, in the fixed
/// order K8s → metrics → logs → changes' own provider calls (see
/// [`crate::analyzers::changes`]) → GitHub → AWS. K8s first because several
/// later features (logs selector, capacity scope) depend on
/// `target.workload_name` possibly being filled in from the owner chain.
pub async fn collect(investigation: &mut Investigation, providers: &ProviderBundle) {
    if investigation.target.has_k8s_identity() {
        if let Some(k8s) = &providers.kubernetes {
            collect_k8s(investigation, k8s).await;
        }
    }
    if let Some(prom) = &providers.prometheus {
        collect_metrics(investigation, prom).await;
    }
    if let Some(logs) = &providers.logs {
        collect_logs(investigation, logs).await;
    } else {
        investigation.evidence.logs.logs_status = Some("unavailable".to_string());
        investigation.evidence.logs.logs_reason = Some("no log backend configured".to_string());
    }
    if let Some(github) = &providers.github {
        collect_github(investigation, github).await;
    }
    if let Some(aws) = &providers.aws {
        collect_aws(investigation, aws).await;
    }
}
