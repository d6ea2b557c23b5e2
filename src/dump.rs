//! JSON dump helpers for `tarka-agent investigate --dump-json {analysis,investigation}`.
//! Ported from `agent/dump.py`. Kept out of `pipeline`/`domain` so CLI
//! presentation concerns don't leak into the core model.

use crate::domain::investigation::Investigation;
use crate::domain::target::TargetType;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum DumpMode {
    Analysis,
    Investigation,
}

/// Drop null/empty entries from a JSON object, mirroring `_clean()` — the
/// analysis-mode output is meant to be small and free of placeholder noise.
fn clean(map: Map<String, Value>) -> Value {
    let cleaned: Map<String, Value> = map
        .into_iter()
        .filter(|(_, v)| !matches!(v, Value::Null) && v != &json!("") && v != &json!([]) && v != &json!({}))
        .collect();
    Value::Object(cleaned)
}

/// Split an alert's raw labels into `core_labels` (the resolved target
/// identity) and `source_labels` (scrape/metric-source metadata that is
/// commonly confused with it, e.g. a kube-state-metrics `job`/`service`
/// pair on a pod-scoped alert). Mirrors `_alert_label_views()`.
fn alert_label_views(investigation: &Investigation) -> (Value, Value) {
    let labels = &investigation.alert.labels;
    let target = &investigation.target;
    let label_str = |k: &str| labels.get(k).cloned().unwrap_or(Value::Null);

    let mut core = Map::new();
    core.insert("alertname".to_string(), label_str("alertname"));
    core.insert("severity".to_string(), label_str("severity"));
    core.insert(
        "cluster".to_string(),
        target.cluster.clone().map(Value::String).unwrap_or_else(|| label_str("cluster")),
    );
    core.insert("target_type".to_string(), json!(target.target_type));

    match target.target_type {
        TargetType::Pod => {
            core.insert(
                "namespace".to_string(),
                target.namespace.clone().map(Value::String).unwrap_or_else(|| label_str("namespace")),
            );
            core.insert(
                "pod".to_string(),
                target.pod.clone().map(Value::String).unwrap_or_else(|| label_str("pod")),
            );
            core.insert("container".to_string(), target.container.clone().map(Value::String).unwrap_or(Value::Null));
            core.insert(
                "workload_kind".to_string(),
                target.workload_kind.clone().map(Value::String).unwrap_or(Value::Null),
            );
            core.insert(
                "workload_name".to_string(),
                target.workload_name.clone().map(Value::String).unwrap_or(Value::Null),
            );
        }
        TargetType::Service => {
            core.insert(
                "namespace".to_string(),
                target.namespace.clone().map(Value::String).unwrap_or_else(|| label_str("namespace")),
            );
            core.insert(
                "service".to_string(),
                target.service.clone().map(Value::String).unwrap_or_else(|| label_str("service")),
            );
        }
        TargetType::Node => {
            core.insert(
                "instance".to_string(),
                target.instance.clone().map(Value::String).unwrap_or_else(|| label_str("instance")),
            );
        }
        TargetType::Cluster => {
            core.insert(
                "cluster".to_string(),
                target.cluster.clone().map(Value::String).unwrap_or_else(|| label_str("cluster")),
            );
        }
        TargetType::Workload | TargetType::Unknown => {}
    }

    let mut source = Map::new();
    if target.target_type == TargetType::Pod {
        for key in ["job", "service", "instance", "endpoint", "prometheus"] {
            if let Some(v) = labels.get(key) {
                source.insert(key.to_string(), v.clone());
            }
        }
        let raw_container = labels.get("container").or_else(|| labels.get("Container")).or_else(|| labels.get("container_name"));
        if let Some(raw) = raw_container {
            let differs = target.container.as_deref().map(|c| Some(c) != raw.as_str()).unwrap_or(true);
            if differs {
                source.insert("scrape_container".to_string(), raw.clone());
            }
        }
    }

    (clean(core), clean(source))
}

/// Analysis-mode `alert.labels`: the raw label map with scrape-metadata
/// keys stripped once they've been promoted into `source_labels`, so the
/// two views don't duplicate the same fact under two names.
fn compact_labels(investigation: &Investigation, source_labels: &Value) -> Value {
    let mut labels = investigation.alert.labels.clone();
    if investigation.target.target_type == TargetType::Pod {
        if let Value::Object(source) = source_labels {
            if !source.is_empty() {
                for key in ["job", "service", "instance", "endpoint", "prometheus"] {
                    labels.remove(key);
                }
                if source.contains_key("scrape_container") {
                    labels.remove("container");
                    labels.remove("Container");
                    labels.remove("container_name");
                }
            }
        }
    }
    serde_json::to_value(labels).unwrap_or(Value::Null)
}

/// Render an [`Investigation`] as the JSON shape `--dump-json` emits.
/// `mode=investigation` is the full raw record (everything serializes
/// through the same `Serialize` impl used for persistence); `mode=analysis`
/// is the small, stable, explainable subset consumed by the on-call UI and
/// the RCA graph.
pub fn investigation_to_json(investigation: &Investigation, mode: DumpMode) -> Value {
    if mode == DumpMode::Investigation {
        return serde_json::to_value(investigation).unwrap_or(Value::Null);
    }

    let (core_labels, source_labels) = alert_label_views(investigation);
    let labels_compact = compact_labels(investigation, &source_labels);

    let logs = &investigation.evidence.logs;
    let logs = json!({
        "status": logs.logs_status,
        "reason": logs.logs_reason,
        "count": logs.logs.len(),
        "parsed_errors": logs.parsed_errors.clone().unwrap_or_default(),
    });

    let github = investigation.evidence.github.repo.as_ref().map(|_| {
        let g = &investigation.evidence.github;
        json!({ "repo": g.repo, "repo_discovery_method": g.repo_discovery_method, "is_third_party": g.is_third_party })
    });

    json!({
        "alert": {
            "fingerprint": investigation.alert.fingerprint,
            "labels": labels_compact,
            "core_labels": core_labels,
            "source_labels": source_labels,
            "annotations": investigation.alert.annotations,
            "starts_at": investigation.alert.starts_at,
            "ends_at": investigation.alert.ends_at,
            "state": investigation.alert.state,
            "normalized_state": investigation.alert.normalized_state,
            "ends_at_kind": investigation.alert.ends_at_kind,
        },
        "target": investigation.target,
        "time_window": investigation.time_window,
        "evidence": {
            "logs": logs,
            "github": github,
        },
        "analysis": {
            "features": investigation.analysis.features,
            "scores": investigation.analysis.scores,
            "verdict": investigation.analysis.verdict,
            "change": investigation.analysis.change,
            "noise": investigation.analysis.noise,
            "decision": investigation.analysis.decision,
            "enrichment": investigation.analysis.enrichment,
            "hypotheses": investigation.analysis.hypotheses,
            "capacity": investigation.analysis.capacity,
            "rca": investigation.analysis.rca,
            "llm": investigation.analysis.llm,
            "debug": investigation.analysis.debug,
        },
        "errors": investigation.errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use crate::domain::target::TargetRef;
    use chrono::Utc;
    use serde_json::Value as V;
    use std::collections::HashMap;

    fn base_investigation(labels: HashMap<String, V>, target: TargetRef) -> Investigation {
        let mut inv = Investigation::new(
            AlertInstance { fingerprint: "fp".into(), labels, ..Default::default() },
            TimeWindow { window: "1h".into(), start_time: Utc::now(), end_time: Utc::now() },
        );
        inv.target = target;
        inv
    }

    #[test]
    fn analysis_mode_splits_scrape_metadata_into_source_labels() {
        let mut labels = HashMap::new();
        for (k, v) in [
            ("alertname", "KubernetesPodNotHealthy"),
            ("severity", "info"),
            ("namespace", "test"),
            ("pod", "room-management-api-xxx"),
            ("job", "kube-state-metrics"),
            ("service", "victoria-metrics-kube-state-metrics"),
            ("instance", "10.0.0.1:8080"),
            ("container", "kube-state-metrics"),
            ("cluster", "c1"),
        ] {
            labels.insert(k.to_string(), V::String(v.to_string()));
        }
        let target = TargetRef {
            target_type: TargetType::Pod,
            namespace: Some("test".into()),
            pod: Some("room-management-api-xxx".into()),
            cluster: Some("c1".into()),
            ..Default::default()
        };
        let inv = base_investigation(labels, target);
        let out = investigation_to_json(&inv, DumpMode::Analysis);
        let source = &out["alert"]["source_labels"];
        assert_eq!(source["job"], "kube-state-metrics");
        assert_eq!(source["scrape_container"], "kube-state-metrics");
        assert!(out["alert"]["labels"].get("job").is_none());
        assert!(out["alert"]["labels"].get("container").is_none());
    }

    #[test]
    fn investigation_mode_is_the_full_record() {
        let inv = base_investigation(HashMap::new(), TargetRef::default());
        let out = investigation_to_json(&inv, DumpMode::Investigation);
        assert!(out.get("errors").is_some());
        assert!(out.get("meta").is_some());
    }
}
