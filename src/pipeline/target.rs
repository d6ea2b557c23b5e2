//! Parses an alert's labels into a [`TargetRef`] identity. Ported from the
//! label-synonym cascades in `agent/providers/alertmanager_provider.py`'s
//! `extract_pod_info_from_alert()`.
//!
//! Safety invariant (spec.md §4.1, tested in §8): **never** infer pod or
//! namespace identity from the `instance` label. Alertmanager's `instance`
//! label is frequently a bare IP:port or a synthetic probe target with no
//! relationship to any pod, and treating it as one has caused false
//! evidence lookups in the original system this was distilled from.

use crate::domain::{AlertInstance, TargetRef, TargetType};

const NAMESPACE_LABELS: &[&str] = &["namespace", "kubernetes_namespace", "k8s_namespace", "exported_namespace"];
const POD_LABELS: &[&str] = &["pod", "pod_name", "kubernetes_pod_name", "exported_pod"];
const CONTAINER_LABELS: &[&str] = &["container", "container_name", "exported_container"];
const WORKLOAD_KIND_LABELS: &[&str] = &["workload_kind", "owner_kind", "controller_kind"];
const WORKLOAD_NAME_LABELS: &[&str] = &["workload_name", "owner_name", "controller_name", "deployment", "statefulset", "daemonset", "job_name", "job"];
const SERVICE_LABELS: &[&str] = &["service", "service_name", "app", "app_kubernetes_io_name"];

fn first_label<'a>(alert: &'a AlertInstance, candidates: &[&str]) -> Option<&'a str> {
    candidates.iter().find_map(|key| alert.label(key))
}

/// Parse an alert's labels into a [`TargetRef`]. `playbook` is the alerting
/// rule's own declared playbook annotation, if present, and takes
/// precedence over family-detection heuristics run later in the pipeline.
pub fn parse_target(alert: &AlertInstance) -> TargetRef {
    let namespace = first_label(alert, NAMESPACE_LABELS).map(str::to_string);
    let pod = first_label(alert, POD_LABELS).map(str::to_string);
    let container = first_label(alert, CONTAINER_LABELS).map(str::to_string);
    let workload_kind = first_label(alert, WORKLOAD_KIND_LABELS).map(str::to_string);
    let workload_name = first_label(alert, WORKLOAD_NAME_LABELS).map(str::to_string);
    let service = first_label(alert, SERVICE_LABELS).map(str::to_string);
    // `instance` is recorded for display/debug purposes only — it is never
    // used to derive namespace/pod/container above.
    let instance = alert.label("instance").map(str::to_string);
    let job = alert.label("job").map(str::to_string);
    let cluster = alert.label("cluster").or_else(|| alert.label("cluster_name")).map(str::to_string);
    let team = alert.label("team").map(str::to_string);
    let environment = alert.label("environment").or_else(|| alert.label("env")).map(str::to_string);
    let playbook = alert.annotation("playbook").map(str::to_string);

    let target_type = if pod.is_some() {
        TargetType::Pod
    } else if workload_name.is_some() {
        TargetType::Workload
    } else if service.is_some() {
        TargetType::Service
    } else if alert.label("node").is_some() {
        TargetType::Node
    } else if namespace.is_some() || cluster.is_some() {
        TargetType::Cluster
    } else {
        TargetType::Unknown
    };

    TargetRef {
        target_type,
        namespace,
        pod,
        container,
        playbook,
        workload_kind,
        workload_name,
        service,
        instance,
        job,
        cluster,
        team,
        environment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;

    fn alert_with_labels(pairs: &[(&str, &str)]) -> AlertInstance {
        let mut labels = HashMap::new();
        for (k, v) in pairs {
            labels.insert(k.to_string(), Value::String(v.to_string()));
        }
        AlertInstance { labels, ..Default::default() }
    }

    #[test]
    fn does_not_infer_pod_from_instance() {
        let alert = alert_with_labels(&[("instance", "10.0.1.5:9100")]);
        let target = parse_target(&alert);
        assert_eq!(target.pod, None);
        assert_eq!(target.namespace, None);
        assert_eq!(target.instance.as_deref(), Some("10.0.1.5:9100"));
    }

    #[test]
    fn prefers_pod_label_synonyms() {
        let alert = alert_with_labels(&[("namespace", "payments"), ("kubernetes_pod_name", "api-7d9-abc")]);
        let target = parse_target(&alert);
        assert_eq!(target.namespace.as_deref(), Some("payments"));
        assert_eq!(target.pod.as_deref(), Some("api-7d9-abc"));
        assert_eq!(target.target_type, TargetType::Pod);
    }
}
