//! Kubernetes API client used for K8s evidence collection.
//!
//! Grounded in `MetricsClient` from
//! `examples/syncable-dev-syncable-cli/src/analyzer/k8s_optimize/metrics_client.rs`
//! (the `kube::Client` + `Api<T>` pattern); extended here from a
//! metrics-server reader into the pod/owner-chain/rollout-status/event
//! reader `agent/providers/k8s_provider.py` exposes to evidence collection.

use crate::error::ProviderError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use serde_json::Value;
use std::collections::HashMap;

pub struct KubernetesProvider {
    client: Client,
}

impl KubernetesProvider {
    pub async fn from_env() -> Result<Self, ProviderError> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch a pod's status/spec as a loosely-typed map, matching the
    /// `pod_info` shape `FeaturesK8s` extraction expects
    /// (`phase`, `status_reason`, `status_message`, `container_statuses`).
    pub async fn get_pod_info(&self, namespace: &str, pod: &str) -> Result<HashMap<String, Value>, ProviderError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get(pod).await?;
        let status = found.status.clone().unwrap_or_default();

        let mut out = HashMap::new();
        out.insert("phase".to_string(), Value::String(status.phase.unwrap_or_default()));
        out.insert("status_reason".to_string(), status.reason.map(Value::String).unwrap_or(Value::Null));
        out.insert("status_message".to_string(), status.message.map(Value::String).unwrap_or(Value::Null));

        let statuses: Vec<Value> = status
            .container_statuses
            .unwrap_or_default()
            .into_iter()
            .map(|cs| serde_json::to_value(&cs).unwrap_or(Value::Null))
            .collect();
        out.insert("container_statuses".to_string(), Value::Array(statuses));
        Ok(out)
    }

    pub async fn get_pod_conditions(&self, namespace: &str, pod: &str) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get(pod).await?;
        let conditions = found.status.and_then(|s| s.conditions).unwrap_or_default();
        Ok(conditions
            .into_iter()
            .map(|c| {
                let mut m = HashMap::new();
                m.insert("type".to_string(), Value::String(c.type_));
                m.insert("status".to_string(), Value::String(c.status));
                if let Some(r) = c.reason {
                    m.insert("reason".to_string(), Value::String(r));
                }
                m
            })
            .collect())
    }

    /// List events involving this pod, most-recent-first is left to the
    /// caller (the feature extractor re-sorts deterministically anyway).
    pub async fn get_pod_events(&self, namespace: &str, pod: &str) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let field_selector = format!("involvedObject.name={pod}");
        let list = api.list(&ListParams::default().fields(&field_selector)).await?;
        Ok(list
            .items
            .into_iter()
            .map(|e| {
                let mut m = HashMap::new();
                m.insert("type".to_string(), e.type_.map(Value::String).unwrap_or(Value::Null));
                m.insert("reason".to_string(), e.reason.map(Value::String).unwrap_or(Value::Null));
                m.insert("message".to_string(), e.message.map(Value::String).unwrap_or(Value::Null));
                m.insert("count".to_string(), e.count.map(|c| Value::from(c)).unwrap_or(Value::Null));
                if let Some(ts) = e.last_timestamp {
                    m.insert("last_timestamp".to_string(), Value::String(ts.0.to_rfc3339()));
                }
                if let Some(ts) = e.first_timestamp {
                    m.insert("first_timestamp".to_string(), Value::String(ts.0.to_rfc3339()));
                }
                m
            })
            .collect())
    }

    /// Walk a pod's `ownerReferences` up to its top controller (ReplicaSet
    /// -> Deployment, etc.), returning `{kind, name, namespace}` of the pod
    /// and each ancestor.
    pub async fn get_owner_chain(&self, namespace: &str, pod: &str) -> Result<HashMap<String, Value>, ProviderError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let found = api.get(pod).await?;
        let owners = found.owner_references();
        let mut chain = vec![serde_json::json!({"kind": "Pod", "name": found.name_any()})];
        for owner in owners {
            chain.push(serde_json::json!({"kind": owner.kind, "name": owner.name}));
        }
        let mut out = HashMap::new();
        out.insert("chain".to_string(), Value::Array(chain));
        Ok(out)
    }

    /// Fetch rollout status for a workload kind, used by the change
    /// correlation analyzer to build a timeline.
    pub async fn get_rollout_status(
        &self,
        namespace: &str,
        workload_kind: &str,
        workload_name: &str,
    ) -> Result<HashMap<String, Value>, ProviderError> {
        let mut out = HashMap::new();
        match workload_kind {
            "Deployment" => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let d = api.get(workload_name).await?;
                if let Some(status) = d.status {
                    out.insert("replicas".to_string(), status.replicas.map(Value::from).unwrap_or(Value::Null));
                    out.insert(
                        "updated_replicas".to_string(),
                        status.updated_replicas.map(Value::from).unwrap_or(Value::Null),
                    );
                    out.insert(
                        "unavailable_replicas".to_string(),
                        status.unavailable_replicas.map(Value::from).unwrap_or(Value::Null),
                    );
                }
            }
            "StatefulSet" => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                let s = api.get(workload_name).await?;
                if let Some(status) = s.status {
                    out.insert("replicas".to_string(), Value::from(status.replicas));
                    out.insert(
                        "ready_replicas".to_string(),
                        status.ready_replicas.map(Value::from).unwrap_or(Value::Null),
                    );
                }
            }
            "DaemonSet" => {
                let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
                let ds = api.get(workload_name).await?;
                if let Some(status) = ds.status {
                    out.insert("desired_number_scheduled".to_string(), Value::from(status.desired_number_scheduled));
                    out.insert("number_ready".to_string(), Value::from(status.number_ready));
                }
            }
            _ => {}
        }
        Ok(out)
    }
}
