use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The time window an investigation's Prometheus/log queries are scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    pub window: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Normalized state of an alert once resolution semantics (`endsAt` in the
/// future vs. in the past) have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedState {
    Firing,
    Resolved,
    Unknown,
}

/// How `ends_at` should be interpreted: Alertmanager sets it to a
/// far-future sentinel while an alert is still firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndsAtKind {
    ExpiresAt,
    ResolvedAt,
    Unknown,
}

/// One alert instance as received from Alertmanager (one element of the
/// webhook's `alerts` array).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertInstance {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub labels: HashMap<String, Value>,
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub generator_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub normalized_state: Option<NormalizedState>,
    #[serde(default)]
    pub ends_at_kind: Option<EndsAtKind>,
}

impl AlertInstance {
    /// Read a label as a string, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).and_then(Value::as_str)
    }

    /// Read an annotation as a string, if present.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).and_then(Value::as_str)
    }

    pub fn alertname(&self) -> Option<&str> {
        self.label("alertname")
    }

    pub fn is_firing(&self) -> bool {
        matches!(self.normalized_state, Some(NormalizedState::Firing))
            || self.state.as_deref() == Some("firing")
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.normalized_state, Some(NormalizedState::Resolved))
            || self.state.as_deref() == Some("resolved")
    }
}

impl Default for AlertInstance {
    fn default() -> Self {
        Self {
            fingerprint: String::new(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: None,
            ends_at: None,
            generator_url: None,
            state: None,
            normalized_state: None,
            ends_at_kind: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alertname_reads_label() {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), Value::String("KubernetesPodNotHealthy".into()));
        let alert = AlertInstance { labels, ..Default::default() };
        assert_eq!(alert.alertname(), Some("KubernetesPodNotHealthy"));
    }

    #[test]
    fn firing_detected_from_normalized_state() {
        let alert = AlertInstance { normalized_state: Some(NormalizedState::Firing), ..Default::default() };
        assert!(alert.is_firing());
        assert!(!alert.is_resolved());
    }
}
