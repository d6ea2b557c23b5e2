//! Alertmanager client used to fetch active alerts for `list-alerts` and to
//! fill in `get_alert_context()` summaries for investigation jobs. Ported
//! from `agent/providers/alertmanager_provider.py`.

use crate::domain::alert::AlertInstance;
use crate::error::ProviderError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_ALERTMANAGER_URL: &str = "http://localhost:19093";

pub struct AlertmanagerClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    fingerprint: Option<String>,
    #[serde(default)]
    labels: HashMap<String, Value>,
    #[serde(default)]
    annotations: HashMap<String, Value>,
    #[serde(rename = "startsAt")]
    starts_at: Option<String>,
    #[serde(rename = "endsAt")]
    ends_at: Option<String>,
    #[serde(rename = "generatorURL", default)]
    generator_url: String,
}

impl AlertmanagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().expect("reqwest client");
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http }
    }

    /// Fetch active, unsilenced, uninhibited alerts, optionally filtered by
    /// alertname/severity after the fact (Alertmanager's v2 API doesn't
    /// support server-side label filters on this endpoint).
    pub async fn fetch_active_alerts(
        &self,
        alertname: Option<&str>,
        severity: Option<&str>,
    ) -> Result<Vec<AlertInstance>, ProviderError> {
        let url = format!("{}/api/v2/alerts", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("active", "true"), ("silenced", "false"), ("inhibited", "false")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status: status.as_u16(), message: body });
        }
        let raw: Vec<RawAlert> = resp.json().await.map_err(ProviderError::Http)?;

        let alerts = raw
            .into_iter()
            .filter(|a| {
                let matches_name = alertname
                    .map(|want| a.labels.get("alertname").and_then(Value::as_str) == Some(want))
                    .unwrap_or(true);
                let matches_sev = severity
                    .map(|want| a.labels.get("severity").and_then(Value::as_str) == Some(want))
                    .unwrap_or(true);
                matches_name && matches_sev
            })
            .map(|a| AlertInstance {
                fingerprint: a.fingerprint.unwrap_or_default(),
                labels: a.labels,
                annotations: a.annotations,
                starts_at: a.starts_at,
                ends_at: a.ends_at,
                generator_url: Some(a.generator_url),
                state: None,
                normalized_state: None,
                ends_at_kind: None,
            })
            .collect();
        Ok(alerts)
    }

    /// Summary fields used to render an investigation's header. Mirrors
    /// `get_alert_context()` — `alertname`/`severity` default to
    /// `"Unknown"`/`"unknown"` rather than being absent, matching the
    /// original's dict-building behavior.
    pub fn alert_context(alert: &AlertInstance) -> HashMap<String, Value> {
        let mut ctx = HashMap::new();
        ctx.insert("alertname".to_string(), Value::String(alert.alertname().unwrap_or("Unknown").to_string()));
        ctx.insert(
            "severity".to_string(),
            Value::String(alert.label("severity").unwrap_or("unknown").to_string()),
        );
        ctx.insert("summary".to_string(), Value::String(alert.annotation("summary").unwrap_or("").to_string()));
        ctx.insert(
            "description".to_string(),
            Value::String(alert.annotation("description").unwrap_or("").to_string()),
        );
        ctx.insert(
            "runbook_url".to_string(),
            Value::String(alert.annotation("runbook_url").unwrap_or("").to_string()),
        );
        ctx.insert("starts_at".to_string(), alert.starts_at.clone().map(Value::String).unwrap_or(Value::Null));
        ctx.insert("all_labels".to_string(), serde_json::to_value(&alert.labels).unwrap_or(Value::Null));
        ctx.insert("all_annotations".to_string(), serde_json::to_value(&alert.annotations).unwrap_or(Value::Null));
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_context_defaults_unknown() {
        let alert = AlertInstance::default();
        let ctx = AlertmanagerClient::alert_context(&alert);
        assert_eq!(ctx.get("alertname").and_then(Value::as_str), Some("Unknown"));
        assert_eq!(ctx.get("severity").and_then(Value::as_str), Some("unknown"));
    }
}
