//! Log backend client. Grounded in the same `reqwest::Client::builder()
//! .timeout(...)` shape as [`crate::providers::prometheus::PrometheusClient`];
//! speaks Loki's `query_range` HTTP API, the backend named in
//! `agent/providers/logs_provider.py`.

use crate::error::ProviderError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct LokiResponse {
    status: String,
    data: Option<LokiData>,
}

#[derive(Debug, Deserialize)]
struct LokiData {
    result: Vec<LokiStream>,
}

#[derive(Debug, Deserialize)]
struct LokiStream {
    stream: HashMap<String, String>,
    values: Vec<[String; 2]>,
}

pub struct LogsClient {
    base_url: String,
    http: Client,
}

impl LogsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().expect("reqwest client");
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http }
    }

    /// Run a LogQL query over `[start, end]` and return flattened log lines,
    /// newest first, each as `{"timestamp": ..., "message": ..., "labels": {...}}`.
    /// Caps at `limit` lines, mirroring the original's `logs_max_lines`
    /// guard against runaway payloads from noisy selectors.
    pub async fn query_range(
        &self,
        logql: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let url = format!("{}/loki/api/v1/query_range", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("query", logql.to_string()),
                ("start", (start.timestamp_nanos_opt().unwrap_or_default()).to_string()),
                ("end", (end.timestamp_nanos_opt().unwrap_or_default()).to_string()),
                ("limit", limit.to_string()),
                ("direction", "backward".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status: status.as_u16(), message: body });
        }
        let parsed: LokiResponse = resp.json().await.map_err(ProviderError::Http)?;
        if parsed.status != "success" {
            return Err(ProviderError::Parse("loki query did not return success".to_string()));
        }

        let mut lines = Vec::new();
        for stream in parsed.data.map(|d| d.result).unwrap_or_default() {
            let labels: HashMap<String, Value> =
                stream.stream.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            for [ts, message] in stream.values {
                let mut entry = HashMap::new();
                entry.insert("timestamp".to_string(), Value::String(ts));
                entry.insert("message".to_string(), Value::String(message));
                entry.insert("labels".to_string(), serde_json::to_value(&labels).unwrap_or_default());
                lines.push(entry);
            }
        }
        lines.truncate(limit);
        Ok(lines)
    }

    /// Build the standard pod-scoped LogQL selector this agent queries with,
    /// mirroring `_build_logql()` in `agent/providers/logs_provider.py`.
    pub fn pod_selector(namespace: &str, pod: &str, container: Option<&str>) -> String {
        match container {
            Some(c) => format!(r#"{{namespace="{namespace}",pod="{pod}",container="{c}"}}"#),
            None => format!(r#"{{namespace="{namespace}",pod="{pod}"}}"#),
        }
    }
}
