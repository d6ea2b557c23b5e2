//! Prometheus HTTP API client used for instant and range queries.
//!
//! Grounded in `PrometheusClient` from
//! `examples/syncable-dev-syncable-cli/src/analyzer/k8s_optimize/prometheus_client.rs`
//! (the `Client::builder().timeout(...)` + `PrometheusAuth` shape), adapted
//! from a history-fetching client into the instant/range query contract
//! `agent/providers/prom_provider.py` exposes to the noise/capacity
//! analyzers.

use crate::error::ProviderError;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub enum PrometheusAuth {
    #[default]
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    data: Option<PromData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromData {
    result: Vec<HashMap<String, Value>>,
}

pub struct PrometheusClient {
    base_url: String,
    http: Client,
    auth: PrometheusAuth,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_auth(base_url, PrometheusAuth::None)
    }

    pub fn with_auth(base_url: impl Into<String>, auth: PrometheusAuth) -> Self {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().expect("reqwest client");
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http, auth }
    }

    fn add_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            PrometheusAuth::None => req,
            PrometheusAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            PrometheusAuth::Bearer(token) => req.bearer_auth(token),
        }
    }

    /// `GET /api/v1/query` at a specific instant. Returns the raw `result`
    /// array so callers (noise/capacity analyzers, feature extractors) can
    /// apply their own metric-label filters.
    pub async fn query_instant(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let req = self.http.get(&url).query(&[("query", query), ("time", &at.timestamp().to_string())]);
        let resp = self.add_auth(req).send().await?;
        self.parse(resp).await
    }

    /// `GET /api/v1/query_range` for a window ending at `end`.
    pub async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_seconds: u64,
    ) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let req = self.http.get(&url).query(&[
            ("query", query.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("step", step_seconds.to_string()),
        ]);
        let resp = self.add_auth(req).send().await?;
        self.parse(resp).await
    }

    async fn parse(&self, resp: reqwest::Response) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status: status.as_u16(), message: body });
        }
        let parsed: PromResponse = resp.json().await.map_err(ProviderError::Http)?;
        if parsed.status != "success" {
            return Err(ProviderError::Parse(parsed.error.unwrap_or_else(|| "prometheus query failed".to_string())));
        }
        Ok(parsed.data.map(|d| d.result).unwrap_or_default())
    }

    /// Extract a single scalar from an instant-query result, mirroring
    /// `_prom_scalar()` in `agent/pipeline/noise.py`.
    pub fn scalar(result: &[HashMap<String, Value>]) -> Option<f64> {
        let first = result.first()?;
        let value = first.get("value")?.as_array()?;
        value.get(1)?.as_str()?.parse().ok()
    }
}
