//! GitHub REST API client for repo/commit/workflow evidence. Grounded in the
//! same client shape as [`crate::providers::prometheus::PrometheusClient`],
//! adapted to GitHub's bearer-token + `Accept: application/vnd.github+json`
//! convention used throughout `agent/providers/github_provider.py`.

use crate::error::ProviderError;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub struct GitHubClient {
    http: Client,
    token: Option<String>,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("tarka-agent")
            .build()
            .expect("reqwest client");
        Self { http, token, base_url: "https://api.github.com".to_string() }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let req = self.http.get(&url).header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProviderError> {
        let resp = self.get(path).send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(ProviderError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status: status.as_u16(), message: body });
        }
        resp.json().await.map_err(ProviderError::Http)
    }

    /// Most recent commits on the repo's default branch.
    pub async fn recent_commits(&self, repo: &str, limit: usize) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let value = self.get_json(&format!("/repos/{repo}/commits?per_page={limit}")).await?;
        Ok(value.as_array().cloned().unwrap_or_default().into_iter().filter_map(as_map).collect())
    }

    /// Most recent workflow runs, any status.
    pub async fn workflow_runs(&self, repo: &str, limit: usize) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let value = self.get_json(&format!("/repos/{repo}/actions/runs?per_page={limit}")).await?;
        Ok(value
            .get("workflow_runs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(as_map)
            .collect())
    }

    /// Job log text for a failed workflow run, truncated server-side by
    /// GitHub's API; callers should further truncate before display.
    pub async fn failed_workflow_logs(&self, repo: &str, run_id: u64) -> Result<String, ProviderError> {
        let url = format!("{}/repos/{repo}/actions/runs/{run_id}/logs", self.base_url);
        let resp = self.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::NotFound(format!("logs for run {run_id}")));
        }
        Ok(resp.text().await.unwrap_or_default())
    }

    /// Repo README, rendered to plain text via the raw media type.
    pub async fn readme(&self, repo: &str) -> Result<String, ProviderError> {
        let url = format!("{}/repos/{repo}/readme", self.base_url);
        let resp = self.http.get(&url).header("Accept", "application/vnd.github.raw").send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::NotFound(format!("readme for {repo}")));
        }
        Ok(resp.text().await.unwrap_or_default())
    }
}

fn as_map(v: Value) -> Option<HashMap<String, Value>> {
    v.as_object().map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
