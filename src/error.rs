//! Error types for the agent.
//!
//! Mirrors the per-concern `thiserror` enums used throughout the provider and
//! pipeline layers, composed into one top-level [`AgentError`] at the edges
//! (CLI, HTTP handlers, worker loop) via `#[from]`.

use thiserror::Error;

/// Errors surfaced by a provider (Kubernetes, Prometheus, logs, AWS, GitHub,
/// Alertmanager, object store, queue).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("upstream returned an error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("response could not be parsed: {0}")]
    Parse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("resource not found: {0}")]
    NotFound(String),
}

/// Errors raised while validating or normalizing an inbound alert job.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("alert is missing required label: {0}")]
    MissingLabel(&'static str),

    #[error("could not derive a dedup key for this alert")]
    NoDedupKey,

    #[error("object store error: {0}")]
    Store(#[from] ProviderError),
}

/// Errors raised while running the deterministic investigation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("provider error during evidence collection: {0}")]
    Provider(#[from] ProviderError),

    #[error("could not parse target reference: {0}")]
    InvalidTarget(String),

    #[error("report rendering failed: {0}")]
    Render(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised by the durable-queue worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue connection failed: {0}")]
    Connect(String),

    #[error("message could not be decoded: {0}")]
    Decode(String),

    #[error("pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Top-level error type returned from CLI commands and HTTP handlers.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// A short, user-facing suggestion for resolving this error, where one
    /// applies. Mirrors the `suggestion()` convention used by the platform
    /// API client this agent's HTTP providers are modeled on.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AgentError::Provider(ProviderError::NotConfigured(_)) => {
                Some("set the provider's environment variables and retry")
            }
            AgentError::Provider(ProviderError::Timeout(_)) => {
                Some("the upstream may be overloaded; check its health before retrying")
            }
            AgentError::Ingest(IngestError::NoDedupKey) => {
                Some("the alert is missing both a fingerprint and identifying labels")
            }
            _ => None,
        }
    }
}

/// Result type alias used across the agent.
pub type Result<T> = std::result::Result<T, AgentError>;
