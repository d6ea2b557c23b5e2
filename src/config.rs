//! Agent configuration.
//!
//! Configuration is layered the way the teacher's `config` module layers it
//! — an optional TOML file (local project file first, then a global one) —
//! but every field also has an environment-variable override, following the
//! `NATS_URL` / `JETSTREAM_*` / `WORKER_*` env-driven convention the queue
//! worker this was distilled from uses. `.env` files are loaded via
//! `dotenvy` before env vars are read, so local development needs no shell
//! exports.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".tarka.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub alertmanager_url: Option<String>,
    pub prometheus_url: Option<String>,
    pub loki_url: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub github_token: Option<String>,
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub nats_url: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
    pub dlq_subject: String,
    pub ack_wait_seconds: u64,
    pub max_deliver: i64,
    pub backoff_seconds: Vec<u64>,
    pub duplicate_window_seconds: u64,
    pub concurrency: usize,
    pub fetch_batch: usize,
    pub fetch_timeout_seconds: u64,
    pub in_progress_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://127.0.0.1:4222".to_string(),
            stream: "TARKA_ALERTS".to_string(),
            subject: "tarka.alerts".to_string(),
            durable: "tarka-worker".to_string(),
            dlq_subject: "tarka.alerts.dlq".to_string(),
            ack_wait_seconds: 120,
            max_deliver: 5,
            backoff_seconds: vec![5, 15, 60, 300],
            duplicate_window_seconds: 120,
            concurrency: 4,
            fetch_batch: 10,
            fetch_timeout_seconds: 5,
            in_progress_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_dir: PathBuf,
    pub s3_bucket: Option<String>,
    pub s3_prefix: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_dir: PathBuf::from("./data/investigations"),
            s3_bucket: None,
            s3_prefix: "investigations/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub freshness_ttl_seconds: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { freshness_ttl_seconds: 600 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            queue: QueueConfig::default(),
            storage: StorageConfig::default(),
            dedup: DedupConfig::default(),
        }
    }
}

fn local_config_path(project_path: &Path) -> PathBuf {
    project_path.join(CONFIG_FILE_NAME)
}

fn global_config_path() -> Option<PathBuf> {
    dirs_next_home().map(|h| h.join(CONFIG_FILE_NAME))
}

fn dirs_next_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Load configuration from a TOML file (local project config first, then the
/// user's global config), then apply environment overrides. A missing file
/// is not an error — defaults apply.
pub fn load_config(project_path: Option<&Path>) -> Result<Config> {
    let _ = dotenvy::dotenv();

    let mut config = read_toml_config(project_path).unwrap_or_default();
    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_toml_config(project_path: Option<&Path>) -> Option<Config> {
    if let Some(path) = project_path {
        let local = local_config_path(path);
        if let Ok(content) = std::fs::read_to_string(&local) {
            if let Ok(config) = toml::from_str(&content) {
                return Some(config);
            }
        }
    }
    if let Some(global) = global_config_path() {
        if let Ok(content) = std::fs::read_to_string(&global) {
            if let Ok(config) = toml::from_str(&content) {
                return Some(config);
            }
        }
    }
    None
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("TARKA_HOST") {
        config.server.host = v;
    }
    if let Ok(v) = std::env::var("TARKA_PORT").and_then(|v| v.parse().map_err(|_| std::env::VarError::NotPresent)) {
        config.server.port = v;
    }
    if let Ok(v) = std::env::var("ALERTMANAGER_URL") {
        config.providers.alertmanager_url = Some(v);
    }
    if let Ok(v) = std::env::var("PROMETHEUS_URL") {
        config.providers.prometheus_url = Some(v);
    }
    if let Ok(v) = std::env::var("LOKI_URL") {
        config.providers.loki_url = Some(v);
    }
    if let Ok(v) = std::env::var("KUBECONFIG") {
        config.providers.kubeconfig = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("GITHUB_TOKEN") {
        config.providers.github_token = Some(v);
    }
    if let Ok(v) = std::env::var("AWS_REGION") {
        config.providers.aws_region = Some(v);
    }
    if let Ok(v) = std::env::var("NATS_URL") {
        config.queue.nats_url = v;
    }
    if let Ok(v) = std::env::var("JETSTREAM_STREAM") {
        config.queue.stream = v;
    }
    if let Ok(v) = std::env::var("JETSTREAM_SUBJECT") {
        config.queue.subject = v;
    }
    if let Ok(v) = std::env::var("JETSTREAM_DURABLE") {
        config.queue.durable = v;
    }
    if let Ok(v) = env_u64("JETSTREAM_ACK_WAIT_SECONDS") {
        config.queue.ack_wait_seconds = v;
    }
    if let Ok(v) = env_i64("JETSTREAM_MAX_DELIVER") {
        config.queue.max_deliver = v;
    }
    if let Ok(v) = std::env::var("JETSTREAM_BACKOFF_SECONDS") {
        config.queue.backoff_seconds = v.split(',').filter_map(|s| s.trim().parse().ok()).collect();
    }
    if let Ok(v) = std::env::var("JETSTREAM_DLQ_SUBJECT") {
        config.queue.dlq_subject = v;
    }
    if let Ok(v) = env_u64("JETSTREAM_DUPLICATE_WINDOW_SECONDS") {
        config.queue.duplicate_window_seconds = v;
    }
    if let Ok(v) = std::env::var("WORKER_CONCURRENCY").and_then(parse_or_absent) {
        config.queue.concurrency = v;
    }
    if let Ok(v) = std::env::var("WORKER_FETCH_BATCH").and_then(parse_or_absent) {
        config.queue.fetch_batch = v;
    }
    if let Ok(v) = env_u64("WORKER_FETCH_TIMEOUT_SECONDS") {
        config.queue.fetch_timeout_seconds = v;
    }
    if let Ok(v) = env_u64("WORKER_IN_PROGRESS_SECONDS") {
        config.queue.in_progress_seconds = v;
    }
    if let Ok(v) = std::env::var("TARKA_STORAGE_BACKEND") {
        config.storage.backend = match v.as_str() {
            "s3" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };
    }
    if let Ok(v) = std::env::var("TARKA_STORAGE_LOCAL_DIR") {
        config.storage.local_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("TARKA_S3_BUCKET") {
        config.storage.s3_bucket = Some(v);
    }
    if let Ok(v) = env_u64("TARKA_FRESHNESS_TTL_SECONDS") {
        config.dedup.freshness_ttl_seconds = v;
    }
}

fn parse_or_absent<T: std::str::FromStr>(v: String) -> std::result::Result<T, std::env::VarError> {
    v.parse().map_err(|_| std::env::VarError::NotPresent)
}

fn env_u64(key: &str) -> std::result::Result<u64, std::env::VarError> {
    std::env::var(key).and_then(parse_or_absent)
}

fn env_i64(key: &str) -> std::result::Result<i64, std::env::VarError> {
    std::env::var(key).and_then(parse_or_absent)
}

/// Save configuration to the user's global config file.
pub fn save_global_config(config: &Config) -> Result<()> {
    if let Some(path) = global_config_path() {
        let content = toml::to_string_pretty(config)
            .map_err(|e| AgentError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
    }
    Ok(())
}
