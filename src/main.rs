use clap::Parser;
use std::process;
use std::sync::Arc;
use tarka_agent::cli::{Cli, Commands, OutputFormat};
use tarka_agent::config::{self, Config};
use tarka_agent::domain::alert::AlertInstance;
use tarka_agent::dump::investigation_to_json;
use tarka_agent::pipeline::evidence::ProviderBundle;
use tarka_agent::providers::alertmanager::AlertmanagerClient;
use tarka_agent::providers::aws::AwsProvider;
use tarka_agent::providers::github::GitHubClient;
use tarka_agent::providers::kubernetes::KubernetesProvider;
use tarka_agent::providers::logs::LogsClient;
use tarka_agent::providers::object_store::ObjectStore;
use tarka_agent::providers::prometheus::PrometheusClient;
use tarka_agent::providers::queue::QueueClient;
use tarka_agent::storage::CaseStore;
use tarka_agent::{AgentError, Result};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {suggestion}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let project_path = std::env::current_dir().ok();
    let config = config::load_config(project_path.as_deref())?;

    match cli.command {
        Commands::Investigate { path, dump_json } => run_investigate(&config, path, dump_json).await,
        Commands::ListAlerts { namespace, limit } => run_list_alerts(&config, namespace, limit).await,
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Worker { once } => run_worker_command(config, once).await,
        Commands::ConfigShow { format } => run_config_show(&config, format),
    }
}

/// Build the provider bundle from configuration. Every provider is
/// best-effort: a missing/unreachable Kubernetes cluster still lets the
/// investigation run against whichever other evidence sources are
/// configured (mirrors `ProviderBundle`'s `None`-means-unconfigured
/// contract, see `pipeline::evidence`).
async fn build_provider_bundle(config: &Config) -> ProviderBundle {
    let kubernetes = match KubernetesProvider::from_env().await {
        Ok(k8s) => Some(k8s),
        Err(e) => {
            warn!(error = %e, "kubernetes provider unavailable, k8s evidence will be skipped");
            None
        }
    };
    let prometheus = config.providers.prometheus_url.clone().map(PrometheusClient::new);
    let logs = config.providers.loki_url.clone().map(LogsClient::new);
    let aws = Some(AwsProvider::from_env(config.providers.aws_region.clone()).await);
    let github = Some(GitHubClient::new(config.providers.github_token.clone()));

    ProviderBundle { kubernetes, prometheus, logs, aws, github }
}

async fn build_object_store(config: &Config) -> Result<ObjectStore> {
    use tarka_agent::config::StorageBackend;
    match config.storage.backend {
        StorageBackend::Local => Ok(ObjectStore::local(config.storage.local_dir.clone())),
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .clone()
                .ok_or_else(|| AgentError::Config("storage.backend=s3 requires storage.s3_bucket".to_string()))?;
            let sdk_config = if let Some(region) = config.providers.aws_region.clone() {
                aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_config::Region::new(region))
                    .load()
                    .await
            } else {
                aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await
            };
            let client = aws_sdk_s3::Client::new(&sdk_config);
            Ok(ObjectStore::s3(client, bucket, config.storage.s3_prefix.clone()))
        }
    }
}

async fn run_investigate(config: &Config, path: std::path::PathBuf, dump_json: Option<tarka_agent::dump::DumpMode>) -> Result<()> {
    let raw = std::fs::read_to_string(&path)?;
    let mut alert: AlertInstance = serde_json::from_str(&raw).map_err(tarka_agent::error::PipelineError::Serde)?;
    tarka_agent::ingest::dedup::normalize_alert(&mut alert);

    let now = chrono::Utc::now();
    let window = tarka_agent::ingest::webhook::build_time_window("15m", &alert, 15, now);

    let providers = build_provider_bundle(config).await;
    let mut investigation = tarka_agent::pipeline::run_investigation(alert, window, &providers).await;

    match dump_json {
        Some(mode) => {
            let value = investigation_to_json(&investigation, mode);
            println!("{}", serde_json::to_string_pretty(&value).map_err(tarka_agent::error::PipelineError::Serde)?);
        }
        None => {
            let report = tarka_agent::pipeline::render_report(&mut investigation);
            println!("{report}");
        }
    }

    Ok(())
}

async fn run_list_alerts(config: &Config, namespace: Option<String>, limit: usize) -> Result<()> {
    let base_url = config
        .providers
        .alertmanager_url
        .clone()
        .unwrap_or_else(|| tarka_agent::providers::alertmanager::DEFAULT_ALERTMANAGER_URL.to_string());
    let client = AlertmanagerClient::new(base_url);
    let mut alerts = client.fetch_active_alerts(None, None).await?;

    if let Some(namespace) = namespace.as_deref() {
        alerts.retain(|a| a.label("namespace") == Some(namespace));
    }
    alerts.truncate(limit);

    if alerts.is_empty() {
        println!("No active alerts.");
        return Ok(());
    }

    println!("{:<36} {:<30} {:<10} {:<20}", "FINGERPRINT", "ALERTNAME", "SEVERITY", "NAMESPACE");
    for alert in &alerts {
        println!(
            "{:<36} {:<30} {:<10} {:<20}",
            alert.fingerprint,
            alert.alertname().unwrap_or("-"),
            alert.label("severity").unwrap_or("-"),
            alert.label("namespace").unwrap_or("-"),
        );
    }

    Ok(())
}

async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let providers = Arc::new(build_provider_bundle(&config).await);
    let object_store = build_object_store(&config).await?;
    let case_store = Arc::new(CaseStore::new(object_store));
    let queue = Arc::new(QueueClient::connect(config.queue.clone()).await.map_err(AgentError::Provider)?);
    queue.ensure_stream().await.map_err(AgentError::Provider)?;

    info!("starting webhook server");
    tarka_agent::ingest::run_server(config, providers, case_store, queue, host, port).await
}

async fn run_worker_command(config: Config, once: bool) -> Result<()> {
    let providers = Arc::new(build_provider_bundle(&config).await);
    let object_store = build_object_store(&config).await?;
    let case_store = Arc::new(CaseStore::new(object_store));
    let queue = Arc::new(QueueClient::connect(config.queue.clone()).await.map_err(AgentError::Provider)?);
    queue.ensure_stream().await.map_err(AgentError::Provider)?;

    info!(once, "starting worker");
    tarka_agent::worker::run_worker(&config, providers, case_store, queue, once).await
}

fn run_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::to_string_pretty(config).map_err(tarka_agent::error::PipelineError::Serde)?;
            println!("{value}");
        }
        OutputFormat::Table => {
            println!("server.host            = {}", config.server.host);
            println!("server.port            = {}", config.server.port);
            println!("providers.alertmanager  = {}", config.providers.alertmanager_url.as_deref().unwrap_or("-"));
            println!("providers.prometheus    = {}", config.providers.prometheus_url.as_deref().unwrap_or("-"));
            println!("providers.loki          = {}", config.providers.loki_url.as_deref().unwrap_or("-"));
            println!("providers.aws_region    = {}", config.providers.aws_region.as_deref().unwrap_or("-"));
            println!("queue.nats_url          = {}", config.queue.nats_url);
            println!("queue.stream            = {}", config.queue.stream);
            println!("queue.subject           = {}", config.queue.subject);
            println!("queue.durable           = {}", config.queue.durable);
            println!("queue.concurrency       = {}", config.queue.concurrency);
            println!("storage.backend         = {:?}", config.storage.backend);
            println!("storage.local_dir       = {}", config.storage.local_dir.display());
            println!("dedup.freshness_ttl_s   = {}", config.dedup.freshness_ttl_seconds);
        }
    }
    Ok(())
}
