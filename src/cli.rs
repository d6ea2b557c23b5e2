use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tarka-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated incident investigation agent for Kubernetes")]
#[command(long_about = "Ingests Alertmanager webhooks, runs a deterministic investigation \
pipeline against Kubernetes/Prometheus/logs/AWS/GitHub evidence, and produces a scored, \
actionable Markdown report for each alert.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as newline-delimited JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single investigation against a webhook payload file or a raw alert fingerprint
    Investigate {
        /// Path to a JSON file containing one Alertmanager alert object
        #[arg(value_name = "ALERT_JSON_PATH")]
        path: PathBuf,

        /// Emit machine-readable JSON instead of a human narration: `analysis`
        /// for the compact, stable subset, `investigation` for the full record
        #[arg(long, value_enum)]
        dump_json: Option<crate::dump::DumpMode>,
    },

    /// List the currently active alerts known to Alertmanager
    ListAlerts {
        /// Only show alerts for this namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Maximum number of alerts to display
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Run the webhook HTTP server (Alertmanager receiver)
    Serve {
        /// Bind address override
        #[arg(long)]
        host: Option<String>,

        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the durable-queue worker loop that drains enqueued alert jobs
    Worker {
        /// Exit after draining the queue once instead of running forever
        #[arg(long)]
        once: bool,
    },

    /// Validate a local config file and print the resolved configuration
    ConfigShow {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    /// Initialize tracing based on verbosity level and the `--json-logs` flag.
    pub fn init_logging(&self) {
        crate::logging::init(self.verbose, self.json_logs);
    }
}
