//! # Tarka Agent
//!
//! An automated incident investigation agent for Kubernetes-centric production
//! environments. Tarka ingests Alertmanager webhooks, deduplicates and
//! freshness-gates them, runs a fixed-order deterministic investigation
//! pipeline (evidence collection, feature extraction, noise/change/capacity
//! analysis, diagnostics, scoring), and persists a rendered Markdown report
//! plus the full structured `Investigation` record.
//!
//! ## Layout
//!
//! - [`domain`] — the strict/permissive data model (`Investigation`, `Analysis`,
//!   evidence bags, scores and verdicts).
//! - [`providers`] — thin clients for the external systems the agent reads
//!   from (Kubernetes, Prometheus, logs, AWS, GitHub, Alertmanager) and
//!   writes to (object store, durable queue).
//! - [`ingest`] — webhook receiver, dedup-key derivation, freshness gating.
//! - [`worker`] — the durable-queue consumer loop (ack/nak/DLQ disposition).
//! - [`pipeline`] — the fixed-order investigation pipeline and its playbooks.
//! - [`features`] / [`analyzers`] — derived-feature extraction and the noise,
//!   change-correlation and capacity analyzers.
//! - [`diagnostics`] — the pluggable diagnostic module registry and the log
//!   pattern matcher.
//! - [`scoring`] — the deterministic scoring families and verdict builder.
//! - [`report`] — Markdown report rendering and log snippet selection.
//! - [`storage`] — dedup/case-key derivation and the object-store backends.
//! - [`dump`] — `--dump-json {analysis,investigation}` JSON rendering.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub mod providers;

pub mod ingest;
pub mod worker;

pub mod pipeline;
pub mod features;
pub mod analyzers;
pub mod diagnostics;
pub mod scoring;
pub mod enrich;
pub mod report;
pub mod storage;
pub mod placeholder;
pub mod image_pull;
pub mod dump;

pub use error::{AgentError, Result};

/// The current version of the agent, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
