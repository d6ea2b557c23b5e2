//! Alertmanager webhook ingestion: state normalization, dedup-key
//! derivation, freshness gating, and durable-queue enqueue. Ported from
//! `agent/api/webhook.py` and `agent/storage/keys.py`.

pub mod dedup;
pub mod idempotency;
pub mod server;
pub mod webhook;

pub use server::run_server;
pub use webhook::{handle_webhook_payload, AlertJob, AlertmanagerWebhookPayload, WebhookStats};
