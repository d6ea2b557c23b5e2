//! The durable-queue worker: an explicit-ack JetStream consumer loop with
//! per-message heartbeats and bounded concurrency. Ported from
//! `agent/api/worker_jetstream.py::run_worker_forever()`.

pub mod dlq;
pub mod jetstream;

use crate::config::Config;
use crate::ingest::webhook::build_time_window;
use crate::pipeline::evidence::ProviderBundle;
use crate::providers::queue::QueueClient;
use crate::storage::CaseStore;
use async_nats::jetstream::AckKind;
use dlq::DlqPayload;
use jetstream::{attempts_exhausted, decide_disposition, parse_job, Disposition};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info, warn};

/// Run the worker loop. When `once` is set, drain whatever is currently
/// available and return instead of looping forever — used by
/// `tarka-agent worker --once` and by tests.
pub async fn run_worker(
    config: &Config,
    providers: Arc<ProviderBundle>,
    case_store: Arc<CaseStore>,
    queue: Arc<QueueClient>,
    once: bool,
) -> crate::Result<()> {
    let consumer = queue.pull_consumer().await.map_err(crate::AgentError::Provider)?;
    let semaphore = Arc::new(Semaphore::new(config.queue.concurrency.max(1)));

    loop {
        let batch = consumer
            .fetch()
            .max_messages(config.queue.fetch_batch)
            .expires(Duration::from_secs(config.queue.fetch_timeout_seconds.max(1)))
            .messages()
            .await
            .map_err(|e| crate::AgentError::Worker(crate::error::WorkerError::Connect(e.to_string())))?;

        tokio::pin!(batch);
        let mut handled_any = false;
        use futures::StreamExt;
        while let Some(message) = batch.next().await {
            handled_any = true;
            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "failed to pull message");
                    continue;
                }
            };
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
            let config = config.clone();
            let providers = providers.clone();
            let case_store = case_store.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                handle_message(message, &config, &providers, &case_store, &queue).await;
                drop(permit);
            });
        }

        if once && !handled_any {
            break;
        }
        if once {
            break;
        }
    }

    Ok(())
}

/// Handle one delivered message end to end: decode, heartbeat, investigate,
/// disposition. Never propagates a panic as an unhandled error — the
/// caller's `tokio::spawn` boundary means a handler panic would otherwise
/// silently leak the in-flight permit and the message would eventually
/// redeliver anyway once `ack_wait` elapses, but we still nak explicitly
/// when we can.
async fn handle_message(
    message: async_nats::jetstream::Message,
    config: &Config,
    providers: &ProviderBundle,
    case_store: &CaseStore,
    queue: &QueueClient,
) {
    let delivery_count = message.info().map(|i| i.delivered).unwrap_or(1);
    let max_deliver = config.queue.max_deliver;

    let job = match parse_job(&message.payload) {
        Ok(job) => job,
        Err(e) => {
            warn!(error = %e, "poison message, publishing to DLQ");
            let payload = DlqPayload::poison(&message.payload, delivery_count, max_deliver);
            if let Err(e) = queue.publish_dlq(&payload).await {
                error!(error = %e, "failed to publish poison message to DLQ");
            }
            let _ = message.ack().await;
            return;
        }
    };

    let heartbeat_stop = Arc::new(Notify::new());
    let heartbeat_handle = spawn_heartbeat(message.clone(), config.queue.ack_wait_seconds, heartbeat_stop.clone());

    let window = build_time_window(&job.time_window, &job.alert, 15, job.received_at);
    let mut investigation = crate::pipeline::run_investigation(job.alert.clone(), window, providers).await;
    let report = crate::pipeline::render_report(&mut investigation);

    heartbeat_stop.notify_one();
    let _ = heartbeat_handle.await;

    let errors_in_stats = investigation.errors.len();
    let disposition = decide_disposition(errors_in_stats, delivery_count, max_deliver);

    let alertname = investigation.alert.alertname().unwrap_or("unknown").to_string();
    let key = crate::ingest::idempotency::resolve_dedup_key(&investigation.alert, &investigation.target, job.received_at);

    if let Err(e) = case_store.save(&investigation, &key, &report).await {
        error!(error = %e, %alertname, "failed to persist investigation");
    }

    match disposition {
        Disposition::Ack => {
            if attempts_exhausted(delivery_count, max_deliver) && errors_in_stats > 0 {
                let payload = DlqPayload::job_failed(job, delivery_count, max_deliver);
                if let Err(e) = queue.publish_dlq(&payload).await {
                    error!(error = %e, "failed to publish exhausted job to DLQ");
                }
            }
            if let Err(e) = message.ack().await {
                error!(error = %e, "failed to ack message");
            } else {
                info!(%alertname, %key, delivery_count, "investigation complete, acked");
            }
        }
        Disposition::Nak => {
            if let Err(e) = message.ack_with(AckKind::Nak(None)).await {
                error!(error = %e, "failed to nak message");
            } else {
                warn!(%alertname, %key, delivery_count, errors = errors_in_stats, "investigation had errors, nak'd for redelivery");
            }
        }
    }
}

/// Periodically sends an in-progress ack (`AckKind::Progress`) to reset the
/// consumer's redelivery timer while a long investigation runs, so
/// JetStream doesn't redeliver a message that's still being worked. Stops
/// as soon as `stop` is notified, on both success and failure paths
/// (spec.md §5: "heartbeat stops on both success and failure").
fn spawn_heartbeat(
    message: async_nats::jetstream::Message,
    ack_wait_seconds: u64,
    stop: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs((ack_wait_seconds / 3).max(1));
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if message.ack_with(AckKind::Progress).await.is_err() {
                        break;
                    }
                }
                _ = stop.notified() => break,
            }
        }
    })
}
