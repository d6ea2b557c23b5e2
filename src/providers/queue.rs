//! Durable queue client: a thin wrapper over `async-nats`'s JetStream API.
//! Ported from `agent/queue/jetstream.py`. The publish side is used by
//! [`crate::ingest`]; the consume side by [`crate::worker`].

use crate::config::QueueConfig;
use crate::error::ProviderError;
use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};
use serde::Serialize;
use std::time::Duration;

pub struct QueueClient {
    jetstream: jetstream::Context,
    config: QueueConfig,
}

impl QueueClient {
    pub async fn connect(config: QueueConfig) -> Result<Self, ProviderError> {
        let client = async_nats::connect(&config.nats_url)
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;
        let jetstream = jetstream::new(client);
        Ok(Self { jetstream, config })
    }

    /// Ensure the configured stream exists, creating it if necessary. Called
    /// once at startup by both the webhook receiver and the worker.
    pub async fn ensure_stream(&self) -> Result<Stream, ProviderError> {
        let subjects = vec![self.config.subject.clone(), self.config.dlq_subject.clone()];
        self.jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: self.config.stream.clone(),
                subjects,
                duplicate_window: Duration::from_secs(self.config.duplicate_window_seconds),
                ..Default::default()
            })
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })
    }

    /// Publish `payload` with a Nats-Msg-Id equal to `dedup_key` so
    /// JetStream's duplicate window rejects a redelivery of the same alert
    /// job within `duplicate_window_seconds`.
    pub async fn publish<T: Serialize>(&self, payload: &T, dedup_key: &str) -> Result<(), ProviderError> {
        let body = serde_json::to_vec(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let headers = {
            let mut h = async_nats::HeaderMap::new();
            h.insert("Nats-Msg-Id", dedup_key);
            h
        };
        self.jetstream
            .publish_with_headers(self.config.subject.clone(), headers, body.into())
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;
        Ok(())
    }

    /// Publish a failed job to the dead-letter subject after `max_deliver`
    /// attempts are exhausted.
    pub async fn publish_dlq<T: Serialize>(&self, payload: &T) -> Result<(), ProviderError> {
        let body = serde_json::to_vec(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        self.jetstream
            .publish(self.config.dlq_subject.clone(), body.into())
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;
        Ok(())
    }

    /// Durable pull consumer bound to this queue's configured subject.
    pub async fn pull_consumer(&self) -> Result<PullConsumer, ProviderError> {
        let stream = self.ensure_stream().await?;
        stream
            .get_or_create_consumer(
                &self.config.durable,
                jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.durable.clone()),
                    ack_wait: Duration::from_secs(self.config.ack_wait_seconds),
                    max_deliver: self.config.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })
    }
}
