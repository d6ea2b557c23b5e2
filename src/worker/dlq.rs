//! Dead-letter payload shapes. Ported from the DLQ contract in spec.md §6:
//! JSON with a `kind`, `delivery_count`, `max_deliver`, and either the raw
//! undecodable bytes (truncated) or the parsed job that ultimately failed.

use crate::ingest::webhook::AlertJob;
use serde::Serialize;

const MAX_RAW_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqKind {
    PoisonMessage,
    JobFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DlqPayload {
    pub kind: DlqKind,
    pub delivery_count: u64,
    pub max_deliver: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<AlertJob>,
}

impl DlqPayload {
    /// A message whose body could not be decoded as an [`AlertJob`] at all.
    /// The raw bytes are truncated to 4096 bytes and lossily decoded so the
    /// DLQ entry is still inspectable even for binary garbage.
    pub fn poison(raw_bytes: &[u8], delivery_count: u64, max_deliver: i64) -> Self {
        let truncated = &raw_bytes[..raw_bytes.len().min(MAX_RAW_BYTES)];
        Self {
            kind: DlqKind::PoisonMessage,
            delivery_count,
            max_deliver,
            raw: Some(String::from_utf8_lossy(truncated).into_owned()),
            job: None,
        }
    }

    /// A message that decoded fine but whose investigation kept failing
    /// past `max_deliver` attempts.
    pub fn job_failed(job: AlertJob, delivery_count: u64, max_deliver: i64) -> Self {
        Self { kind: DlqKind::JobFailed, delivery_count, max_deliver, raw: None, job: Some(job) }
    }
}
