//! Pure helpers for the worker loop: job decoding and the ack/nak/DLQ
//! disposition decision. Split out from [`super`] so the decision table is
//! unit-testable without a running NATS server. Ported from
//! `agent/api/worker_jetstream.py`'s per-message handling.

use crate::ingest::webhook::AlertJob;

/// What the worker should do with a message once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Happy path, or delivery attempts exhausted and the failure was
    /// already mirrored to the DLQ — either way, stop redelivering.
    Ack,
    /// A transient failure with attempts remaining: redeliver later.
    Nak,
}

/// Decode a raw NATS message payload as an [`AlertJob`]. A `Err` here means
/// the message is poison and must go straight to the DLQ (spec.md §7,
/// error taxonomy class 1 — fatal input error).
pub fn parse_job(payload: &[u8]) -> Result<AlertJob, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Decide what to do with a successfully-decoded job after the
/// investigation ran. Mirrors spec.md §4.2 step 4:
/// - no errors recorded → ack
/// - errors recorded but attempts remain → nak (redeliver)
/// - errors recorded and this was the last allowed delivery → DLQ, then ack
///   (handled by the caller; this function only reports whether the
///   delivery count has been exhausted)
pub fn decide_disposition(errors_in_stats: usize, delivery_count: u64, max_deliver: i64) -> Disposition {
    if errors_in_stats == 0 {
        return Disposition::Ack;
    }
    if max_deliver > 0 && delivery_count >= max_deliver as u64 {
        // Caller publishes to DLQ before acking; from the redelivery
        // policy's point of view this message is done either way.
        return Disposition::Ack;
    }
    Disposition::Nak
}

/// Whether this delivery was the last one the consumer's `max_deliver`
/// policy allows — used to decide whether an exhausted-attempts message
/// needs a DLQ publish on top of the ack.
pub fn attempts_exhausted(delivery_count: u64, max_deliver: i64) -> bool {
    max_deliver > 0 && delivery_count >= max_deliver as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_errors_acks() {
        assert_eq!(decide_disposition(0, 1, 5), Disposition::Ack);
    }

    #[test]
    fn errors_with_attempts_remaining_naks() {
        assert_eq!(decide_disposition(1, 2, 5), Disposition::Nak);
    }

    #[test]
    fn errors_at_max_deliver_acks_after_dlq() {
        assert_eq!(decide_disposition(1, 5, 5), Disposition::Ack);
        assert!(attempts_exhausted(5, 5));
    }

    #[test]
    fn poison_payload_is_rejected() {
        assert!(parse_job(b"not json").is_err());
    }
}
