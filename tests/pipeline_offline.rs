//! Exercises the full deterministic investigation pipeline with every
//! provider unconfigured (`ProviderBundle::{None, ...}`), so the run never
//! touches the network — the pipeline's evidence-collection stage treats
//! an absent provider as "no evidence from that source" rather than an
//! error (see `pipeline::evidence::collect`).

use chrono::Utc;
use serde_json::json;
use tarka_agent::domain::alert::{AlertInstance, TimeWindow};
use tarka_agent::pipeline::evidence::ProviderBundle;
use tarka_agent::pipeline::{render_report, run_investigation};

fn offline_providers() -> ProviderBundle {
    ProviderBundle { kubernetes: None, prometheus: None, logs: None, aws: None, github: None }
}

fn crashloop_alert() -> AlertInstance {
    let raw = json!({
        "fingerprint": "offline-test-fingerprint",
        "state": "firing",
        "labels": {
            "alertname": "KubePodCrashLooping",
            "namespace": "payments",
            "pod": "payments-worker-0",
            "container": "worker",
            "severity": "critical",
        },
        "annotations": {},
        "starts_at": "2026-07-29T10:00:00Z",
    });
    serde_json::from_value(raw).expect("fixture alert must deserialize")
}

#[tokio::test]
async fn offline_run_produces_a_scored_verdict_and_report() {
    let mut alert = crashloop_alert();
    tarka_agent::ingest::dedup::normalize_alert(&mut alert);
    let now = Utc::now();
    let window = TimeWindow { window: "15m".to_string(), start_time: now, end_time: now };

    let mut investigation = run_investigation(alert, window, &offline_providers()).await;

    assert!(investigation.analysis.features.is_some(), "feature extraction must always run");
    assert!(investigation.analysis.decision.is_some(), "base triage decision must always run");
    assert!(investigation.analysis.scores.is_some(), "scoring must always run even with no evidence");
    assert!(investigation.analysis.verdict.is_some(), "verdict must always run even with no evidence");
    assert!(investigation.analysis.hypotheses.len() <= 10, "hypotheses must respect the top-10 cap");

    let report = render_report(&mut investigation);
    assert!(!report.is_empty(), "report rendering must never panic or produce empty output");
}

#[tokio::test]
async fn hypotheses_are_sorted_by_confidence_then_id() {
    let mut alert = crashloop_alert();
    tarka_agent::ingest::dedup::normalize_alert(&mut alert);
    let now = Utc::now();
    let window = TimeWindow { window: "15m".to_string(), start_time: now, end_time: now };

    let investigation = run_investigation(alert, window, &offline_providers()).await;

    let confidences: Vec<i32> = investigation.analysis.hypotheses.iter().map(|h| h.confidence_0_100).collect();
    let mut sorted = confidences.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(confidences, sorted, "hypotheses must already be ranked by descending confidence");
}
