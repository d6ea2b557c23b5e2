//! The fixed-order deterministic investigation pipeline. Ported from
//! `agent/pipeline/runner.py`'s `run_investigation()`: every stage below
//! runs in the same order for every alert, writing its output onto
//! `Investigation.analysis` before the next stage reads it. No stage is
//! ever skipped based on a prior stage's *verdict* — only on whether the
//! evidence it needs is actually available (e.g. change-correlation is
//! skipped without a K8s identity), so a blocked triage decision never
//! hides a later stage's diagnostics.

pub mod evidence;
pub mod family;
pub mod families;
pub mod job_metrics;
pub mod target;
pub mod verdict;

use crate::diagnostics::DiagnosticRegistry;
use crate::domain::alert::{AlertInstance, TimeWindow};
use crate::domain::investigation::Investigation;
use evidence::ProviderBundle;

/// Run the full pipeline against a freshly constructed investigation and
/// return it once every stage has completed. Errors from individual
/// collectors/analyzers are recorded on `investigation.errors` rather than
/// aborting the run — see [`evidence::collect`] and [`Self`]'s per-stage
/// comments for which stages are best-effort.
pub async fn run_investigation(alert: AlertInstance, time_window: TimeWindow, providers: &ProviderBundle) -> Investigation {
    let mut investigation = Investigation::new(alert, time_window);

    investigation.target = target::parse_target(&investigation.alert);
    let detected = families::detect_family(&investigation.alert.labels, investigation.target.playbook.as_deref());
    family::set_canonical_family(&mut investigation, &detected, "families::detect_family");

    evidence::collect(&mut investigation, providers).await;

    if investigation.target.has_k8s_identity() {
        if let Some(k8s) = &providers.kubernetes {
            match crate::analyzers::changes::analyze(&investigation, k8s).await {
                Ok(change) => investigation.analysis.change = Some(change),
                Err(e) => investigation.push_error(format!("analyzers::changes: {e}")),
            }
        }
    }

    let features = crate::features::compute_features(&investigation);
    investigation.analysis.features = Some(features);

    let prometheus_shape = if let Some(prom) = &providers.prometheus {
        let alertname = investigation.alert.alertname().unwrap_or("").to_string();
        Some(crate::analyzers::noise::collect_prometheus_shape(prom, &alertname).await)
    } else {
        None
    };
    investigation.analysis.noise = Some(crate::analyzers::noise::analyze(&investigation, prometheus_shape));

    if let Some(prom) = &providers.prometheus {
        crate::analyzers::capacity::analyze_capacity(&mut investigation, prom).await;
    }

    if family::get_family(&investigation, "") == "job_failed" {
        let metrics = job_metrics::compute(&investigation);
        if let Some(features) = investigation.analysis.features.as_mut() {
            features.job_metrics = Some(metrics);
        }
    }

    investigation.analysis.decision = Some(verdict::build_base_decision(&investigation));
    investigation.analysis.enrichment = crate::enrich::build_family_enrichment(&investigation);

    let registry = DiagnosticRegistry::with_defaults();
    investigation.analysis.hypotheses = registry.run(&investigation);

    let features = investigation
        .analysis
        .features
        .clone()
        .unwrap_or_else(|| crate::features::compute_features(&investigation));
    let (scores, verdict) = crate::scoring::score_investigation(&mut investigation, &features);
    investigation.analysis.scores = Some(scores);
    investigation.analysis.verdict = Some(verdict);

    investigation
}

/// Render the Markdown report for an already-investigated
/// [`Investigation`]. Split out from [`run_investigation`] so the worker
/// and CLI can persist the structured record and the report independently
/// (the worker writes both; `tarka-agent investigate --dump-json` skips the
/// report entirely).
pub fn render_report(investigation: &mut Investigation) -> String {
    crate::report::render_deterministic_report(investigation, None)
}
