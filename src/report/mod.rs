//! Deterministic Markdown report renderer (concise + appendix). Ported from
//! `agent/report_deterministic.py`.
//!
//! The concise section depends only on already-computed
//! `investigation.analysis.{features,scores,verdict}`; the appendix renders
//! raw evidence for on-call debugging, still with deterministic formatting.

pub mod logs_select;

use crate::domain::investigation::Investigation;
use crate::enrich::build_family_enrichment;
use crate::features::compute_features;
use crate::pipeline::verdict::build_base_decision;
use crate::scoring::score_investigation;
use chrono::{DateTime, Utc};

/// Check whether a next-step string looks like a shell command or PromQL
/// query that should be rendered as a fenced code block rather than prose.
fn is_command_line(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() || t.starts_with("```") {
        return false;
    }
    const PREFIXES: &[&str] =
        &["kubectl", "aws", "gcloud", "curl", "docker", "helm", "git", "python", "pip", "npm", "yarn"];
    if PREFIXES.iter().any(|p| t.starts_with(p)) {
        return true;
    }
    const PROM_HINTS: &[&str] = &["ALERTS{", "kube_", "rate(", "sum(", "increase(", "count("];
    if PROM_HINTS.iter().any(|p| t.contains(p)) && t.contains('{') && (t.contains('=') || t.contains('}')) {
        return true;
    }
    false
}

/// Render a list of next steps with smart code-block detection: multi-line
/// fenced blocks pass through untouched, command/PromQL lines become fenced
/// bash blocks, everything else becomes a bullet.
fn render_next_steps(steps: &[String], lines: &mut Vec<String>) {
    let mut i = 0;
    while i < steps.len() {
        let step = &steps[i];
        if step.trim().starts_with("```") {
            let mut block = vec![step.clone()];
            i += 1;
            while i < steps.len() && !steps[i].trim().starts_with("```") {
                block.push(steps[i].clone());
                i += 1;
            }
            if i < steps.len() {
                block.push(steps[i].clone());
                i += 1;
            }
            lines.extend(block);
            continue;
        }
        if step.trim().is_empty() {
            lines.push(String::new());
            i += 1;
            continue;
        }
        if is_command_line(step) {
            lines.push(format!("```bash\n{step}\n```"));
            i += 1;
            continue;
        }
        lines.push(format!("- {step}"));
        i += 1;
    }
}

/// Format an on-call-next bullet for the enrichment section: descriptive
/// lead-ins pass through, `kubectl`/PromQL-shaped text gets backticked.
fn fmt_enrichment_next(s: &str) -> String {
    let txt = s.trim();
    if txt.is_empty() {
        return String::new();
    }
    const LEAD_INS: &[&str] = &["If ", "Note", "Interpretation", "Check ", "Follow ", "Otherwise"];
    if LEAD_INS.iter().any(|p| txt.starts_with(p)) {
        return txt.to_string();
    }
    if txt.starts_with("kubectl ") {
        return format!("`{txt}`");
    }
    const FNS: &[&str] =
        &["rate(", "sum(", "avg(", "max(", "min(", "histogram_quantile(", "quantile_over_time("];
    const HINTS: &[&str] = &["ALERTS{", "kube_", "up{", "count(", "topk(", "increase("];
    if HINTS.iter().any(|h| txt.contains(h)) || (txt.contains('{') && txt.contains('}')) || FNS.iter().any(|f| txt.contains(f))
    {
        return format!("`{txt}`");
    }
    txt.to_string()
}

/// Render the full Markdown incident report for `investigation`, computing
/// any missing `analysis.{features,decision,enrichment,scores,verdict}`
/// fields first so the report is never invoked against a half-run pipeline.
pub fn render_deterministic_report(investigation: &mut Investigation, generated_at: Option<DateTime<Utc>>) -> String {
    let ts = generated_at.unwrap_or_else(Utc::now);

    let alertname = investigation.alert.alertname().map(str::to_string);
    let severity = investigation.alert.label("severity").map(str::to_string).unwrap_or_else(|| "unknown".to_string());

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# Incident Report: {}", alertname.as_deref().unwrap_or("Unknown")));
    lines.push(String::new());
    lines.push(format!("**Alert:** `{}`", alertname.as_deref().unwrap_or("Unknown")));
    lines.push(format!("**Severity:** `{severity}`"));
    lines.push(format!("**Target type:** `{:?}`", investigation.target.target_type).to_ascii_lowercase_first());
    if let Some(env) = &investigation.target.environment {
        lines.push(format!("**Environment:** `{env}`"));
    }
    use crate::domain::target::TargetType;
    match investigation.target.target_type {
        TargetType::Pod => {
            lines.push(format!("**Namespace:** `{}`", investigation.target.namespace.as_deref().unwrap_or("Unknown")));
            lines.push(format!("**Pod:** `{}`", investigation.target.pod.as_deref().unwrap_or("Unknown")));
            if let Some(c) = &investigation.target.container {
                lines.push(format!("**Container:** `{c}`"));
            }
            let labels = &investigation.alert.labels;
            let job = labels.get("job").and_then(|v| v.as_str());
            let svc = labels.get("service").and_then(|v| v.as_str());
            let inst = labels.get("instance").and_then(|v| v.as_str());
            let scrape_container = labels.get("container").and_then(|v| v.as_str());
            let mut parts = Vec::new();
            if let Some(j) = job {
                parts.push(format!("job={j}"));
            }
            if let Some(s) = svc {
                parts.push(format!("service={s}"));
            }
            if let Some(i) = inst {
                parts.push(format!("instance={i}"));
            }
            if let Some(sc) = scrape_container {
                if investigation.target.container.as_deref() != Some(sc) {
                    parts.push(format!("scrape_container={sc}"));
                }
            }
            if !parts.is_empty() {
                lines.push(format!("**Metric source (scrape metadata):** `{}`", parts.join(", ")));
            }
        }
        TargetType::Service => {
            lines.push(format!("**Namespace:** `{}`", investigation.target.namespace.as_deref().unwrap_or("Unknown")));
            lines.push(format!("**Service:** `{}`", investigation.target.service.as_deref().unwrap_or("Unknown")));
        }
        TargetType::Node => {
            lines.push(format!("**Instance:** `{}`", investigation.target.instance.as_deref().unwrap_or("Unknown")));
        }
        TargetType::Cluster => {
            lines.push(format!("**Cluster:** `{}`", investigation.target.cluster.as_deref().unwrap_or("Unknown")));
        }
        _ => {
            lines.push(format!("**Namespace:** `{}`", investigation.target.namespace.as_deref().unwrap_or("Unknown")));
            lines.push(format!("**Pod:** `{}`", investigation.target.pod.as_deref().unwrap_or("Unknown")));
        }
    }
    lines.push(format!("**Time Window:** `{}`", investigation.time_window.window));
    if let Some(state) = investigation.alert.normalized_state {
        lines.push(format!("**Alert state:** `{state:?}`").to_ascii_lowercase_first());
    }
    if let Some(starts) = &investigation.alert.starts_at {
        lines.push(format!("**Alert starts_at:** `{starts}`"));
    }
    lines.push(format!("**Generated:** {}", ts.format("%Y-%m-%d %H:%M:%S")));
    lines.push(String::new());

    if investigation.analysis.features.is_none() {
        let f = compute_features(investigation);
        investigation.analysis.features = Some(f);
    }
    if investigation.analysis.decision.is_none() {
        investigation.analysis.decision = Some(build_base_decision(investigation));
    }
    if investigation.analysis.enrichment.is_none() {
        investigation.analysis.enrichment = build_family_enrichment(investigation);
    }
    if investigation.analysis.scores.is_none() || investigation.analysis.verdict.is_none() {
        let features = investigation.analysis.features.clone().expect("just computed");
        let (scores, verdict) = score_investigation(investigation, &features);
        investigation.analysis.scores = Some(scores);
        investigation.analysis.verdict = Some(verdict);
    }

    let features = investigation.analysis.features.clone().unwrap();
    let scores = investigation.analysis.scores.clone().unwrap();
    let verdict = investigation.analysis.verdict.clone().unwrap();
    let decision = investigation.analysis.decision.clone();
    let enrichment = investigation.analysis.enrichment.clone();

    if let Some(decision) = &decision {
        lines.push("## Triage".to_string());
        lines.push(String::new());
        lines.push(format!("**Summary:** {}", decision.label.as_deref().unwrap_or("n/a")));
        if !decision.why.is_empty() {
            lines.push(String::new());
            lines.push("### Why".to_string());
            lines.push(String::new());
            for w in decision.why.iter().take(10) {
                lines.push(format!("- {w}"));
            }
        }
        if !decision.next.is_empty() {
            lines.push(String::new());
            lines.push("### To unblock".to_string());
            lines.push(String::new());
            let capped: Vec<String> = decision.next.iter().take(7).cloned().collect();
            render_next_steps(&capped, &mut lines);
        }
        lines.push(String::new());
    }

    if let Some(enrichment) = &enrichment {
        lines.push("## Enrichment".to_string());
        lines.push(String::new());
        lines.push(format!("**Summary:** {}", enrichment.label.as_deref().unwrap_or("n/a")));
        if !enrichment.why.is_empty() {
            lines.push(String::new());
            lines.push("### Why".to_string());
            lines.push(String::new());
            for w in enrichment.why.iter().take(10) {
                lines.push(format!("- {w}"));
            }
        }
        if !enrichment.next.is_empty() {
            lines.push(String::new());
            lines.push("### On-call next".to_string());
            lines.push(String::new());
            for s in enrichment.next.iter().take(7) {
                let item = fmt_enrichment_next(s);
                if !item.is_empty() {
                    lines.push(format!("- {item}"));
                }
            }
        }
        lines.push(String::new());
    }

    let hyps = investigation.analysis.hypotheses.clone();
    if !hyps.is_empty() {
        lines.push("## Likely causes (ranked)".to_string());
        lines.push(String::new());
        for h in hyps.iter().take(3) {
            lines.push(format!("### {} ({}/100)", h.title, h.confidence_0_100));
            if !h.why.is_empty() {
                lines.push(String::new());
                for w in h.why.iter().take(6) {
                    lines.push(format!("- {w}"));
                }
            }
            if !h.next_tests.is_empty() {
                lines.push(String::new());
                lines.push("**Next tests:**".to_string());
                lines.push(String::new());
                render_next_steps(&h.next_tests, &mut lines);
            }
            // Action proposals are policy-gated elsewhere; render whatever
            // made it onto the hypothesis (approval still required before
            // anything here is executed — see domain::analysis::ActionProposal).
            if !h.proposed_actions.is_empty() {
                lines.push(String::new());
                lines.push("**Suggested actions (approval required):**".to_string());
                lines.push(String::new());
                for a in h.proposed_actions.iter().take(3) {
                    let risk = a.risk.as_deref().map(|r| format!(" (risk: {r})")).unwrap_or_default();
                    lines.push(format!("- {}{}", a.title, risk));
                    for p in a.preconditions.iter().take(2) {
                        if !p.trim().is_empty() {
                            lines.push(format!("  - {p}"));
                        }
                    }
                }
            }
            lines.push(String::new());
        }
    }

    // Memory/skill-matching section intentionally omitted: out of scope
    // for the deterministic core (spec.md Non-goals).

    lines.push("## Verdict".to_string());
    lines.push(String::new());
    lines.push(format!("**Classification:** `{:?}`", verdict.classification).to_ascii_lowercase_first());
    lines.push(format!("**Primary driver:** `{}`", verdict.primary_driver));
    lines.push(String::new());
    lines.push(verdict.one_liner.clone());
    if let Some(age_h) = features.quality.alert_age_hours {
        let age_txt = if age_h >= 24.0 { format!("~{:.1}d", age_h / 24.0) } else { format!("~{age_h:.1}h") };
        if features.quality.is_long_running == Some(true) {
            lines.push(format!("- **Alert age:** {age_txt} (**long-running**)"));
        } else {
            lines.push(format!("- **Alert age:** {age_txt}"));
        }
    }
    lines.push(String::new());

    lines.push("## Scores".to_string());
    lines.push(String::new());
    lines.push(format!("- **Impact:** {}/100", scores.impact_score));
    lines.push(format!("- **Confidence:** {}/100", scores.confidence_score));
    lines.push(format!("- **Noise:** {}/100", scores.noise_score));
    lines.push(String::new());

    if !scores.reason_codes.is_empty() {
        lines.push("## Reason codes".to_string());
        lines.push(String::new());
        for c in scores.reason_codes.iter().take(12) {
            lines.push(format!("- `{c}`"));
        }
        lines.push(String::new());
    }

    if let Some(ni) = &investigation.analysis.noise {
        let flap_score = ni.flap.as_ref().map(|f| f.flap_score_0_100).unwrap_or(0);
        let missing = ni.missing_labels.as_ref().map(|m| m.missing.clone()).unwrap_or_default();
        let eph = ni.cardinality.as_ref().map(|c| c.ephemeral_labels_present.clone()).unwrap_or_default();

        if !missing.is_empty() || !eph.is_empty() || flap_score >= 40 {
            lines.push("## Noise insights".to_string());
            lines.push(String::new());
            if flap_score != 0 {
                let lookback = ni.flap.as_ref().map(|f| f.lookback.as_str()).unwrap_or("n/a");
                lines.push(format!("- **Flap score (0-100):** {flap_score} (lookback={lookback})"));
            }
            if !eph.is_empty() {
                lines.push(format!("- **High-cardinality labels present:** {}", eph.join(", ")));
                if let Some(recommended) = ni.cardinality.as_ref().map(|c| &c.recommended_group_by) {
                    if !recommended.is_empty() {
                        lines.push(format!("- **Suggested Alertmanager group_by:** {}", recommended.join(", ")));
                    }
                }
            }
            if !missing.is_empty() {
                lines.push(format!("- **Missing critical labels:** {}", missing.join(", ")));
                let recs = ni.missing_labels.as_ref().map(|m| m.recommendation.clone()).unwrap_or_default();
                if let Some(first) = recs.first() {
                    lines.push(format!("- **Recommendation:** {first}"));
                    if let Some(second) = recs.get(1) {
                        lines.push(format!("- **Also:** {second}"));
                    }
                } else {
                    lines.push(
                        "- **Recommendation:** add missing labels in alert rules/relabeling so investigations can \
                         correlate evidence."
                            .to_string(),
                    );
                }
            }
            lines.push(String::new());
        }
    }

    if !verdict.next_steps.is_empty() {
        lines.push("## On-call next steps".to_string());
        lines.push(String::new());
        render_next_steps(&verdict.next_steps, &mut lines);
        lines.push(String::new());
    }

    if let Some(rca) = &investigation.analysis.rca {
        lines.push("## Root cause analysis (RCA)".to_string());
        lines.push(String::new());
        lines.push(format!("- **Status:** `{:?}`", rca.status).to_ascii_lowercase_first());
        if let Some(conf) = rca.confidence_0_1 {
            lines.push(format!("- **Confidence:** {conf:.2}"));
        }
        if let Some(summary) = &rca.summary {
            lines.push(format!("- **Summary:** {summary}"));
        }
        if let Some(root_cause) = &rca.root_cause {
            lines.push(format!("- **Root cause:** {root_cause}"));
        }
        if !rca.evidence.is_empty() {
            lines.push(String::new());
            lines.push("### Evidence cited".to_string());
            lines.push(String::new());
            for e in rca.evidence.iter().take(6).filter(|e| !e.trim().is_empty()) {
                lines.push(format!("- {e}"));
            }
        }
        if !rca.remediation.is_empty() {
            lines.push(String::new());
            lines.push("### Remediation".to_string());
            lines.push(String::new());
            for r in rca.remediation.iter().take(8).filter(|r| !r.trim().is_empty()) {
                lines.push(format!("- {r}"));
            }
        }
        if !rca.unknowns.is_empty() {
            lines.push(String::new());
            lines.push("### Unknowns / open questions".to_string());
            lines.push(String::new());
            for u in rca.unknowns.iter().take(6).filter(|u| !u.trim().is_empty()) {
                lines.push(format!("- {u}"));
            }
        }
        lines.push(String::new());
    }

    if let Some(llm) = &investigation.analysis.llm {
        lines.push("## LLM Insights".to_string());
        lines.push(String::new());
        lines.push(format!("- **Provider:** `{}`", llm.provider));
        lines.push(format!("- **Status:** `{:?}`", llm.status).to_ascii_lowercase_first());
        if let Some(model) = &llm.model {
            lines.push(format!("- **Model:** `{model}`"));
        }
        if let Some(error) = &llm.error {
            lines.push(format!("- **Error:** `{error}`"));
        }
        if let Some(output) = &llm.output {
            if let Some(summary) = output.get("summary").and_then(|v| v.as_str()) {
                lines.push(format!("- **Summary:** {summary}"));
            }
            if let Some(root_cause) = output.get("likely_root_cause").and_then(|v| v.as_str()) {
                lines.push(format!("- **Likely root cause:** {root_cause}"));
            }
        }
        lines.push(String::new());
    }

    lines.push("## Appendix: Evidence".to_string());
    lines.push(String::new());

    lines.push("### Derived features".to_string());
    lines.push(String::new());
    lines.push(format!("- **Family:** `{}`", features.family));
    lines.push(format!(
        "- **Evidence quality:** `{}`",
        features.quality.evidence_quality.map(|q| format!("{q:?}").to_ascii_lowercase()).unwrap_or_else(|| "unknown".to_string())
    ));
    if let Some(age) = features.quality.alert_age_hours {
        lines.push(format!("- **Alert age (hours):** {age:.1}"));
        if let Some(lr) = features.quality.is_long_running {
            lines.push(format!("- **is_long_running:** {lr}"));
        }
        if let Some(rs) = features.quality.is_recently_started {
            lines.push(format!("- **is_recently_started:** {rs}"));
        }
    }
    if let Some(avail) = features.quality.impact_signals_available {
        lines.push(format!("- **impact_signals_available:** {avail}"));
        if !features.quality.missing_impact_signals.is_empty() {
            lines.push(format!("- **missing_impact_signals:** {}", features.quality.missing_impact_signals.join(", ")));
        }
    }
    if !features.quality.missing_inputs.is_empty() {
        lines.push(format!("- **Missing inputs:** {}", features.quality.missing_inputs.join(", ")));
    }
    if !features.quality.contradiction_flags.is_empty() {
        lines.push(format!("- **Contradictions:** {}", features.quality.contradiction_flags.join(", ")));
    }
    lines.push(String::new());

    if let Some(debug) = &investigation.analysis.debug {
        if !debug.promql.is_empty() {
            lines.push("### Debug: PromQL".to_string());
            lines.push(String::new());
            let mut keys: Vec<&String> = debug.promql.keys().collect();
            keys.sort();
            for k in keys {
                lines.push(format!("- **{k}:**"));
                lines.push(String::new());
                lines.push("```".to_string());
                lines.push(debug.promql[k].clone());
                lines.push("```".to_string());
            }
            lines.push(String::new());
        }
    }

    if let Some(n) = &investigation.analysis.noise {
        lines.push("### Noise (structured)".to_string());
        lines.push(String::new());
        if let Some(flap) = &n.flap {
            lines.push(format!("- **flap.lookback:** `{}`", flap.lookback));
            lines.push(format!("- **flap.flaps_estimate:** {:?}", flap.flaps_estimate));
            lines.push(format!("- **flap.flap_score_0_100:** {}", flap.flap_score_0_100));
        }
        if let Some(card) = &n.cardinality {
            if !card.ephemeral_labels_present.is_empty() {
                lines.push(format!("- **cardinality.ephemeral_labels_present:** {}", card.ephemeral_labels_present.join(", ")));
            }
            if !card.recommended_group_by.is_empty() {
                lines.push(format!("- **cardinality.recommended_group_by:** {}", card.recommended_group_by.join(", ")));
            }
            if !card.recommended_drop_labels.is_empty() {
                lines.push(format!("- **cardinality.recommended_drop_labels:** {}", card.recommended_drop_labels.join(", ")));
            }
        }
        if let Some(ml) = &n.missing_labels {
            if !ml.missing.is_empty() {
                lines.push(format!("- **missing_labels.missing:** {}", ml.missing.join(", ")));
                if !ml.recommendation.is_empty() {
                    let joined = ml.recommendation.iter().take(3).cloned().collect::<Vec<_>>().join(" | ");
                    lines.push(format!("- **missing_labels.recommendation:** {joined}"));
                }
            }
        }
        lines.push(String::new());
    }

    if let Some(cap) = &investigation.analysis.capacity {
        if !cap.recommendations.is_empty() {
            lines.push("### Capacity / Rightsizing".to_string());
            lines.push(String::new());
            for r in cap.recommendations.iter().take(5) {
                lines.push(format!("- {r}"));
            }
            lines.push(String::new());
        }
    }

    lines.push("### Kubernetes".to_string());
    lines.push(String::new());
    if let Some(pi) = &investigation.evidence.k8s.pod_info {
        lines.push(format!("- **Phase:** {}", pi.get("phase").and_then(|v| v.as_str()).unwrap_or("")));
        lines.push(format!("- **Node:** {}", pi.get("node_name").and_then(|v| v.as_str()).unwrap_or("")));
    }
    let kf = &features.k8s;
    if kf.status_reason.is_some() || kf.status_message.is_some() {
        let bits: Vec<&str> =
            [kf.status_reason.as_deref(), kf.status_message.as_deref()].into_iter().flatten().collect();
        lines.push(format!("- **Pod status:** {}", bits.join(" - ")));
    }
    if !kf.not_ready_conditions.is_empty() {
        lines.push("- **Not-ready conditions:**".to_string());
        for c in kf.not_ready_conditions.iter().take(6) {
            let tail = c.reason.as_deref().map(|r| format!(" (reason={r})")).unwrap_or_default();
            lines.push(format!("  - {}={}{}", c.kind, c.status, tail));
        }
    }
    if !kf.container_waiting_reasons_top.is_empty() {
        lines.push("- **Container waiting:**".to_string());
        for w in kf.container_waiting_reasons_top.iter().take(3) {
            let msg = w.message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default();
            lines.push(format!("  - {}: {}{}", w.container, w.reason.as_deref().unwrap_or("waiting"), msg));
        }
    }
    if !kf.container_last_terminated_top.is_empty() {
        lines.push("- **Container last terminated:**".to_string());
        for t in kf.container_last_terminated_top.iter().take(3) {
            let mut bits = Vec::new();
            if let Some(r) = &t.reason {
                bits.push(r.clone());
            }
            if let Some(ec) = t.exit_code {
                bits.push(format!("exitCode={ec}"));
            }
            lines.push(format!("  - {}: {}", t.container, if bits.is_empty() { "terminated".to_string() } else { bits.join(", ") }));
        }
    }
    if !kf.recent_event_reasons_top.is_empty() {
        lines.push("- **Top events:**".to_string());
        for ev in kf.recent_event_reasons_top.iter().take(5) {
            let cnt = ev.count.map(|c| format!(" x{c}")).unwrap_or_default();
            let msg = ev.message.as_deref().map(|m| format!(": {m}")).unwrap_or_default();
            lines.push(format!("  - {}{} ({}){}", ev.reason.as_deref().unwrap_or("Event"), cnt, ev.kind.as_deref().unwrap_or("n/a"), msg));
        }
    }
    if !investigation.evidence.k8s.pod_conditions.is_empty() && kf.not_ready_conditions.is_empty() {
        lines.push("- **Conditions (non-True / scheduled):**".to_string());
        for c in investigation.evidence.k8s.pod_conditions.iter().take(10) {
            let t = c.get("type").and_then(|v| v.as_str());
            let s = c.get("status").and_then(|v| v.as_str());
            if t == Some("PodScheduled") || s.map(|s| s != "True").unwrap_or(false) {
                lines.push(format!(
                    "  - {}: status={}, reason={}",
                    t.unwrap_or(""),
                    s.unwrap_or(""),
                    c.get("reason").and_then(|v| v.as_str()).unwrap_or("")
                ));
            }
        }
    }
    lines.push(String::new());

    lines.push("### Metrics".to_string());
    lines.push(String::new());
    if let Some(v) = features.metrics.cpu_throttle_p95_pct {
        lines.push(format!("- **cpu_throttle_p95_pct:** {v:.2}"));
    }
    if let Some(v) = features.metrics.cpu_usage_p95_cores {
        lines.push(format!("- **cpu_usage_p95_cores:** {v:.3}"));
    }
    if let Some(v) = features.metrics.cpu_limit_cores {
        lines.push(format!("- **cpu_limit_cores:** {v:.3}"));
    }
    if let Some(v) = features.metrics.cpu_near_limit {
        lines.push(format!("- **cpu_near_limit:** {v}"));
    }
    if let Some(v) = features.k8s.restart_rate_5m_max {
        lines.push(format!("- **restart_rate_5m_max:** {v:.2}"));
    }
    lines.push(String::new());

    lines.push("### Logs".to_string());
    lines.push(String::new());
    lines.push(format!("- **Status:** `{}`", investigation.evidence.logs.logs_status.as_deref().unwrap_or("unknown")));
    if let Some(reason) = &investigation.evidence.logs.logs_reason {
        lines.push(format!("- **Reason:** `{reason}`"));
    }
    if let Some(backend) = &investigation.evidence.logs.logs_backend {
        lines.push(format!("- **Backend:** `{backend}`"));
    }
    if let Some(query) = &investigation.evidence.logs.logs_query {
        lines.push(format!("- **Selector:** `{query}`"));
    }
    if !investigation.evidence.logs.logs.is_empty() {
        lines.push(format!("- **Entries:** {}", investigation.evidence.logs.logs.len()));
        let snippet = logs_select::select_snippet_latest_error_with_context(&investigation.evidence.logs.logs, 12);
        if !snippet.is_empty() {
            lines.push(format!("- **Shown:** {} (prioritized errors; otherwise tail)", snippet.len()));
        } else {
            lines.push("- **Shown:** 0 (all collected lines looked like startup noise; try expanding the time window)".to_string());
        }
        lines.push(String::new());
        lines.push("```".to_string());
        for ln in &snippet {
            let s = ln.to_string();
            lines.push(s.chars().take(240).collect());
        }
        lines.push("```".to_string());
    }
    lines.push(String::new());

    let aws = &investigation.evidence.aws;
    if !aws.ec2_instances.is_empty()
        || !aws.ebs_volumes.is_empty()
        || !aws.elb_health.is_empty()
        || !aws.rds_instances.is_empty()
        || !aws.ecr_images.is_empty()
        || !aws.networking.is_empty()
    {
        lines.push("### AWS".to_string());
        lines.push(String::new());
        if let Some(region) = aws.metadata.as_ref().and_then(|m| m.get("region")).and_then(|v| v.as_str()) {
            lines.push(format!("- **Region:** `{region}`"));
        }
        if !aws.ec2_instances.is_empty() {
            lines.push(String::new());
            lines.push("**EC2 Instances:**".to_string());
            for (id, data) in &aws.ec2_instances {
                if let Some(obj) = data.as_object() {
                    if let Some(err) = obj.get("error").and_then(|v| v.as_str()) {
                        lines.push(format!("- [error] **{id}:** {err}"));
                        continue;
                    }
                    let state = obj.get("state").and_then(|v| v.as_str()).unwrap_or("unknown");
                    let sys = obj.get("system_status").and_then(|v| v.as_str()).unwrap_or("unknown");
                    let inst = obj.get("instance_status").and_then(|v| v.as_str()).unwrap_or("unknown");
                    lines.push(format!("- **{id}:** state={state}, system={sys}, instance={inst}"));
                    if let Some(events) = obj.get("scheduled_events").and_then(|v| v.as_array()) {
                        for e in events.iter().take(2) {
                            let code = e.get("code").and_then(|v| v.as_str()).unwrap_or("");
                            let not_before = e.get("not_before").and_then(|v| v.as_str()).unwrap_or("");
                            lines.push(format!("  - Scheduled: {code} at {not_before}"));
                        }
                    }
                }
            }
        }
        if !aws.ebs_volumes.is_empty() {
            lines.push(String::new());
            lines.push("**EBS Volumes:**".to_string());
            for (id, data) in &aws.ebs_volumes {
                if let Some(obj) = data.as_object() {
                    if let Some(err) = obj.get("error").and_then(|v| v.as_str()) {
                        lines.push(format!("- [error] **{id}:** {err}"));
                        continue;
                    }
                    let status = obj.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
                    let vtype = obj.get("volume_type").and_then(|v| v.as_str()).unwrap_or("unknown");
                    let iops = obj.get("iops").map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string());
                    lines.push(format!("- **{id}:** status={status}, type={vtype}, iops={iops}"));
                    if let Some(warns) = obj.get("performance_warnings").and_then(|v| v.as_array()) {
                        for w in warns.iter().take(2).filter_map(|v| v.as_str()) {
                            lines.push(format!("  - {w}"));
                        }
                    }
                }
            }
        }
        if !aws.elb_health.is_empty() {
            lines.push(String::new());
            lines.push("**Load Balancer Health:**".to_string());
            for (name, data) in &aws.elb_health {
                if let Some(obj) = data.as_object() {
                    if let Some(err) = obj.get("error").and_then(|v| v.as_str()) {
                        lines.push(format!("- [error] **{name}:** {err}"));
                        continue;
                    }
                    let targets = obj.get("targets").and_then(|v| v.as_array()).cloned().unwrap_or_default();
                    let healthy = targets.iter().filter(|t| t.get("health").and_then(|v| v.as_str()) == Some("healthy")).count();
                    lines.push(format!("- **{name}:** {healthy}/{} targets healthy", targets.len()));
                    for t in targets.iter().filter(|t| t.get("health").and_then(|v| v.as_str()) != Some("healthy")).take(3) {
                        let id = t.get("target_id").and_then(|v| v.as_str()).unwrap_or("unknown");
                        let reason = t.get("reason").and_then(|v| v.as_str()).unwrap_or("unknown");
                        lines.push(format!("  - {id}: {reason}"));
                    }
                }
            }
        }
        if !aws.rds_instances.is_empty() {
            lines.push(String::new());
            lines.push("**RDS Instances:**".to_string());
            for (id, data) in &aws.rds_instances {
                if let Some(obj) = data.as_object() {
                    if let Some(err) = obj.get("error").and_then(|v| v.as_str()) {
                        lines.push(format!("- [error] **{id}:** {err}"));
                        continue;
                    }
                    let status = obj.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
                    let engine = obj.get("engine").and_then(|v| v.as_str()).unwrap_or("unknown");
                    lines.push(format!("- **{id}:** status={status}, engine={engine}"));
                    if let Some(events) = obj.get("pending_maintenance").and_then(|v| v.as_array()) {
                        for e in events.iter().take(2) {
                            let action = e.get("action").and_then(|v| v.as_str()).unwrap_or("");
                            let date = e.get("date").and_then(|v| v.as_str()).unwrap_or("");
                            lines.push(format!("  - Maintenance: {action} at {date}"));
                        }
                    }
                }
            }
        }
        lines.push(String::new());
    }

    if let Some(grouped) = &aws.cloudtrail_grouped {
        lines.push("### CloudTrail / Infrastructure Changes".to_string());
        lines.push(String::new());
        let event_count = aws.cloudtrail_metadata.as_ref().and_then(|m| m.get("event_count")).and_then(|v| v.as_i64()).unwrap_or(0);
        lines.push(format!("**Query**: {event_count} management events in time window"));
        lines.push(String::new());

        const CATEGORY_ORDER: &[(&str, &str)] = &[
            ("security_group", "Security Group Changes"),
            ("auto_scaling", "Auto Scaling"),
            ("ec2_lifecycle", "EC2 Lifecycle"),
            ("iam_policy", "IAM Policy Changes"),
            ("storage", "Storage (EBS)"),
            ("database", "Database (RDS)"),
            ("networking", "Networking"),
            ("load_balancer", "Load Balancer"),
        ];
        for (category, label) in CATEGORY_ORDER {
            let Some(events) = grouped.get(*category) else { continue };
            lines.push(format!("**{label}** ({} events):", events.len()));
            for event in events.iter().take(5) {
                let name = event.get("EventName").and_then(|v| v.as_str()).unwrap_or("Unknown");
                let username = event.get("Username").and_then(|v| v.as_str()).unwrap_or("unknown");
                let time_str = event
                    .get("EventTime")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| {
                        let delta = ts.signed_duration_since(dt.with_timezone(&Utc));
                        if delta.num_seconds() < 3600 {
                            format!("{}m ago", delta.num_minutes())
                        } else {
                            format!("{}h ago", delta.num_hours())
                        }
                    })
                    .unwrap_or_else(|| "unknown".to_string());
                lines.push(format!("- **{name}** by {username} ({time_str})"));
            }
            if events.len() > 5 {
                lines.push(format!("  ... and {} more", events.len() - 5));
            }
            lines.push(String::new());
        }
    }

    let gh = &investigation.evidence.github;
    if let Some(repo) = &gh.repo {
        lines.push("### GitHub / Changes".to_string());
        lines.push(String::new());
        let discovery = gh.repo_discovery_method.as_deref().unwrap_or("unknown");
        let third_party = if gh.is_third_party { " (third-party)" } else { "" };
        lines.push(format!("**Repository:** `{repo}`{third_party} (discovered via: {discovery})"));
        lines.push(String::new());

        if !gh.recent_commits.is_empty() {
            lines.push("**Recent Commits** (time window before alert):".to_string());
            for commit in gh.recent_commits.iter().take(5) {
                let sha: String = commit.get("sha").and_then(|v| v.as_str()).unwrap_or("unknown").chars().take(7).collect();
                let author = commit.get("author").and_then(|v| v.as_str()).unwrap_or("unknown");
                let message: String = commit
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .lines()
                    .next()
                    .unwrap_or("")
                    .chars()
                    .take(80)
                    .collect();
                lines.push(format!("- `{sha}` by {author}: {message}"));
                if let Some(ts) = commit.get("timestamp").and_then(|v| v.as_str()) {
                    lines.push(format!("  - {ts}"));
                }
            }
            lines.push(String::new());
        }

        if !gh.workflow_runs.is_empty() {
            lines.push("**Recent Builds:**".to_string());
            for run in gh.workflow_runs.iter().take(5) {
                let name = run.get("workflow_name").and_then(|v| v.as_str()).unwrap_or("unknown");
                let conclusion = run.get("conclusion").and_then(|v| v.as_str()).unwrap_or("unknown");
                let status = run.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
                let id = run.get("id").map(|v| v.to_string()).unwrap_or_default();
                lines.push(format!("- Workflow `{name}` #{id}: {status}/{conclusion}"));
                if let Some(created) = run.get("created_at").and_then(|v| v.as_str()) {
                    lines.push(format!("  - {created}"));
                }
                if conclusion == "failure" {
                    if let Some(jobs) = run.get("jobs").and_then(|v| v.as_array()) {
                        for job in jobs.iter().filter(|j| j.get("conclusion").and_then(|v| v.as_str()) == Some("failure")).take(2) {
                            let job_name = job.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
                            lines.push(format!("  - Failed job: `{job_name}`"));
                        }
                    }
                }
            }
            lines.push(String::new());
        }

        if let Some(logs) = &gh.failed_workflow_logs {
            lines.push("**Failed Workflow Logs** (snippet):".to_string());
            lines.push("```".to_string());
            let log_lines: Vec<&str> = logs.lines().collect();
            for l in log_lines.iter().take(20) {
                lines.push(l.chars().take(240).collect());
            }
            if log_lines.len() > 20 {
                lines.push(format!("... ({} more lines)", log_lines.len() - 20));
            }
            lines.push("```".to_string());
            lines.push(String::new());
        }

        if gh.readme.is_some() || !gh.docs.is_empty() {
            lines.push("**Documentation:**".to_string());
            if gh.readme.is_some() {
                lines.push("- README.md available".to_string());
            }
            for doc in gh.docs.iter().take(3) {
                let path = doc.get("path").and_then(|v| v.as_str()).unwrap_or("unknown");
                lines.push(format!("- {path} available"));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Small helper so `format!("{:?}", enum_value)` (PascalCase Debug output)
/// reads like the lowercase wire values these enums serialize to.
trait LowerFirst {
    fn to_ascii_lowercase_first(self) -> String;
}

impl LowerFirst for String {
    fn to_ascii_lowercase_first(self) -> String {
        // Debug formatting only ever appears here inside a `` `{:?}` `` span
        // produced a few lines above; lowercase just that span.
        if let (Some(start), Some(end)) = (self.find('`'), self.rfind('`')) {
            if end > start {
                let mut out = self[..=start].to_string();
                out.push_str(&self[start + 1..end].to_ascii_lowercase());
                out.push_str(&self[end..]);
                return out;
            }
        }
        self
    }
}
