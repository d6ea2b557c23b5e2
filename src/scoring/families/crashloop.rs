//! Ported from `score_crashloop()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::report::logs_select::select_best_line;
use crate::scoring::{add, base_noise, clamp_0_100, classify, firing_instances};
use once_cell::sync::Lazy;
use regex::Regex;

static STATUS_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"statuscode\s*:\s*(\d+)").unwrap());

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let waiting_is_crashloop = f.k8s.waiting_reason.as_deref().unwrap_or("").eq_ignore_ascii_case("crashloopbackoff");
    let restart_rate = f.k8s.restart_rate_5m_max.unwrap_or(0.0);

    if waiting_is_crashloop {
        impact += add(&mut breakdown, &mut reasons, "CRASHLOOPBACKOFF", 60, Some("k8s.waiting_reason"), Some("CrashLoopBackOff".to_string()));
    }
    if restart_rate >= 3.0 {
        impact += add(&mut breakdown, &mut reasons, "RESTART_RATE_HIGH", 35, Some("k8s.restart_rate_5m_max"), Some(format!("max={restart_rate}")));
    }
    if f.k8s.ready == Some(false) {
        impact += add(&mut breakdown, &mut reasons, "POD_NOT_READY", 20, Some("k8s.ready"), Some("Ready=False".to_string()));
    }
    if f.k8s.warning_events_count.unwrap_or(0) >= 1 {
        impact += add(&mut breakdown, &mut reasons, "WARNING_EVENTS", 10, Some("k8s.warning_events_count"), Some(format!("count={}", f.k8s.warning_events_count.unwrap_or(0))));
    }
    if let Some(fi) = firing_instances(investigation) {
        if fi >= 20.0 {
            impact += add(&mut breakdown, &mut reasons, "SCOPE_WIDESPREAD", 20, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={}", fi as i64)));
        } else if fi >= 5.0 {
            impact += add(&mut breakdown, &mut reasons, "SCOPE_MULTI_INSTANCE", 10, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={}", fi as i64)));
        }
    }

    if waiting_is_crashloop {
        confidence += add(&mut breakdown, &mut reasons, "EVID_K8S_WAITING_REASON", 35, Some("k8s.waiting_reason"), Some("waiting_reason present".to_string()));
    }
    if f.k8s.restart_rate_5m_max.is_some() && restart_rate > 0.0 {
        confidence += add(&mut breakdown, &mut reasons, "EVID_RESTART_METRIC", 35, Some("k8s.restart_rate_5m_max"), Some("restart metric corroborates".to_string()));
    }
    if f.k8s.warning_events_count.unwrap_or(0) >= 1 {
        confidence += add(&mut breakdown, &mut reasons, "EVID_WARNING_EVENTS", 10, Some("k8s.warning_events_count"), Some("warning events corroborate".to_string()));
    }
    let strong_events = f
        .k8s
        .recent_event_reasons_top
        .iter()
        .any(|e| matches!(e.reason.as_deref().map(str::to_ascii_lowercase).as_deref(), Some("backoff") | Some("unhealthy") | Some("killing")));
    if strong_events {
        confidence += add(&mut breakdown, &mut reasons, "EVID_K8S_EVENTS_CRASHLOOP", 20, Some("k8s.recent_event_reasons_top"), Some("BackOff/Unhealthy/Killing events present".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "logs") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LOGS", -15, Some("quality.missing_inputs"), Some("logs unavailable".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }
    for cf in &f.quality.contradiction_flags {
        confidence += add(&mut breakdown, &mut reasons, cf, -40, Some("quality.contradiction_flags"), Some("contradiction detected".to_string()));
    }

    let mut noise = 0;
    if investigation.alert.label("alertname") == Some("InfoInhibitor") {
        noise += add(&mut breakdown, &mut reasons, "META_ALERT", 60, Some("alert.alertname"), Some("InfoInhibitor is meta".to_string()));
    }
    noise += base_noise(investigation, &mut breakdown, &mut reasons);
    if waiting_is_crashloop {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_CRASHLOOP", -30, Some("k8s.waiting_reason"), Some("strong symptom reduces noise".to_string()));
    }
    if restart_rate >= 3.0 {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_RESTARTS", -10, Some("k8s.restart_rate_5m_max"), Some("restart spike reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);
    let classification = classify(impact, confidence, noise, 40);

    let mut bits: Vec<String> = Vec::new();
    if let Some(rr) = f.k8s.restart_rate_5m_max {
        bits.push(format!("restart_rate_5m_max={rr:.2}"));
    }
    let mut probe_bits: Vec<String> = Vec::new();
    let mut status_codes: Vec<String> = Vec::new();
    for ev in f.k8s.recent_event_reasons_top.iter().take(10) {
        let msg = ev.message.as_deref().unwrap_or("").to_ascii_lowercase();
        if msg.contains("readiness probe failed") {
            probe_bits.push("readiness".to_string());
        }
        if msg.contains("liveness probe failed") {
            probe_bits.push("liveness".to_string());
        }
        if let Some(caps) = STATUS_CODE_RE.captures(&msg) {
            status_codes.push(caps[1].to_string());
        }
    }
    dedupe_keep_order(&mut probe_bits);
    dedupe_keep_order(&mut status_codes);
    if !probe_bits.is_empty() {
        let tail = if status_codes.is_empty() {
            String::new()
        } else {
            format!(" (HTTP {})", status_codes.iter().take(3).cloned().collect::<Vec<_>>().join(","))
        };
        bits.push(format!("probe_failures={}{}", probe_bits.join("/"), tail));
    }

    let last_term = f
        .k8s
        .container_last_terminated_top
        .iter()
        .find(|t| investigation.target.container.as_deref() == Some(t.container.as_str()))
        .or_else(|| f.k8s.container_last_terminated_top.first());
    if let Some(t) = last_term {
        let mut t_bits = Vec::new();
        if let Some(r) = &t.reason {
            t_bits.push(r.clone());
        }
        if let Some(ec) = t.exit_code {
            t_bits.push(format!("exit={ec}"));
        }
        if !t_bits.is_empty() {
            bits.push(format!("last_terminated={}({})", t.container, t_bits.join(",")));
        }
    }

    let top_log = select_best_line(&investigation.evidence.logs.logs);

    let prefix = if waiting_is_crashloop { "CrashLoopBackOff" } else { "Crashloop symptoms" };
    let mut one_liner = prefix.to_string();
    if !bits.is_empty() {
        one_liner.push_str(&format!(": {}", bits.iter().take(4).cloned().collect::<Vec<_>>().join("; ")));
    }
    if let Some(log) = top_log {
        one_liner.push_str(&format!("; top_log={log}"));
    }

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "crashloop".to_string(),
        one_liner,
        next_steps: vec![
            "Check the Top events and last termination in the Appendix (probe failures vs BackOff vs explicit errors).".to_string(),
            "Use the Appendix Logs snippet (prioritized errors); if it's only startup noise, expand the time window and re-run.".to_string(),
            "If probes are failing (e.g., HTTP 503), validate the dependency/readiness endpoint and consider rollback if there was a recent change.".to_string(),
        ],
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}

fn dedupe_keep_order(xs: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    xs.retain(|x| seen.insert(x.clone()));
}
