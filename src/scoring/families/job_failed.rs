//! Ported from `score_job_failed()` in `agent/pipeline/scoring.py`.

use crate::domain::analysis::{Classification, DerivedFeatures, DeterministicScores, DeterministicVerdict};
use crate::domain::investigation::Investigation;
use crate::scoring::{add, clamp_0_100};
use once_cell::sync::Lazy;
use regex::Regex;

static TEST_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(test|canary|sample|demo|example)\b").unwrap());

fn parsing_count(investigation: &Investigation, key: &str) -> i64 {
    investigation
        .evidence
        .logs
        .parsing_metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;
    let mut noise = 0;

    impact += add(&mut breakdown, &mut reasons, "JOB_FAILED_BASELINE", 40, Some("alert.labels"), Some("job failed alert".to_string()));
    let fatal_count = parsing_count(investigation, "fatal_count");
    let exception_count = parsing_count(investigation, "exception_count");
    let error_count = parsing_count(investigation, "error_count");
    if fatal_count > 0 {
        impact += add(&mut breakdown, &mut reasons, "JOB_FATAL_IN_LOGS", 30, Some("logs.parsing_metadata.fatal_count"), Some(format!("fatal_count={fatal_count}")));
    }
    if exception_count > 0 {
        impact += add(&mut breakdown, &mut reasons, "JOB_EXCEPTION_IN_LOGS", 20, Some("logs.parsing_metadata.exception_count"), Some(format!("exception_count={exception_count}")));
    }
    if error_count > 0 {
        impact += add(&mut breakdown, &mut reasons, "JOB_ERROR_IN_LOGS", 15, Some("logs.parsing_metadata.error_count"), Some(format!("error_count={error_count}")));
    }
    let restart_count = f.k8s.restart_rate_5m_max.unwrap_or(0.0);
    if restart_count > 1.0 {
        impact += add(&mut breakdown, &mut reasons, "JOB_MULTIPLE_RESTARTS", 15, Some("k8s.restart_rate_5m_max"), Some(format!("restart_count={restart_count}")));
    }
    let repeated_failures = investigation
        .evidence
        .k8s
        .rollout_status
        .as_ref()
        .and_then(|m| m.get("failed"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    if repeated_failures > 1 {
        impact += add(&mut breakdown, &mut reasons, "JOB_REPEATED_FAILURES", 10, Some("k8s.rollout_status.failed"), Some(format!("failed={repeated_failures}")));
    }

    confidence += add(&mut breakdown, &mut reasons, "JOB_ALERT_CONFIRMS_FAILURE", 60, Some("alert.labels"), Some("alert confirms job failure".to_string()));
    let logs_present = !investigation.evidence.logs.logs.is_empty();
    if investigation.evidence.logs.parsed_errors.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "JOB_LOGS_PARSED", 25, Some("logs.parsed_errors"), Some("logs parsed for errors".to_string()));
    } else if logs_present {
        confidence += add(&mut breakdown, &mut reasons, "JOB_LOGS_AVAILABLE", 15, Some("logs.logs"), Some("logs available".to_string()));
    }
    if investigation.evidence.k8s.pod_info.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "JOB_K8S_CONTEXT", 10, Some("k8s.pod_info"), Some("K8s context present".to_string()));
    }
    if investigation.evidence.k8s.rollout_status.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "JOB_ROLLOUT_STATUS", 5, Some("k8s.rollout_status"), Some("rollout status present".to_string()));
    }

    let workload_name = investigation.target.workload_name.as_deref().unwrap_or("");
    if TEST_NAME_RE.is_match(workload_name) {
        noise += add(&mut breakdown, &mut reasons, "JOB_TEST_NAME", 20, Some("target.workload_name"), Some(format!("workload_name={workload_name}")));
    }
    let historical_mode = investigation.meta.get("historical_mode").and_then(|v| v.as_bool()).unwrap_or(false);
    if historical_mode {
        noise += add(&mut breakdown, &mut reasons, "JOB_HISTORICAL_MODE", 10, Some("meta.historical_mode"), Some("historical/backfill run".to_string()));
    }
    if !logs_present {
        noise += add(&mut breakdown, &mut reasons, "JOB_EMPTY_LOGS", 15, Some("logs.logs"), Some("no logs retrieved".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);

    let classification = if (impact + confidence >= 140 && confidence >= 75) || (impact + confidence >= 100 && confidence >= 60) {
        Classification::Actionable
    } else {
        Classification::Informational
    };

    let top_hypothesis = investigation
        .analysis
        .hypotheses
        .iter()
        .filter(|h| h.confidence_0_100 >= 70)
        .max_by_key(|h| h.confidence_0_100);

    let one_liner = if let Some(h) = top_hypothesis {
        format!("Job failed: {}", h.title)
    } else {
        "Job run failed; check exit status and logs for the root cause.".to_string()
    };

    let ns = investigation.target.namespace.clone().unwrap_or_default();
    let job_name = investigation.target.job.clone().or_else(|| investigation.target.workload_name.clone()).unwrap_or_default();

    let mut next_steps: Vec<String> = if let Some(h) = top_hypothesis {
        h.next_tests.clone()
    } else {
        Vec::new()
    };
    if next_steps.is_empty() {
        next_steps.push("Inspect the job's pod logs for the failing step and exit code.".to_string());
        next_steps.push("Check for resource limits, missing config/secrets, or dependency failures.".to_string());
    }
    next_steps.push(format!("kubectl describe job -n {ns} {job_name}"));
    next_steps.push(format!("kubectl get pods -n {ns} -l job-name={job_name}"));
    next_steps.push(format!("kubectl logs -n {ns} -l job-name={job_name} --all-containers --tail=200"));
    next_steps.truncate(6);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "job_failed".to_string(),
        one_liner,
        next_steps,
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}
