//! Job-failure diagnostic module. Ported from
//! `agent/diagnostics/job_diagnostics.py`'s `JobFailureDiagnosticModule`:
//! the first module to interpret parsed log content rather than only K8s
//! signals, via the generic [`super::patterns::LogPatternMatcher`] shared
//! with [`super::crashloop`]. `agent/collectors/job_failure.py` (its
//! `collect()` counterpart) was not present in the retrieved pack — this
//! module reads evidence the pipeline's evidence-collection stage already
//! populated (`evidence.logs.parsed_errors`) rather than collecting
//! anything itself, which matches how every other diagnostic module in
//! this crate is wired (see `DESIGN.md`).

use super::patterns::{job_failure_patterns, resolve_placeholders, LogPattern, LogPatternMatcher};
use super::DiagnosticModule;
use crate::domain::analysis::{ActionProposal, Hypothesis};
use crate::domain::investigation::Investigation;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

static MATCHER: Lazy<LogPatternMatcher> = Lazy::new(|| LogPatternMatcher::new(job_failure_patterns()));

pub struct JobFailureDiagnosticModule;

impl DiagnosticModule for JobFailureDiagnosticModule {
    fn module_id(&self) -> &'static str {
        "job_failure"
    }

    /// Applies to Job-scoped alerts: either the target's `workload_kind`
    /// is `Job`, or the detected family is `job_failed` (kube-state-metrics
    /// alerts carry the latter without a resolved workload kind).
    fn applies(&self, investigation: &Investigation) -> bool {
        investigation.target.workload_kind.as_deref() == Some("Job")
            || investigation.analysis.features.as_ref().map(|f| f.family == "job_failed").unwrap_or(false)
    }

    fn diagnose(&self, investigation: &Investigation) -> Vec<Hypothesis> {
        let Some(parsed_errors) = investigation.evidence.logs.parsed_errors.as_ref() else {
            return Vec::new();
        };
        if parsed_errors.is_empty() {
            return Vec::new();
        }

        let mut hyps = Vec::new();
        for (pattern, extracted) in MATCHER.find_matches(parsed_errors) {
            let context = build_context(investigation, extracted);

            let matching_count = MATCHER.matching_count(pattern, parsed_errors);
            let mut why = vec![resolve_placeholders(pattern.why_template, &context), format!("Found {matching_count} matching error pattern(s) in logs")];
            if let Some(sample) = MATCHER.sample(pattern, parsed_errors) {
                why.push(format!("Sample: {}", sample.chars().take(200).collect::<String>()));
            }

            let mut next_tests: Vec<String> = pattern.remediation_steps.iter().map(|s| resolve_placeholders(s, &context)).collect();
            if !pattern.remediation_steps.is_empty() && !pattern.next_tests.is_empty() {
                next_tests.push(String::new());
            }
            next_tests.extend(pattern.next_tests.iter().map(|s| resolve_placeholders(s, &context)));

            hyps.push(Hypothesis {
                hypothesis_id: pattern.pattern_id.to_string(),
                title: pattern.title.to_string(),
                confidence_0_100: pattern.confidence,
                why,
                supporting_refs: vec!["evidence.logs.parsed_errors".to_string()],
                counter_refs: Vec::new(),
                next_tests,
                proposed_actions: build_proposed_actions(pattern, &context),
            });
        }
        hyps
    }
}

/// Build the full placeholder context for a match: investigation defaults
/// (namespace/pod/service-account/IAM role), overridden by whatever fields
/// the pattern itself extracted from the log text. Ported from
/// `JobFailureDiagnosticModule._build_context`.
fn build_context(investigation: &Investigation, extracted: HashMap<String, String>) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert("namespace".to_string(), investigation.target.namespace.clone().unwrap_or_else(|| "default".to_string()));
    context.insert("pod".to_string(), investigation.target.pod.clone().unwrap_or_else(|| "unknown".to_string()));
    context.insert("sa".to_string(), "unknown".to_string());
    context.insert("role_name".to_string(), "unknown".to_string());
    context.insert("role_arn".to_string(), "unknown".to_string());
    context.insert("cluster_name".to_string(), "unknown".to_string());

    if let Some(pod_info) = investigation.evidence.k8s.pod_info.as_ref() {
        if let Some(sa) = pod_info.get("service_account").and_then(Value::as_str) {
            context.insert("sa".to_string(), sa.to_string());
        }
    }

    if let Some(aws_meta) = investigation.evidence.aws.metadata.as_ref() {
        if let Some(Value::Object(iam)) = aws_meta.get("iam_validation") {
            if let Some(role_name) = iam.get("role_name").and_then(Value::as_str) {
                context.insert("role_name".to_string(), role_name.to_string());
            }
            if let Some(role_arn) = iam.get("role_arn").and_then(Value::as_str) {
                context.insert("role_arn".to_string(), role_arn.to_string());
            }
        }
    }

    context.extend(extracted);
    context
}

/// Pattern-specific proposed actions for the report's Actions section.
/// Ported from `JobFailureDiagnosticModule._build_proposed_actions` — only
/// `s3_access_denied` carries actions today, matching the original.
fn build_proposed_actions(pattern: &LogPattern, context: &HashMap<String, String>) -> Vec<ActionProposal> {
    if pattern.pattern_id != "s3_access_denied" {
        return Vec::new();
    }

    let sa = context.get("sa").cloned().unwrap_or_else(|| "unknown".to_string());
    let namespace = context.get("namespace").cloned().unwrap_or_else(|| "default".to_string());
    let bucket = context.get("bucket").cloned().unwrap_or_else(|| "unknown".to_string());

    let mut actions = vec![ActionProposal {
        action_type: "diagnose_iam_role".to_string(),
        title: format!("Get IAM role for service account {sa}"),
        risk: Some("low".to_string()),
        preconditions: Vec::new(),
        execution_payload: HashMap::from([
            ("command".to_string(), Value::String(format!("kubectl get sa {sa} -n {namespace} -o jsonpath='{{.metadata.annotations.eks\\.amazonaws\\.com/role-arn}}'"))),
            ("namespace".to_string(), Value::String(namespace.clone())),
            ("service_account".to_string(), Value::String(sa.clone())),
        ]),
    }];

    if bucket != "unknown" {
        actions.push(ActionProposal {
            action_type: "validate_s3_access".to_string(),
            title: format!("Validate S3 bucket access: {bucket}"),
            risk: Some("low".to_string()),
            preconditions: Vec::new(),
            execution_payload: HashMap::from([("command".to_string(), Value::String(format!("aws s3api head-bucket --bucket {bucket}"))), ("bucket".to_string(), Value::String(bucket.clone()))]),
        });
    }

    actions.push(ActionProposal {
        action_type: "attach_iam_policy".to_string(),
        title: "Attach S3 access policy to IAM role".to_string(),
        risk: Some("medium".to_string()),
        preconditions: vec!["Verify IAM role ARN".to_string(), "Confirm bucket name".to_string()],
        execution_payload: HashMap::from([
            ("policy_name".to_string(), Value::String("S3Access".to_string())),
            ("bucket".to_string(), Value::String(bucket)),
            (
                "permissions".to_string(),
                Value::Array(vec![Value::String("s3:GetObject".to_string()), Value::String("s3:ListBucket".to_string()), Value::String("s3:GetBucketLocation".to_string())]),
            ),
        ]),
    });

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use crate::domain::analysis::DerivedFeatures;
    use chrono::Utc;

    fn investigation_with_logs(messages: &[&str]) -> Investigation {
        let alert = AlertInstance::default();
        let window = TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() };
        let mut inv = Investigation::new(alert, window);
        inv.target.workload_kind = Some("Job".to_string());
        inv.analysis.features = Some(DerivedFeatures { family: "job_failed".to_string(), ..job_features_default() });
        inv.evidence.logs.parsed_errors = Some(messages.iter().map(|m| HashMap::from([("message".to_string(), Value::String((*m).to_string()))])).collect());
        inv
    }

    fn job_features_default() -> DerivedFeatures {
        DerivedFeatures { family: "job_failed".to_string(), k8s: Default::default(), metrics: Default::default(), logs: Default::default(), changes: Default::default(), quality: Default::default(), job_metrics: None }
    }

    #[test]
    fn applies_to_job_workload_kind() {
        let inv = investigation_with_logs(&[]);
        assert!(JobFailureDiagnosticModule.applies(&inv));
    }

    #[test]
    fn no_parsed_errors_yields_no_hypotheses() {
        let alert = AlertInstance::default();
        let window = TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() };
        let inv = Investigation::new(alert, window);
        assert!(JobFailureDiagnosticModule.diagnose(&inv).is_empty());
    }

    #[test]
    fn s3_access_denied_yields_hypothesis_with_actions() {
        let inv = investigation_with_logs(&["AccessDenied when calling GetObject for s3://my-bucket/key"]);
        let hyps = JobFailureDiagnosticModule.diagnose(&inv);
        let hyp = hyps.iter().find(|h| h.hypothesis_id == "s3_access_denied").expect("should emit s3_access_denied");
        assert_eq!(hyp.confidence_0_100, 90);
        assert!(hyp.proposed_actions.iter().any(|a| a.action_type == "diagnose_iam_role"));
    }

    #[test]
    fn s3_bucket_not_found_has_no_proposed_actions() {
        let inv = investigation_with_logs(&["botocore.exceptions.ClientError: NoSuchBucket"]);
        let hyps = JobFailureDiagnosticModule.diagnose(&inv);
        let hyp = hyps.iter().find(|h| h.hypothesis_id == "s3_bucket_not_found").expect("should emit s3_bucket_not_found");
        assert!(hyp.proposed_actions.is_empty());
    }

    #[test]
    fn unmatched_logs_yield_no_hypotheses() {
        let inv = investigation_with_logs(&["everything is fine, job completed successfully"]);
        assert!(JobFailureDiagnosticModule.diagnose(&inv).is_empty());
    }
}
