//! Whole-word, case-insensitive placeholder substitution for next-step
//! command templates, plus the two pieces of evidence-derived inference the
//! original resolver performs beyond literal substitution: an S3 bucket
//! name pulled out of a log line, and a discovered service-account name
//! pulled out of K8s pod evidence. Ported from
//! `agent/utils/placeholder_resolver.py`.
//!
//! [`crate::diagnostics::patterns::resolve_placeholders`] covers the
//! simpler `{field}` substitution used by the log-pattern matcher's
//! `why_template`; this module is the one the pipeline's family-enrichment
//! stage (spec.md §4.3 step 11) uses for `kubectl`/`aws` next-step command
//! templates, where the placeholder set is open-ended (`{namespace}`,
//! `{pod}`, `bucket_name`, `sa_name`, …) rather than fixed per pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute every `{key}` token in `template` with `context[key]`
/// (case-insensitive key lookup), defaulting missing keys to `"unknown"`
/// rather than raising — spec.md §8's pattern-matcher-safety property.
/// Replacements are never multi-line (spec.md §9 design note); a
/// multi-line context value is flattened to its first line.
pub fn resolve(template: &str, context: &HashMap<String, String>) -> String {
    let lower: HashMap<String, &str> = context.iter().map(|(k, v)| (k.to_lowercase(), v.as_str())).collect();
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            let key = caps[1].to_lowercase();
            match lower.get(&key) {
                Some(value) => value.lines().next().unwrap_or("unknown").to_string(),
                None => "unknown".to_string(),
            }
        })
        .into_owned()
}

static BUCKET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)bucket[=:\s]+['\x22]?([a-z0-9][a-z0-9.\-]{1,61}[a-z0-9])").unwrap(),
        Regex::new(r"(?i)arn:aws:s3:::([a-z0-9][a-z0-9.\-]{1,61}[a-z0-9])").unwrap(),
        Regex::new(r"(?i)([a-z0-9][a-z0-9.\-]{1,61}[a-z0-9])\.s3[.\-][a-z0-9\-]*\.amazonaws\.com").unwrap(),
    ]
});

/// Pull an S3 bucket name out of a log line or error message via a regex
/// cascade (key=value style, an S3 ARN, or a virtual-hosted-style S3 URL).
/// Returns the first match across the cascade, in declaration order.
pub fn extract_bucket_name(text: &str) -> Option<String> {
    BUCKET_PATTERNS.iter().find_map(|re| re.captures(text).map(|c| c[1].to_string()))
}

const SERVICE_ACCOUNT_KEYS: &[&str] = &["service_account_name", "serviceAccountName", "service_account", "serviceAccount"];

/// Pull a discovered service-account name out of a pod's open evidence map,
/// trying each of the key spellings Kubernetes API responses and
/// `kubectl`-flavored JSON both use.
pub fn extract_service_account(pod_info: &HashMap<String, serde_json::Value>) -> Option<String> {
    SERVICE_ACCOUNT_KEYS.iter().find_map(|key| pod_info.get(*key).and_then(|v| v.as_str()).map(str::to_string))
}

/// Build the substitution context the family-enrichment stage uses for its
/// `kubectl`/`aws` next-step templates: the literal namespace/pod/container
/// identity plus whatever bucket/service-account names were discovered in
/// evidence.
pub fn build_context(
    namespace: Option<&str>,
    pod: Option<&str>,
    container: Option<&str>,
    log_text: &str,
    pod_info: Option<&HashMap<String, serde_json::Value>>,
) -> HashMap<String, String> {
    let mut ctx = HashMap::new();
    if let Some(v) = namespace {
        ctx.insert("namespace".to_string(), v.to_string());
    }
    if let Some(v) = pod {
        ctx.insert("pod".to_string(), v.to_string());
    }
    if let Some(v) = container {
        ctx.insert("container".to_string(), v.to_string());
    }
    if let Some(bucket) = extract_bucket_name(log_text) {
        ctx.insert("bucket_name".to_string(), bucket);
    }
    if let Some(pod_info) = pod_info {
        if let Some(sa) = extract_service_account(pod_info) {
            ctx.insert("sa_name".to_string(), sa);
        }
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholder_case_insensitively() {
        let mut ctx = HashMap::new();
        ctx.insert("namespace".to_string(), "payments".to_string());
        assert_eq!(resolve("kubectl get pods -n {Namespace}", &ctx), "kubectl get pods -n payments");
    }

    #[test]
    fn missing_placeholder_defaults_to_unknown() {
        let ctx = HashMap::new();
        assert_eq!(resolve("bucket={bucket_name}", &ctx), "bucket=unknown");
    }

    #[test]
    fn extracts_bucket_name_from_arn() {
        let text = "AccessDenied on arn:aws:s3:::my-reports-bucket/object.json";
        assert_eq!(extract_bucket_name(text).as_deref(), Some("my-reports-bucket"));
    }

    #[test]
    fn extracts_bucket_name_from_virtual_hosted_url() {
        let text = "PUT https://my-assets.s3.us-east-1.amazonaws.com/key failed: 403";
        assert_eq!(extract_bucket_name(text).as_deref(), Some("my-assets"));
    }

    #[test]
    fn extracts_service_account_from_pod_info() {
        let mut pod_info = HashMap::new();
        pod_info.insert("serviceAccountName".to_string(), serde_json::json!("payments-sa"));
        assert_eq!(extract_service_account(&pod_info).as_deref(), Some("payments-sa"));
    }

    #[test]
    fn multiline_context_value_is_flattened() {
        let mut ctx = HashMap::new();
        ctx.insert("pod".to_string(), "api-abc\nextra line".to_string());
        assert_eq!(resolve("{pod}", &ctx), "api-abc");
    }
}
