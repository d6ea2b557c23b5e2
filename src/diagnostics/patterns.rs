//! Log pattern library shared by diagnostic modules. Ported from
//! `agent/diagnostics/log_pattern_matcher.py` (`LogPattern`/`LogPatternMatcher`)
//! and the per-domain pattern sets in `agent/diagnostics/patterns/*.py`
//! (`crashloop_patterns.py`, `s3_patterns.py`): each pattern carries a list of
//! case-insensitive regexes (any one matching is a hit), a base confidence,
//! a `why_template`, diagnostic `next_tests`, actual-fix `remediation_steps`,
//! and a `context_extractors` map of single-capture-group regexes used to
//! pull fields (bucket name, host, db engine, …) out of the matched text.

use regex::Regex;
use std::collections::HashMap;

pub struct LogPattern {
    pub pattern_id: &'static str,
    pub title: &'static str,
    pub patterns: Vec<Regex>,
    pub confidence: i32,
    pub why_template: &'static str,
    pub next_tests: Vec<&'static str>,
    pub remediation_steps: Vec<&'static str>,
    /// `field_name -> single-capture-group regex`. Enforced at load (see
    /// `ci_one_capture`) per spec.md §9's "enforce at load" design note.
    pub context_extractors: Vec<(&'static str, Regex)>,
}

fn ci(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).unwrap_or_else(|e| panic!("malformed log pattern {pattern:?}: {e}"))
}

/// Same as [`ci`], but asserts the compiled pattern has exactly one capture
/// group, matching the original `context_extractors` contract ("the regex
/// should have one capture group that extracts the field value").
fn ci_one_capture(pattern: &str) -> Regex {
    let re = ci(pattern);
    assert_eq!(re.captures_len(), 2, "context extractor {pattern:?} must have exactly one capture group");
    re
}

impl LogPattern {
    /// True if any of this pattern's regexes matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Extract whichever context fields this pattern knows how to pull out
    /// of `text`. Fields whose regex does not match are simply absent (the
    /// caller substitutes `"unknown"` — see [`resolve_placeholders`]).
    pub fn extract_context(&self, text: &str) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (name, re) in &self.context_extractors {
            if let Some(caps) = re.captures(text) {
                if let Some(m) = caps.get(1) {
                    out.insert((*name).to_string(), m.as_str().to_string());
                }
            }
        }
        out
    }
}

fn is_placeholder_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolve `{name}`-style placeholders against a capture map, defaulting
/// any missing key to `"unknown"` rather than failing the substitution
/// (mirrors Python's `defaultdict(lambda: "unknown")` + `str.format_map`).
/// `{{`/`}}` are literal braces (PromQL selectors embedded in `next_tests`
/// use this escaping, e.g. `container_memory_working_set_bytes{{namespace="{namespace}"}}`);
/// a `{...}` span that is not a bare identifier is passed through unchanged
/// rather than swallowed, so a stray PromQL `{` never corrupts the query.
pub fn resolve_placeholders(template: &str, captures: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if template[i..].starts_with("{{") {
                out.push('{');
                i += 2;
                continue;
            }
            if let Some(end) = template[i..].find('}') {
                let key = &template[i + 1..i + end];
                if is_placeholder_word(key) {
                    let value = captures.get(key).map(String::as_str).unwrap_or("unknown");
                    out.push_str(value);
                    i += end + 1;
                    continue;
                }
            }
        } else if bytes[i] == b'}' && template[i..].starts_with("}}") {
            out.push('}');
            i += 2;
            continue;
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// A parsed log error entry, as found in `evidence.logs.parsed_errors`
/// (`Vec<HashMap<String, serde_json::Value>>` upstream — matched here by
/// the one field (`message`) every pattern match cares about).
pub fn entry_message(entry: &HashMap<String, serde_json::Value>) -> &str {
    entry.get("message").and_then(serde_json::Value::as_str).unwrap_or("")
}

pub struct LogPatternMatcher {
    patterns: Vec<LogPattern>,
}

impl LogPatternMatcher {
    pub fn new(patterns: Vec<LogPattern>) -> Self {
        Self { patterns }
    }

    /// Match a batch of parsed error entries against every registered
    /// pattern. Ported from `LogPatternMatcher.find_matches`: all entry
    /// messages are joined into one searchable text and each pattern is
    /// tried once (not "first match wins" — every matching pattern is
    /// returned, in library order).
    pub fn find_matches(&self, entries: &[HashMap<String, serde_json::Value>]) -> Vec<(&LogPattern, HashMap<String, String>)> {
        if entries.is_empty() {
            return Vec::new();
        }
        let joined = entries.iter().map(entry_message).collect::<Vec<_>>().join("\n");
        self.patterns
            .iter()
            .filter(|p| p.matches(&joined))
            .map(|p| (p, p.extract_context(&joined)))
            .collect()
    }

    /// Count of entries whose message matches `pattern`, used to populate
    /// the "Found N matching error pattern(s)" why-bullet.
    pub fn matching_count(&self, pattern: &LogPattern, entries: &[HashMap<String, serde_json::Value>]) -> usize {
        entries.iter().filter(|e| pattern.matches(entry_message(e))).count()
    }

    /// First entry whose message matches `pattern` (used for the "Sample:"
    /// why-bullet).
    pub fn sample<'a>(&self, pattern: &LogPattern, entries: &'a [HashMap<String, serde_json::Value>]) -> Option<&'a str> {
        entries.iter().map(entry_message).find(|m| pattern.matches(m))
    }
}

/// Dependency connection failure (DNS / connection refused). Ported from
/// `CRASHLOOP_DEPENDENCY_CONNECTION` in `crashloop_patterns.py`.
pub fn crashloop_dependency_connection() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_dependency_connection",
        title: "Dependency connection failure (connection refused / DNS)",
        patterns: vec![
            ci(r"connection refused"),
            ci(r"ECONNREFUSED"),
            ci(r"dial tcp.*connection refused"),
            ci(r"no such host"),
            ci(r"Name or service not known"),
            ci(r"getaddrinfo ENOTFOUND"),
            ci(r"Could not resolve host"),
        ],
        confidence: 85,
        why_template: "Application cannot connect to dependency '{host}' (connection refused or DNS failure)",
        next_tests: vec![
            "Check if the dependency service is running:",
            "kubectl -n {namespace} get svc | grep -i {host}",
            "",
            "Test DNS resolution from within the cluster:",
            "kubectl -n {namespace} run -it --rm dns-test --image=busybox -- nslookup {host}",
            "",
            "Check network policies that might block egress:",
            "kubectl -n {namespace} get networkpolicy -o yaml",
        ],
        remediation_steps: Vec::new(),
        context_extractors: vec![("host", ci_one_capture(r"(?:dial tcp |connect to |connecting to |resolve host |ENOTFOUND )([^\s:]+)"))],
    }
}

/// Missing configuration file or environment variable.
pub fn crashloop_config_missing() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_config_missing",
        title: "Missing configuration file or environment variable",
        patterns: vec![
            ci(r"FileNotFoundError"),
            ci(r"No such file or directory.*\.(?:yaml|yml|json|env|conf|properties|toml|ini|cfg)"),
            ci(r"missing required.*config"),
            ci(r"ENOENT.*config"),
            ci(r"required key.*not set"),
            ci(r"required environment variable.*not set"),
            ci(r"KeyError:.*[A-Z_]{3,}"),
        ],
        confidence: 80,
        why_template: "Application fails to start due to missing configuration file or environment variable",
        next_tests: vec![
            "Check ConfigMap and Secret mounts on the pod:",
            "kubectl -n {namespace} describe pod {pod} | grep -A5 -i 'volumes\\|mounts'",
            "",
            "List ConfigMaps and Secrets in the namespace:",
            "kubectl -n {namespace} get cm,secret",
            "",
            "Check if referenced ConfigMap/Secret keys exist:",
            "kubectl -n {namespace} get cm -o yaml | grep -i 'data:'",
        ],
        remediation_steps: Vec::new(),
        context_extractors: Vec::new(),
    }
}

/// Port bind failure (address already in use).
pub fn crashloop_port_bind_failure() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_port_bind_failure",
        title: "Port bind failure (address already in use)",
        patterns: vec![ci(r"bind.*address already in use"), ci(r"EADDRINUSE"), ci(r"listen tcp.*bind"), ci(r"port.*already.*in use")],
        confidence: 90,
        why_template: "Application cannot bind to port (address already in use)",
        next_tests: vec![
            "Check containerPort spec in the pod definition:",
            "kubectl -n {namespace} get pod {pod} -o jsonpath='{{.spec.containers[*].ports}}'",
            "",
            "Check if another container in the same pod uses the same port:",
            "kubectl -n {namespace} describe pod {pod} | grep -i port",
            "",
            "Verify hostPort is not conflicting with other pods on the same node:",
            "kubectl -n {namespace} get pod {pod} -o wide",
        ],
        remediation_steps: Vec::new(),
        context_extractors: Vec::new(),
    }
}

/// Application-level out-of-memory (heap exhaustion before K8s OOMKill).
pub fn crashloop_oom_application() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_oom_application",
        title: "Application out of memory (heap exhaustion)",
        patterns: vec![
            ci(r"OutOfMemoryError"),
            ci(r"JavaScript heap out of memory"),
            ci(r"Cannot allocate memory"),
            ci(r"ENOMEM"),
            ci(r"runtime: out of memory"),
            ci(r"MemoryError"),
            ci(r"std::bad_alloc"),
        ],
        confidence: 85,
        why_template: "Application running out of memory (heap exhaustion before OOMKill)",
        next_tests: vec![
            "Check memory limits and requests for the container:",
            "kubectl -n {namespace} get pod {pod} -o jsonpath='{{.spec.containers[*].resources}}'",
            "",
            "Check memory usage over time:",
            "quantile_over_time(0.95, container_memory_working_set_bytes{{namespace=\"{namespace}\",pod=\"{pod}\",container!=\"POD\",image!=\"\"}}[30m])",
            "",
            "For JVM apps, check -Xmx setting; for Node.js, check --max-old-space-size",
        ],
        remediation_steps: Vec::new(),
        context_extractors: Vec::new(),
    }
}

/// Permission denied / filesystem access.
pub fn crashloop_permission_denied() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_permission_denied",
        title: "Permission denied (filesystem or security)",
        patterns: vec![ci(r"Permission denied"), ci(r"EACCES"), ci(r"Operation not permitted"), ci(r"read-only file system")],
        confidence: 80,
        why_template: "Application lacks filesystem or security permissions",
        next_tests: vec![
            "Check securityContext and volume mounts:",
            "kubectl -n {namespace} get pod {pod} -o jsonpath='{{.spec.containers[*].securityContext}}'",
            "",
            "Check if volumes are mounted read-only:",
            "kubectl -n {namespace} describe pod {pod} | grep -A3 -i 'mount'",
            "",
            "Check fsGroup and runAsUser settings:",
            "kubectl -n {namespace} get pod {pod} -o jsonpath='{{.spec.securityContext}}'",
        ],
        remediation_steps: Vec::new(),
        context_extractors: Vec::new(),
    }
}

/// Database connection failure.
pub fn crashloop_database_connection() -> LogPattern {
    LogPattern {
        pattern_id: "crashloop_database_connection",
        title: "Database connection failure",
        patterns: vec![
            ci(r"could not connect to server.*PostgreSQL"),
            ci(r"Access denied for user.*MySQL"),
            ci(r"Cannot connect to Redis"),
            ci(r"MongoNetworkError"),
            ci(r"ETIMEDOUT.*:(?:5432|3306|6379|27017)"),
            ci(r"OperationalError.*(?:could not connect|Connection refused)"),
            ci(r"FATAL:.*password authentication failed"),
            ci(r"no pg_hba\.conf entry"),
        ],
        confidence: 80,
        why_template: "Application cannot connect to database '{db_type}'",
        next_tests: vec![
            "Check if the database service is reachable from the pod's namespace:",
            "kubectl -n {namespace} get svc | grep -iE 'postgres|mysql|redis|mongo'",
            "",
            "Verify database credentials secret exists and is mounted:",
            "kubectl -n {namespace} get secret | grep -iE 'db|database|postgres|mysql|redis|mongo'",
            "",
            "Test connectivity to the database port:",
            "kubectl -n {namespace} run -it --rm db-test --image=busybox -- nc -zv <db-host> <db-port>",
        ],
        remediation_steps: Vec::new(),
        context_extractors: vec![("db_type", ci_one_capture(r"(PostgreSQL|MySQL|Redis|MongoDB|Mongo)"))],
    }
}

pub fn crashloop_patterns() -> Vec<LogPattern> {
    vec![
        crashloop_dependency_connection(),
        crashloop_config_missing(),
        crashloop_port_bind_failure(),
        crashloop_oom_application(),
        crashloop_permission_denied(),
        crashloop_database_connection(),
    ]
}

/// S3 access denied (403). Ported from `S3_ACCESS_DENIED` in `s3_patterns.py`.
pub fn s3_access_denied_pattern() -> LogPattern {
    LogPattern {
        pattern_id: "s3_access_denied",
        title: "S3 access denied (IAM/bucket policy)",
        patterns: vec![
            ci(r"(?:403|Forbidden).*(?:s3|bucket)"),
            ci(r"Access Denied.*(?:HeadBucket|GetObject|PutObject|ListBucket)"),
            ci(r"botocore\.exceptions\.ClientError.*403.*(?:HeadBucket|GetObject)"),
            ci(r"Failed to get bucket region.*403"),
        ],
        confidence: 90,
        why_template: "Job pod cannot access S3 bucket '{bucket}' (403 Forbidden from {operation} operation)",
        remediation_steps: vec![
            "Step 1: Get the IAM role ARN from service account",
            "kubectl get sa {sa} -n {namespace} -o jsonpath='{{.metadata.annotations.eks\\.amazonaws\\.com/role-arn}}'",
            "",
            "Step 2: Attach a scoped S3 read policy granting s3:GetObject/ListBucket/GetBucketLocation",
            "on arn:aws:s3:::{bucket} and arn:aws:s3:::{bucket}/*",
            "",
            "Step 3: Attach the policy to the IAM role",
            "aws iam put-role-policy --role-name <ROLE_NAME> --policy-name S3Access --policy-document file://s3-policy.json",
        ],
        next_tests: vec![
            "Verify bucket exists and check current permissions:",
            "aws s3api head-bucket --bucket {bucket}",
            "",
            "Check current IAM role annotation:",
            "kubectl get sa {sa} -n {namespace} -o yaml | grep eks.amazonaws.com/role-arn",
            "",
            "Test if role has required S3 permissions:",
            "aws iam simulate-principal-policy --policy-source-arn <ROLE_ARN> --action-names s3:GetObject s3:ListBucket --resource-arns arn:aws:s3:::{bucket}/*",
        ],
        context_extractors: vec![
            ("bucket", ci_one_capture(r"(?:for\s+(?:bucket\s+)?|bucket[:\s]\s*)([a-z0-9][a-z0-9.-]*[a-z0-9])")),
            ("operation", ci_one_capture(r"(HeadBucket|GetObject|PutObject|ListBucket|GetBucketRegion)")),
        ],
    }
}

/// S3 bucket does not exist (404).
pub fn s3_bucket_not_found_pattern() -> LogPattern {
    LogPattern {
        pattern_id: "s3_bucket_not_found",
        title: "S3 bucket does not exist",
        patterns: vec![ci(r"(?:404|NoSuchBucket).*(?:s3|bucket)"), ci(r"The specified bucket does not exist"), ci(r"botocore\.exceptions\.ClientError.*NoSuchBucket")],
        confidence: 95,
        why_template: "S3 bucket '{bucket}' does not exist or is in a different region",
        next_tests: vec![
            "Check if bucket exists:",
            "aws s3api head-bucket --bucket {bucket}",
            "",
            "List all accessible buckets:",
            "aws s3 ls | grep {bucket}",
            "",
            "Verify bucket name in application config:",
            "kubectl get configmap -n {namespace} -o yaml | grep -i {bucket}",
        ],
        remediation_steps: Vec::new(),
        context_extractors: vec![("bucket", ci_one_capture(r"(?:for\s+(?:bucket\s+)?|bucket[:\s]\s*)([a-z0-9][a-z0-9.-]*[a-z0-9])"))],
    }
}

/// AWS credentials not configured (IRSA not set up).
pub fn s3_credentials_error_pattern() -> LogPattern {
    LogPattern {
        pattern_id: "s3_credentials_error",
        title: "AWS credentials not configured",
        patterns: vec![ci(r"Unable to locate credentials"), ci(r"No credentials found"), ci(r"botocore\.exceptions\.NoCredentialsError"), ci(r"Unable to locate AWS credentials")],
        confidence: 85,
        why_template: "Job pod has no AWS credentials configured (IRSA not set up)",
        next_tests: vec![
            "Check service account for IRSA annotation:",
            "kubectl get sa {sa} -n {namespace} -o yaml",
            "",
            "Verify service account token is mounted in pod:",
            "kubectl describe pod {pod} -n {namespace} | grep -A5 'AWS_WEB_IDENTITY_TOKEN_FILE'",
            "",
            "Check OIDC provider configuration for EKS cluster:",
            "aws eks describe-cluster --name {cluster_name} --query 'cluster.identity.oidc.issuer'",
        ],
        remediation_steps: Vec::new(),
        context_extractors: Vec::new(),
    }
}

/// S3 bucket region mismatch.
pub fn s3_region_mismatch_pattern() -> LogPattern {
    LogPattern {
        pattern_id: "s3_region_mismatch",
        title: "S3 bucket region mismatch",
        patterns: vec![
            ci(r"bucket.*is in.*(?:region|Region)"),
            ci(r"PermanentRedirect.*bucket"),
            ci(r"The bucket you are attempting to access must be addressed using the specified endpoint"),
        ],
        confidence: 85,
        why_template: "S3 bucket '{bucket}' is in a different region than the client is configured for",
        next_tests: vec![
            "Get bucket region:",
            "aws s3api get-bucket-location --bucket {bucket}",
            "",
            "Check AWS_DEFAULT_REGION environment variable in pod:",
            "kubectl exec {pod} -n {namespace} -- env | grep AWS_DEFAULT_REGION",
            "",
            "Fix: Add AWS_DEFAULT_REGION or AWS_REGION environment variable to pod spec",
        ],
        remediation_steps: Vec::new(),
        context_extractors: vec![("bucket", ci_one_capture(r"(?:for\s+(?:bucket\s+)?|bucket[:\s]\s*)([a-z0-9][a-z0-9.-]*[a-z0-9])"))],
    }
}

pub fn job_failure_patterns() -> Vec<LogPattern> {
    vec![s3_access_denied_pattern(), s3_bucket_not_found_pattern(), s3_credentials_error_pattern(), s3_region_mismatch_pattern()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_placeholder() {
        let mut caps = HashMap::new();
        caps.insert("bucket".to_string(), "s3://my-bucket".to_string());
        let out = resolve_placeholders("denied against {bucket}", &caps);
        assert_eq!(out, "denied against s3://my-bucket");
    }

    #[test]
    fn defaults_missing_placeholder_to_unknown() {
        let caps = HashMap::new();
        let out = resolve_placeholders("denied against {bucket}", &caps);
        assert_eq!(out, "denied against unknown");
    }

    fn entries(messages: &[&str]) -> Vec<HashMap<String, serde_json::Value>> {
        messages
            .iter()
            .map(|m| HashMap::from([("message".to_string(), serde_json::Value::String((*m).to_string()))]))
            .collect()
    }

    #[test]
    fn s3_pattern_matches_access_denied() {
        let matcher = LogPatternMatcher::new(job_failure_patterns());
        let matches = matcher.find_matches(&entries(&["AccessDenied when calling GetObject for s3://my-bucket/key"]));
        let (pattern, _caps) = matches.into_iter().find(|(p, _)| p.pattern_id == "s3_access_denied").expect("should match access-denied pattern");
        assert_eq!(pattern.pattern_id, "s3_access_denied");
    }

    #[test]
    fn s3_bucket_not_found_is_distinct_from_access_denied() {
        let matcher = LogPatternMatcher::new(job_failure_patterns());
        let matches = matcher.find_matches(&entries(&["botocore.exceptions.ClientError: NoSuchBucket"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0.pattern_id, "s3_bucket_not_found");
    }

    #[test]
    fn crashloop_database_connection_extracts_db_type() {
        let matcher = LogPatternMatcher::new(crashloop_patterns());
        let matches = matcher.find_matches(&entries(&["OperationalError: could not connect to server.*PostgreSQL unreachable"]));
        let (pattern, caps) = matches.into_iter().find(|(p, _)| p.pattern_id == "crashloop_database_connection").expect("should match db pattern");
        assert_eq!(pattern.confidence, 80);
        assert_eq!(caps.get("db_type").map(String::as_str), Some("PostgreSQL"));
    }

    #[test]
    fn find_matches_runs_every_pattern_once_not_first_match_wins() {
        let matcher = LogPatternMatcher::new(crashloop_patterns());
        let matches = matcher.find_matches(&entries(&["Connection refused talking to redis", "Permission denied writing to /data"]));
        let ids: Vec<_> = matches.iter().map(|(p, _)| p.pattern_id).collect();
        assert!(ids.contains(&"crashloop_dependency_connection"));
        assert!(ids.contains(&"crashloop_permission_denied"));
    }

    #[test]
    fn missing_placeholder_context_never_panics() {
        let pattern = s3_credentials_error_pattern();
        let caps = pattern.extract_context("Unable to locate credentials");
        let rendered = resolve_placeholders(pattern.why_template, &caps);
        assert_eq!(rendered, "Job pod has no AWS credentials configured (IRSA not set up)");
    }
}
