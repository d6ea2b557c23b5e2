//! Image-reference parsing and pull-error classification for the
//! ImagePullBackOff/ErrImagePull branch of `pod_not_healthy` scoring.
//! There is no single upstream source module for this (the original
//! implementation's `agent/image_pull.py` was not part of the retrieval
//! pack); shaped to match the evidence fields `score_pod_not_healthy`
//! reads (`image_pull_diagnostics.{image,error_bucket,error_evidence,
//! ecr_check,service_account_name,service_account_image_pull_secrets}`)
//! and the worked ECR scenario in spec.md.

use once_cell::sync::Lazy;
use regex::Regex;

/// A container image reference split into repository + tag/digest, with
/// ECR-specific fields populated when the registry host matches the
/// `<account>.dkr.ecr.<region>.amazonaws.com` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    pub raw: String,
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    pub is_ecr: bool,
    pub ecr_region: Option<String>,
}

static ECR_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.dkr\.ecr\.([a-z0-9-]+)\.amazonaws\.com(?:\.cn)?$").unwrap());

/// Parse a Docker-style image reference (`registry/repo:tag` or
/// `registry/repo@sha256:digest`). Best-effort: never errors, returns a
/// zero-value `ImageRef` for an empty input.
pub fn parse_image_ref(image: &str) -> ImageRef {
    let raw = image.trim().to_string();
    if raw.is_empty() {
        return ImageRef::default();
    }

    let (without_digest, digest) = match raw.split_once('@') {
        Some((left, right)) => (left.to_string(), Some(right.to_string())),
        None => (raw.clone(), None),
    };

    // A registry host segment contains a `.` or `:` (port) before the first
    // `/`; otherwise the first segment is part of the repository path.
    let mut parts = without_digest.splitn(2, '/');
    let first = parts.next().unwrap_or("");
    let rest = parts.next();

    let (registry, repo_and_tag) = if rest.is_some() && (first.contains('.') || first.contains(':')) {
        (Some(first.to_string()), rest.unwrap().to_string())
    } else {
        (None, without_digest.clone())
    };

    let (repository, tag) = if digest.is_some() {
        (repo_and_tag, None)
    } else {
        match repo_and_tag.rsplit_once(':') {
            // Guard against mistaking a port-bearing registry for a tag
            // separator when there was no explicit registry segment.
            Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), Some(tag.to_string())),
            _ => (repo_and_tag, None),
        }
    };

    let (is_ecr, ecr_region) = match &registry {
        Some(host) => match ECR_HOST_RE.captures(host) {
            Some(caps) => (true, Some(caps[2].to_string())),
            None => (false, None),
        },
        None => (false, None),
    };

    ImageRef { raw, registry, repository, tag, digest, is_ecr, ecr_region }
}

/// Coarse classification of a kubelet image-pull failure message, plus a
/// short evidence excerpt to surface verbatim in the verdict.
pub fn classify_pull_error(message: &str) -> (Option<String>, Option<String>) {
    let m = message.trim();
    if m.is_empty() {
        return (None, None);
    }
    let lower = m.to_ascii_lowercase();
    let excerpt = || Some(truncate(m, 200));

    if lower.contains("not found") || lower.contains("notfound") || lower.contains("manifest unknown") {
        return (Some("not_found".to_string()), excerpt());
    }
    if lower.contains("unauthorized")
        || lower.contains("authentication required")
        || lower.contains("access denied")
        || lower.contains("denied:")
        || lower.contains("403")
    {
        return (Some("auth".to_string()), excerpt());
    }
    if lower.contains("x509") || lower.contains("certificate") || lower.contains("tls") {
        return (Some("tls".to_string()), excerpt());
    }
    if lower.contains("timeout")
        || lower.contains("no such host")
        || lower.contains("connection refused")
        || lower.contains("i/o timeout")
        || lower.contains("dial tcp")
    {
        return (Some("network".to_string()), excerpt());
    }
    (None, excerpt())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ecr_image_with_tag() {
        let img = parse_image_ref("123456789012.dkr.ecr.us-east-1.amazonaws.com/my-app:v1.2.3");
        assert!(img.is_ecr);
        assert_eq!(img.ecr_region.as_deref(), Some("us-east-1"));
        assert_eq!(img.repository, "my-app");
        assert_eq!(img.tag.as_deref(), Some("v1.2.3"));
    }

    #[test]
    fn parses_digest_reference() {
        let img = parse_image_ref("docker.io/library/nginx@sha256:abcd1234");
        assert_eq!(img.digest.as_deref(), Some("sha256:abcd1234"));
        assert!(img.tag.is_none());
    }

    #[test]
    fn classifies_not_found() {
        let (bucket, _) = classify_pull_error("manifest unknown: NotFound");
        assert_eq!(bucket.as_deref(), Some("not_found"));
    }

    #[test]
    fn classifies_auth() {
        let (bucket, _) = classify_pull_error("pull access denied, repository does not exist or may require auth");
        assert_eq!(bucket.as_deref(), Some("auth"));
    }
}
