//! Ported from `score_pod_not_healthy()` in `agent/pipeline/scoring.py` —
//! the most root-cause-specific family: the verdict templating branches on
//! whichever of FailedScheduling / volume events / ImagePullBackOff /
//! CreateContainerConfigError / CrashLoopBackOff / OOMKilled / Error /
//! not-ready conditions is found first, in that priority order.

use crate::domain::analysis::{DerivedFeatures, DeterministicScores, DeterministicVerdict, K8sContainerLastTerminated, K8sContainerWaiting, K8sEventSummary};
use crate::domain::investigation::Investigation;
use crate::image_pull::{classify_pull_error, parse_image_ref};
use crate::scoring::{add, base_noise, clamp_0_100, firing_instances};
use crate::domain::analysis::Classification;
use serde_json::Value;

pub fn score(investigation: &Investigation, f: &DerivedFeatures) -> (DeterministicScores, DeterministicVerdict) {
    let mut breakdown = Vec::new();
    let mut reasons = Vec::new();
    let mut impact = 0;
    let mut confidence = 0;

    let phase = f.k8s.pod_phase.as_deref().unwrap_or("").to_ascii_lowercase();
    let ready = f.k8s.ready;
    let waiting = f.k8s.waiting_reason.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let alertname = investigation.alert.label("alertname").unwrap_or("");
    let lname = alertname.to_ascii_lowercase();
    let severity = investigation.alert.label("severity").unwrap_or("").to_ascii_lowercase();
    let firing = firing_instances(investigation);

    if f.metrics.pod_unhealthy_phase_observed == Some(true) {
        impact += add(&mut breakdown, &mut reasons, "POD_UNHEALTHY_SIGNAL", 50, Some("metrics.pod_unhealthy_phase_observed"), Some("phase signal > 0".to_string()));
    }
    if severity == "critical" || lname.contains("critical") {
        impact += add(&mut breakdown, &mut reasons, "SEVERITY_CRITICAL", 20, Some("labels.severity"), Some(format!("severity={}", if severity.is_empty() { "n/a" } else { &severity })));
    }
    if let Some(fi) = firing {
        if fi >= 50.0 {
            impact += add(&mut breakdown, &mut reasons, "IMPACT_WIDESPREAD", 25, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={}", fi as i64)));
        } else if fi >= 20.0 {
            impact += add(&mut breakdown, &mut reasons, "IMPACT_BROAD", 15, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={}", fi as i64)));
        } else if fi >= 5.0 {
            impact += add(&mut breakdown, &mut reasons, "IMPACT_MULTI", 5, Some("noise.prometheus.firing_instances"), Some(format!("firing_instances={}", fi as i64)));
        }
    }
    match phase.as_str() {
        "failed" => impact += add(&mut breakdown, &mut reasons, "POD_PHASE_FAILED", 40, Some("k8s.pod_phase"), Some("phase=Failed".to_string())),
        "pending" => impact += add(&mut breakdown, &mut reasons, "POD_PHASE_PENDING", 35, Some("k8s.pod_phase"), Some("phase=Pending".to_string())),
        "unknown" => impact += add(&mut breakdown, &mut reasons, "POD_PHASE_UNKNOWN", 30, Some("k8s.pod_phase"), Some("phase=Unknown".to_string())),
        _ => {}
    }
    if ready == Some(false) {
        impact += add(&mut breakdown, &mut reasons, "POD_NOT_READY", 25, Some("k8s.ready"), Some("ready=False".to_string()));
    }
    let rr = f.k8s.restart_rate_5m_max;
    if rr.map(|v| v >= 3.0).unwrap_or(false) {
        impact += add(&mut breakdown, &mut reasons, "RESTART_RATE_HIGH", 30, Some("k8s.restart_rate_5m_max"), Some(format!("restart_rate_5m_max={:.2}", rr.unwrap())));
    } else if rr.map(|v| v >= 1.0).unwrap_or(false) {
        impact += add(&mut breakdown, &mut reasons, "RESTART_RATE_ELEVATED", 15, Some("k8s.restart_rate_5m_max"), Some(format!("restart_rate_5m_max={:.2}", rr.unwrap())));
    }
    if let Some(w) = waiting {
        if matches!(w, "CrashLoopBackOff" | "ImagePullBackOff" | "ErrImagePull" | "CreateContainerConfigError") {
            impact += add(&mut breakdown, &mut reasons, "WAITING_REASON_CRITICAL", 35, Some("k8s.waiting_reason"), Some(format!("reason={w}")));
        } else if matches!(w, "ContainerCreating" | "PodInitializing") {
            impact += add(&mut breakdown, &mut reasons, "WAITING_REASON_PROGRESSING", 10, Some("k8s.waiting_reason"), Some(format!("reason={w}")));
        }
    }

    if f.metrics.pod_unhealthy_phase_observed == Some(true) {
        confidence += add(&mut breakdown, &mut reasons, "EVID_PHASE_METRIC", 35, Some("metrics.pod_unhealthy_phase_observed"), Some("kube-state-metrics corroborates".to_string()));
    }
    let has_namespace = investigation.alert.label("namespace").is_some() || investigation.alert.label("Namespace").is_some();
    let has_pod = investigation.alert.label("pod").is_some() || investigation.alert.label("pod_name").is_some() || investigation.alert.label("podName").is_some();
    if has_namespace && has_pod {
        confidence += add(&mut breakdown, &mut reasons, "EVID_TARGET_LABELS", 20, Some("labels.namespace,labels.pod"), Some("namespace+pod present".to_string()));
    }
    if matches!(phase.as_str(), "pending" | "failed" | "unknown") {
        confidence += add(&mut breakdown, &mut reasons, "EVID_K8S_PHASE", 25, Some("k8s.pod_phase"), Some(format!("phase={}", f.k8s.pod_phase.clone().unwrap_or_default())));
    }
    if ready.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_K8S_READY_FIELD", 10, Some("k8s.ready"), Some(format!("ready={}", ready.unwrap())));
    }
    if f.k8s.restart_count.is_some() || f.k8s.restart_rate_5m_max.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_RESTART_SIGNAL", 10, Some("k8s.restart_count,k8s.restart_rate_5m_max"), Some("restart signal present".to_string()));
    }
    if f.k8s.warning_events_count.is_some() {
        confidence += add(&mut breakdown, &mut reasons, "EVID_EVENTS_QUERIED", 5, Some("k8s.warning_events_count"), Some(format!("warnings={}", f.k8s.warning_events_count.unwrap())));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "logs") {
        add(&mut breakdown, &mut reasons, "LOGS_UNAVAILABLE", 0, Some("quality.missing_inputs"), Some("logs unavailable".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "k8s.pod_info") {
        add(&mut breakdown, &mut reasons, "K8S_CONTEXT_MISSING", 0, Some("quality.missing_inputs"), Some("k8s pod_info missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.namespace") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_NAMESPACE", -30, Some("quality.missing_inputs"), Some("namespace label missing".to_string()));
    }
    if f.quality.missing_inputs.iter().any(|m| m == "labels.pod") {
        confidence += add(&mut breakdown, &mut reasons, "MISSING_LABEL_POD", -30, Some("quality.missing_inputs"), Some("pod label missing".to_string()));
    }

    let has_rootcause = waiting.is_some()
        || !f.k8s.not_ready_conditions.is_empty()
        || !f.k8s.container_waiting_reasons_top.is_empty()
        || !f.k8s.container_last_terminated_top.is_empty()
        || !f.k8s.recent_event_reasons_top.is_empty()
        || f.k8s.status_reason.is_some()
        || f.k8s.status_message.is_some();
    let lacks_rootcause = ready.is_none()
        && f.k8s.restart_count.is_none()
        && f.k8s.restart_rate_5m_max.is_none()
        && matches!(f.k8s.warning_events_count, None | Some(0))
        && !has_rootcause;
    if lacks_rootcause {
        confidence += add(
            &mut breakdown,
            &mut reasons,
            "MISSING_ROOTCAUSE_SIGNALS",
            -15,
            Some("k8s.ready,k8s.restart_count,k8s.warning_events_count,k8s.waiting_reason"),
            Some("ready/restarts/events/waiting_reason not available".to_string()),
        );
    }

    let mut noise = 0;
    if let Some(ni) = &investigation.analysis.noise {
        let flap_score = ni.flap.as_ref().map(|f| f.flap_score_0_100).unwrap_or(0);
        if flap_score >= 80 {
            noise += add(&mut breakdown, &mut reasons, "NOISE_FLAP_HIGH", 40, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
        } else if flap_score >= 40 {
            noise += add(&mut breakdown, &mut reasons, "NOISE_FLAP_MED", 20, Some("noise.flap.flap_score_0_100"), Some(format!("flap_score={flap_score}")));
        }
        let mut eph: Vec<String> = ni.cardinality.as_ref().map(|c| c.ephemeral_labels_present.clone()).unwrap_or_default();
        eph.retain(|e| !matches!(e.as_str(), "job" | "instance" | "endpoint" | "service" | "container"));
        if investigation.target.workload_kind.is_some() && investigation.target.workload_name.is_some() {
            eph.retain(|e| e != "pod" && e != "pod_name");
        }
        if !eph.is_empty() {
            let delta = (10 * eph.len() as i32).min(30);
            let why = eph.iter().take(6).cloned().collect::<Vec<_>>().join(",");
            noise += add(&mut breakdown, &mut reasons, "NOISE_CARDINALITY", delta, Some("noise.cardinality.ephemeral_labels_present"), Some(why));
        }
    }
    if f.metrics.pod_unhealthy_phase_observed == Some(true) {
        noise += add(&mut breakdown, &mut reasons, "STRONG_SYMPTOM_POD_UNHEALTHY", -10, Some("metrics.pod_unhealthy_phase_observed"), Some("strong symptom reduces noise".to_string()));
    }

    impact = clamp_0_100(impact);
    confidence = clamp_0_100(confidence);
    noise = clamp_0_100(noise);

    let classification = if confidence < 30 {
        Classification::Artifact
    } else if noise >= 70 {
        Classification::Noisy
    } else if impact >= 60 && confidence >= 60 && noise <= 60 {
        Classification::Actionable
    } else {
        Classification::Informational
    };

    let phase_txt = f.k8s.pod_phase.clone().unwrap_or_else(|| "Unknown".to_string());
    let events = &f.k8s.recent_event_reasons_top;
    let waitings = &f.k8s.container_waiting_reasons_top;
    let last_terms = &f.k8s.container_last_terminated_top;
    let conds = &f.k8s.not_ready_conditions;

    let find_event = |set: &[&str]| -> Option<&K8sEventSummary> {
        events.iter().find(|e| set.contains(&e.reason.as_deref().unwrap_or("")))
    };
    let find_waiting = |set: &[&str]| -> Option<&K8sContainerWaiting> {
        waitings.iter().find(|w| set.contains(&w.reason.as_deref().unwrap_or("")))
    };
    let find_last_term = |set: &[&str]| -> Option<&K8sContainerLastTerminated> {
        last_terms.iter().find(|t| set.contains(&t.reason.as_deref().unwrap_or("")))
    };

    let ev_sched = find_event(&["FailedScheduling"]);
    let ev_vol = find_event(&["FailedMount", "FailedAttachVolume", "FailedUnMount", "FailedMapVolume"]);
    let w_img = find_waiting(&["ImagePullBackOff", "ErrImagePull"]);
    let w_cfg = find_waiting(&["CreateContainerConfigError", "CreateContainerError"]);
    let w_crash = find_waiting(&["CrashLoopBackOff"]);
    let lt_oom = find_last_term(&["OOMKilled"]);
    let lt_err = find_last_term(&["Error"]);

    let missing_k8s_context = f.quality.missing_inputs.iter().any(|m| m == "k8s.pod_info");
    let mut one_liner = if missing_k8s_context && f.metrics.pod_unhealthy_phase_observed == Some(true) {
        let scope_txt = firing.map(|fi| format!("{} instances", fi as i64)).unwrap_or_else(|| "multiple instances".to_string());
        format!(
            "Pod health alert fired for ~{scope_txt}; kube-state-metrics indicates unhealthy phase, but agent could not fetch pod status/events (K8s context missing)."
        )
    } else {
        format!("Pod phase is `{phase_txt}` in this window.")
    };
    if ready == Some(false) {
        one_liner.push_str(" Ready=`False`.");
    } else if ready == Some(true) {
        one_liner.push_str(" Ready=`True`.");
    }

    let mut next_steps: Vec<String> = Vec::new();
    if lacks_rootcause {
        next_steps.push(
            "Collect pod status details (conditions + containerStatuses waiting/terminated) and recent Pod Events; current evidence lacks root-cause signals.".to_string(),
        );
    }

    if let Some(ev) = ev_sched {
        let msg = ev.message.clone().unwrap_or_default();
        one_liner = format!("Pod {phase_txt}: FailedScheduling{}", if msg.is_empty() { String::new() } else { format!(" — {msg}") });
        next_steps.extend([
            "Check the event message for the exact constraint (resources/taints/affinity/quotas).".to_string(),
            "Validate CPU/memory requests vs available node capacity and namespace quotas.".to_string(),
            "Inspect node selectors/taints/tolerations and affinity rules for mismatches.".to_string(),
        ]);
    } else if let Some(ev) = ev_vol {
        let r = ev.reason.clone().unwrap_or_default();
        let msg = ev.message.clone().unwrap_or_default();
        one_liner = format!("Pod {phase_txt}: {r}{}", if msg.is_empty() { String::new() } else { format!(" — {msg}") });
        next_steps.extend([
            "Check PVC/PV status and whether volumes are bound and accessible.".to_string(),
            "Inspect CSI driver/controller health and node-level storage connectivity.".to_string(),
            "Review recent storage-related changes (storage class, IAM, nodes).".to_string(),
        ]);
    } else if let Some(w) = w_img {
        let c = if w.container.is_empty() { "container".to_string() } else { w.container.clone() };
        let r = w.reason.clone().unwrap_or_else(|| "ImagePull".to_string());
        let msg = w.message.clone().unwrap_or_default();
        one_liner = format!("Container `{c}`: {r}{}", if msg.is_empty() { String::new() } else { format!(" — {msg}") });
        image_pull_next_steps(investigation, &msg, &mut next_steps);
    } else if let Some(w) = w_cfg {
        let c = if w.container.is_empty() { "container".to_string() } else { w.container.clone() };
        let r = w.reason.clone().unwrap_or_else(|| "CreateContainerConfigError".to_string());
        let msg = w.message.clone().unwrap_or_default();
        one_liner = format!("Container `{c}`: {r}{}", if msg.is_empty() { String::new() } else { format!(" — {msg}") });
        next_steps.extend([
            "Check referenced ConfigMaps/Secrets and env var valueFrom fields for missing keys.".to_string(),
            "Review container spec (command/args/volumes) for invalid references.".to_string(),
            "Use Events/describe output to identify the exact missing resource.".to_string(),
        ]);
    } else if let Some(w) = w_crash {
        let c = if w.container.is_empty() { "container".to_string() } else { w.container.clone() };
        let last_for_container = last_terms.iter().find(|t| t.container == c).or(lt_oom).or(lt_err);
        let mut tail = String::new();
        if let Some(t) = last_for_container {
            let lr = t.reason.clone().unwrap_or_else(|| "terminated".to_string());
            if t.reason.is_some() || t.exit_code.is_some() {
                tail = format!(" (last={lr}, exitCode={:?})", t.exit_code);
            }
        }
        one_liner = format!("Container `{c}`: CrashLoopBackOff{tail}");
        next_steps.extend([
            "Inspect previous container logs (`kubectl logs --previous`) and current startup logs.".to_string(),
            "Check recent config/deploy changes and dependency connectivity (DB, cache, etc.).".to_string(),
            "If exitCode=137/143, treat as termination/resource pressure (OOM/signal).".to_string(),
        ]);
    } else if let Some(t) = lt_oom {
        let c = if t.container.is_empty() { "container".to_string() } else { t.container.clone() };
        one_liner = format!("Container `{c}`: last terminated OOMKilled{}", t.exit_code.map(|ec| format!(" (exitCode={ec})")).unwrap_or_default());
        next_steps.extend([
            "Review memory requests/limits and recent memory usage; increase limit if justified.".to_string(),
            "Look for allocation spikes and GC/heap growth in app metrics/logs.".to_string(),
            "Check node memory pressure / eviction signals.".to_string(),
        ]);
    } else if let Some(t) = lt_err {
        let c = if t.container.is_empty() { "container".to_string() } else { t.container.clone() };
        one_liner = format!("Container `{c}`: last terminated Error{}", t.exit_code.map(|ec| format!(" (exitCode={ec})")).unwrap_or_default());
        next_steps.extend([
            "Inspect application logs around the termination time and the error path.".to_string(),
            "Validate configuration/env vars and dependency health (DB, cache, network).".to_string(),
            "Correlate with recent rollout/config changes.".to_string(),
        ]);
    } else if let Some(c0) = conds.first() {
        one_liner = format!(
            "Pod {phase_txt}: condition `{}` is `{}`{}",
            c0.kind,
            c0.status,
            c0.reason.as_ref().map(|r| format!(" (reason={r})")).unwrap_or_default()
        );
        next_steps.extend([
            "Use `kubectl describe pod` to inspect condition reason/message and related Events.".to_string(),
            "If PodScheduled=False: treat as scheduling constraint (taints/affinity/resources).".to_string(),
            "If ContainersReady/Ready=False: inspect container states (waiting/terminated) and logs.".to_string(),
        ]);
    } else if f.k8s.status_reason.is_some() || f.k8s.status_message.is_some() {
        let reason = f.k8s.status_reason.clone().unwrap_or_else(|| "unhealthy".to_string());
        one_liner = format!(
            "Pod {phase_txt}: {reason}{}",
            f.k8s.status_message.as_ref().map(|m| format!(" — {m}")).unwrap_or_default()
        );
        next_steps.extend([
            "Check pod status reason/message and correlate with conditions + Events.".to_string(),
            "Inspect containerStatuses (waiting/terminated/lastState) for the immediate cause.".to_string(),
            "Correlate with recent workload rollout/config changes.".to_string(),
        ]);
    } else {
        match phase.as_str() {
            "pending" => next_steps.extend([
                "Check Events for scheduling and volume mount issues: FailedScheduling / FailedMount / FailedAttachVolume.".to_string(),
                "Check node capacity/taints/tolerations and whether required PVCs exist and are bound.".to_string(),
            ]),
            "failed" => next_steps.extend([
                "Inspect container last termination reason (exitCode, OOMKilled, Error) and pod status reason/message.".to_string(),
                "Confirm whether this is a Job/one-shot pod vs a long-running Deployment replica.".to_string(),
            ]),
            "unknown" => next_steps.extend([
                "Check node readiness and kubelet connectivity for the node running this pod.".to_string(),
                "Review cluster/network issues that could prevent status updates (API/kubelet).".to_string(),
            ]),
            _ => next_steps.push("Review pod Events and conditions to determine why it is marked unhealthy.".to_string()),
        }
    }

    next_steps.push("Correlate with recent workload rollout changes if any occurred near the alert window.".to_string());
    next_steps.truncate(6);

    let verdict = DeterministicVerdict {
        classification,
        severity: None,
        primary_driver: "pod_not_healthy".to_string(),
        one_liner,
        next_steps,
    };

    (DeterministicScores { impact_score: impact, confidence_score: confidence, noise_score: noise, reason_codes: reasons, breakdown }, verdict)
}

/// Evidence-driven next steps for the ImagePullBackOff/ErrImagePull branch:
/// classify the kubelet message, parse the image ref (ECR-aware), and
/// surface ServiceAccount imagePullSecrets wiring when present.
fn image_pull_next_steps(investigation: &Investigation, msg: &str, next_steps: &mut Vec<String>) {
    let diag = investigation.evidence.k8s.extra.get("image_pull_diagnostics").and_then(Value::as_object);

    let image = diag.and_then(|d| d.get("image")).and_then(Value::as_str).unwrap_or("");
    let img_ref = parse_image_ref(image);

    let (mut bucket, mut evidence) = diag
        .and_then(|d| d.get("error_bucket"))
        .and_then(Value::as_str)
        .map(|b| (Some(b.to_string()), diag.and_then(|d| d.get("error_evidence")).and_then(Value::as_str).map(str::to_string)))
        .unwrap_or((None, None));
    if bucket.is_none() {
        let (b, e) = classify_pull_error(msg);
        bucket = b;
        evidence = e;
    }

    if let Some(diag) = diag {
        let sa_name = diag.get("service_account_name").and_then(Value::as_str);
        let sa_pull = diag.get("service_account_image_pull_secrets").and_then(Value::as_array);
        if let (Some(name), Some(secrets)) = (sa_name, sa_pull) {
            if !name.trim().is_empty() && secrets.is_empty() {
                next_steps.push(format!("ServiceAccount `{name}` has **no** `imagePullSecrets` configured."));
            }
        }
    }

    match bucket.as_deref() {
        Some("not_found") => {
            if !img_ref.raw.is_empty() {
                if let Some(tag) = &img_ref.tag {
                    next_steps.push(format!("Registry reported **NotFound**; image tag likely missing: `{}:{}`", img_ref.repository, tag));
                } else if let Some(digest) = &img_ref.digest {
                    next_steps.push(format!("Registry reported **NotFound**; image digest likely missing: `{}@{}`", img_ref.repository, digest));
                } else {
                    next_steps.push(format!("Registry reported **NotFound** for image `{}` (repo/tag/digest may be wrong).", img_ref.raw));
                }
            } else {
                next_steps.push("Registry reported **NotFound**; image reference (repo/tag/digest) is likely wrong.".to_string());
            }
        }
        Some("auth") => next_steps.push("Registry reported **unauthorized/denied**; this is likely an auth/permissions issue (imagePullSecrets/IAM).".to_string()),
        Some("tls") => next_steps.push("Registry pull failed due to **TLS/certificate** errors; validate trust chain / proxy / registry certs on nodes.".to_string()),
        Some("network") => next_steps.push("Registry pull failed due to **network/DNS/timeouts**; validate node egress + DNS to the registry endpoint.".to_string()),
        _ => next_steps.push("Image pull failed; use the exact kubelet error to distinguish NotFound vs auth vs network/TLS.".to_string()),
    }

    if img_ref.is_ecr {
        if let Some(ecr_check) = diag.and_then(|d| d.get("ecr_check")).and_then(Value::as_object) {
            let status = ecr_check.get("status").and_then(Value::as_str).unwrap_or("");
            let detail = ecr_check.get("detail").and_then(Value::as_str).unwrap_or("");
            match status {
                "missing" => next_steps.push("ECR verification: **image not found** (tag/digest missing).".to_string()),
                "exists" => next_steps.push("ECR verification: image **exists**; focus on auth wiring or node reachability.".to_string()),
                s if s.starts_with("skipped") => next_steps.push(format!("ECR verification: not run ({detail}).")),
                _ => next_steps.push(format!("ECR verification: error ({detail}).")),
            }
        }
        if let Some(region) = &img_ref.ecr_region {
            if let Some(tag) = &img_ref.tag {
                next_steps.push(format!(
                    "AWS CLI: `aws ecr describe-images --region {region} --repository-name \"{}\" --image-ids imageTag={tag}`",
                    img_ref.repository
                ));
            } else if let Some(digest) = &img_ref.digest {
                next_steps.push(format!(
                    "AWS CLI: `aws ecr describe-images --region {region} --repository-name \"{}\" --image-ids imageDigest={digest}`",
                    img_ref.repository
                ));
            }
        }
    }

    if let Some(ev) = evidence {
        next_steps.push(format!("Error excerpt: `{ev}`"));
    }
}
