//! The canonical domain model — the single source of truth shared by
//! evidence gathering, analysis (noise/change/capacity), diagnostics,
//! scoring, and report rendering.
//!
//! Ported field-for-field from the Python `agent/core/models.py` this agent
//! was distilled from, using the strict/permissive split that file
//! documents: evidence payloads stay permissive (`#[serde(flatten)]` into a
//! `serde_json::Map`) because upstream label conventions vary widely across
//! clusters, while everything the agent itself computes (`Analysis` and its
//! children) is a closed, `deny_unknown_fields` shape.

pub mod alert;
pub mod analysis;
pub mod evidence;
pub mod investigation;
pub mod target;

pub use alert::{AlertInstance, TimeWindow};
pub use analysis::*;
pub use evidence::{AwsEvidence, Evidence, GitHubEvidence, K8sEvidence, LogsEvidence, MetricsEvidence};
pub use investigation::Investigation;
pub use target::TargetRef;
