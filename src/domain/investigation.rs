use super::alert::{AlertInstance, TimeWindow};
use super::analysis::Analysis;
use super::evidence::Evidence;
use super::target::TargetRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The top-level record produced for every alert the agent investigates.
/// One `Investigation` is rendered to a Markdown report and persisted in
/// full as JSON; `meta` carries the canonical-family assignment and other
/// pipeline bookkeeping that doesn't deserve its own typed field (see
/// [`crate::pipeline::family`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Investigation {
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub alert: AlertInstance,
    pub time_window: TimeWindow,
    #[serde(default)]
    pub target: TargetRef,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

impl Investigation {
    pub fn new(alert: AlertInstance, time_window: TimeWindow) -> Self {
        Self {
            created_at: Utc::now(),
            alert,
            time_window,
            target: TargetRef::default(),
            evidence: Evidence::default(),
            analysis: Analysis::default(),
            errors: Vec::new(),
            meta: HashMap::new(),
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
