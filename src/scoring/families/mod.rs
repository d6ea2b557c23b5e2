//! One scorer per closed alert family (see [`crate::pipeline::family`]),
//! each ported 1:1 from its `score_*` counterpart in
//! `agent/pipeline/scoring.py`.

pub mod crashloop;
pub mod cpu_throttling;
pub mod generic;
pub mod http_5xx;
pub mod job_failed;
pub mod k8s_rollout_health;
pub mod memory_pressure;
pub mod meta;
pub mod observability_pipeline;
pub mod oom_killed;
pub mod pod_not_healthy;
pub mod target_down;
