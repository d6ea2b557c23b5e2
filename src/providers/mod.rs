//! Thin clients for every external system the agent reads evidence from or
//! writes results to. Each provider follows the `reqwest::Client::builder()
//! .timeout(...)` + `thiserror` pattern grounded in
//! `examples/syncable-dev-syncable-cli/src/analyzer/k8s_optimize/prometheus_client.rs`
//! and `.../src/platform/api/client.rs`.

pub mod alertmanager;
pub mod aws;
pub mod github;
pub mod kubernetes;
pub mod logs;
pub mod object_store;
pub mod postgres;
pub mod prometheus;
pub mod queue;
