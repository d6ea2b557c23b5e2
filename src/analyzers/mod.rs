//! Pipeline-stage analyzers that turn raw evidence into the structured
//! `Analysis.{noise,change,capacity}` insight bags consumed by scoring and
//! reporting. Distinct from [`crate::features`], which extracts per-field
//! signals rather than these higher-level, provider-querying analyses.

pub mod capacity;
pub mod changes;
pub mod noise;
