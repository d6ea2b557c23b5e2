//! Pluggable diagnostic module registry (spec.md §4.8, "C8 — pattern-based
//! diagnostic engine"). Ported from `agent/diagnostics/base.py` (module
//! protocol), `agent/diagnostics/registry.py`, and `agent/diagnostics/
//! engine.py`'s `run_diagnostics()`: modules are tried in registration
//! order, every applicable module's hypotheses are pooled, ranked
//! deterministically by `(-confidence, hypothesis_id)`, optionally
//! calibrated against similar resolved cases, and capped at 10 to keep the
//! report/UI concise.

pub mod crashloop;
pub mod job_failure;
pub mod memory_calibration;
pub mod patterns;

use crate::domain::analysis::Hypothesis;
use crate::domain::investigation::Investigation;
use memory_calibration::{maybe_boost_hypotheses_from_memory, CaseRetriever, NullCaseRetriever};

/// Cap applied to the final hypothesis list, matching `engine.py`'s
/// `hyps_sorted[:10]`.
const MAX_HYPOTHESES: usize = 10;

/// A diagnostic module inspects evidence already on the investigation (it
/// never performs its own I/O — collection happens in the pipeline's
/// evidence stage) and, when applicable, emits one or more [`Hypothesis`]
/// candidates.
pub trait DiagnosticModule: Send + Sync {
    /// Stable identifier used in `supporting_refs`/log lines.
    fn module_id(&self) -> &'static str;

    /// Whether this module has anything useful to say about `investigation`.
    fn applies(&self, investigation: &Investigation) -> bool;

    /// Collect any module-specific evidence this diagnosis needs beyond
    /// what the pipeline's generic evidence-collection stage already
    /// populated. Every default module reads evidence the pipeline already
    /// gathered and leaves this as a no-op; it exists on the trait so a
    /// future module can extend collection without reshaping the registry
    /// (mirrors `DiagnosticModule.collect` in `base.py`).
    fn collect(&self, _investigation: &mut Investigation) {}

    /// Produce hypotheses. Only called when [`Self::applies`] returned true.
    fn diagnose(&self, investigation: &Investigation) -> Vec<Hypothesis>;
}

/// Ordered collection of diagnostic modules, run in registration order.
pub struct DiagnosticRegistry {
    modules: Vec<Box<dyn DiagnosticModule>>,
}

impl DiagnosticRegistry {
    pub fn new() -> Self {
        Self { modules: Vec::new() }
    }

    /// The default registry: every diagnostic module this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crashloop::CrashLoopDiagnosticModule));
        registry.register(Box::new(job_failure::JobFailureDiagnosticModule));
        registry
    }

    pub fn register(&mut self, module: Box<dyn DiagnosticModule>) {
        self.modules.push(module);
    }

    /// Run every applicable module's `collect`, then `diagnose`, rank the
    /// pooled hypotheses deterministically, and cap the result. Uses
    /// [`NullCaseRetriever`] for memory calibration — equivalent to the
    /// original's `MEMORY_ENABLED=0` path, since this crate carries the
    /// calibration seam without a Postgres-backed case store (see
    /// `DESIGN.md`).
    pub fn run(&self, investigation: &Investigation) -> Vec<Hypothesis> {
        self.run_with_retriever(investigation, &NullCaseRetriever)
    }

    /// Same as [`Self::run`], but with an explicit [`CaseRetriever`] for
    /// callers that have wired up a real similar-case memory backend.
    pub fn run_with_retriever(&self, investigation: &Investigation, retriever: &dyn CaseRetriever) -> Vec<Hypothesis> {
        let mut hyps = Vec::new();
        for module in &self.modules {
            if module.applies(investigation) {
                hyps.extend(module.diagnose(investigation));
            }
        }

        rank(&mut hyps);
        maybe_boost_hypotheses_from_memory(investigation, &mut hyps, retriever);
        rank(&mut hyps);

        hyps.truncate(MAX_HYPOTHESES);
        hyps
    }
}

/// Deterministic ranking: confidence descending, then hypothesis_id
/// ascending, matching `sorted(hyps, key=lambda h: (-h.confidence_0_100,
/// h.hypothesis_id))`.
fn rank(hyps: &mut [Hypothesis]) {
    hyps.sort_by(|a, b| b.confidence_0_100.cmp(&a.confidence_0_100).then_with(|| a.hypothesis_id.cmp(&b.hypothesis_id)));
}

impl Default for DiagnosticRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertInstance, TimeWindow};
    use chrono::Utc;

    struct FixedModule {
        id: &'static str,
        hyps: Vec<Hypothesis>,
    }

    impl DiagnosticModule for FixedModule {
        fn module_id(&self) -> &'static str {
            self.id
        }
        fn applies(&self, _investigation: &Investigation) -> bool {
            true
        }
        fn diagnose(&self, _investigation: &Investigation) -> Vec<Hypothesis> {
            self.hyps.clone()
        }
    }

    fn hypothesis(id: &str, confidence: i32) -> Hypothesis {
        Hypothesis { hypothesis_id: id.to_string(), title: id.to_string(), confidence_0_100: confidence, why: Vec::new(), supporting_refs: Vec::new(), counter_refs: Vec::new(), next_tests: Vec::new(), proposed_actions: Vec::new() }
    }

    fn investigation() -> Investigation {
        let alert = AlertInstance::default();
        let window = TimeWindow { window: "15m".to_string(), start_time: Utc::now(), end_time: Utc::now() };
        Investigation::new(alert, window)
    }

    #[test]
    fn ties_break_on_hypothesis_id_ascending() {
        let mut registry = DiagnosticRegistry::new();
        registry.register(Box::new(FixedModule { id: "m", hyps: vec![hypothesis("zeta", 50), hypothesis("alpha", 50)] }));
        let hyps = registry.run(&investigation());
        assert_eq!(hyps[0].hypothesis_id, "alpha");
        assert_eq!(hyps[1].hypothesis_id, "zeta");
    }

    #[test]
    fn result_is_capped_at_ten() {
        let mut registry = DiagnosticRegistry::new();
        let hyps: Vec<Hypothesis> = (0..15).map(|i| hypothesis(&format!("h{i:02}"), 50)).collect();
        registry.register(Box::new(FixedModule { id: "m", hyps }));
        assert_eq!(registry.run(&investigation()).len(), 10);
    }
}
