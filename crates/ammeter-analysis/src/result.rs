//! A finished run together with its analysis.

use crate::engine::{analyze, AnalysisSummary};
use ammeter_core::SampledRun;

/// Raw sequences plus derived statistics, handed to persistence.
///
/// Built once from a completed run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    run: SampledRun,
    analysis: AnalysisSummary,
}

impl RunResult {
    /// Take ownership of `run` and analyse it.
    pub fn from_run(run: SampledRun) -> Self {
        let analysis = analyze(&run);
        Self { run, analysis }
    }

    /// Collected sequences.
    pub fn run(&self) -> &SampledRun {
        &self.run
    }

    /// Derived statistics.
    pub fn analysis(&self) -> &AnalysisSummary {
        &self.analysis
    }

    /// Split back into parts.
    pub fn into_parts(self) -> (SampledRun, AnalysisSummary) {
        (self.run, self.analysis)
    }
}
