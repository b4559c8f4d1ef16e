//! The analysis entry point.

use crate::agreement::{all_pairs, PairwiseAgreement};
use crate::ranking::ReliabilityRanking;
use crate::stats::StatisticalSummary;
use ammeter_core::SampledRun;
use serde::Serialize;
use tracing::debug;

/// Everything derived from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    /// One summary per instrument, in sampling order.
    pub per_instrument: Vec<StatisticalSummary>,
    /// One entry per unordered instrument pair.
    pub pairwise: Vec<PairwiseAgreement>,
    /// Reliability ordering.
    pub ranking: ReliabilityRanking,
}

impl AnalysisSummary {
    /// Summary of one instrument.
    pub fn summary_for(&self, instrument_id: &str) -> Option<&StatisticalSummary> {
        self.per_instrument
            .iter()
            .find(|s| s.instrument_id == instrument_id)
    }

    /// Agreement of one pair, in either order.
    pub fn pair(&self, x: &str, y: &str) -> Option<&PairwiseAgreement> {
        self.pairwise
            .iter()
            .find(|p| (p.a == x && p.b == y) || (p.a == y && p.b == x))
    }
}

/// Analyse a run. Pure: the same run always yields the same summary.
pub fn analyze(run: &SampledRun) -> AnalysisSummary {
    let per_instrument: Vec<StatisticalSummary> = run
        .series()
        .iter()
        .map(StatisticalSummary::from_series)
        .collect();
    let pairwise = all_pairs(run.series());
    let ranking = ReliabilityRanking::compute(&per_instrument, &pairwise);

    debug!(
        instruments = per_instrument.len(),
        pairs = pairwise.len(),
        best = ranking.best().map(|e| e.instrument_id.as_str()),
        "Analysis complete"
    );

    AnalysisSummary {
        per_instrument,
        pairwise,
        ranking,
    }
}
