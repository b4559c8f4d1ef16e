//! Composite reliability ranking.
//!
//! ```text
//! score = 0.5 * success_rate + 0.3 * agreement_score + 0.2 * stability_score
//!
//! agreement_score = 1 / (1 + mean MAE over the instrument's defined pairs)
//! stability_score = 1 / (1 + std_dev)
//! ```
//!
//! Either sub-score falls back to 0.5 when undefined. Ties break on success
//! rate, then agreement, then stability (all descending), then instrument id
//! ascending. All comparisons use `f64::total_cmp`, so the order is total.

use crate::agreement::PairwiseAgreement;
use crate::stats::StatisticalSummary;
use serde::Serialize;
use std::cmp::Ordering;

/// Weight of the success rate.
pub const SUCCESS_WEIGHT: f64 = 0.5;
/// Weight of the agreement score.
pub const AGREEMENT_WEIGHT: f64 = 0.3;
/// Weight of the stability score.
pub const STABILITY_WEIGHT: f64 = 0.2;
/// Sub-score used when agreement or stability is undefined.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// One instrument's place in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    /// 1-based position.
    pub rank: usize,
    /// Instrument ranked.
    pub instrument_id: String,
    /// Weighted composite.
    pub score: f64,
    /// Ok fraction.
    pub success_rate: f64,
    /// Agreement sub-score.
    pub agreement_score: f64,
    /// Stability sub-score.
    pub stability_score: f64,
}

/// Instruments from most to least reliable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReliabilityRanking {
    entries: Vec<RankEntry>,
}

impl ReliabilityRanking {
    /// Rank the instruments described by `summaries`.
    pub fn compute(summaries: &[StatisticalSummary], pairs: &[PairwiseAgreement]) -> Self {
        let mut entries: Vec<RankEntry> = summaries
            .iter()
            .map(|s| {
                let agreement_score = agreement_score(&s.instrument_id, pairs);
                let stability_score = s.std_dev.map_or(NEUTRAL_SCORE, |sd| 1.0 / (1.0 + sd));
                RankEntry {
                    rank: 0,
                    instrument_id: s.instrument_id.clone(),
                    score: SUCCESS_WEIGHT * s.success_rate
                        + AGREEMENT_WEIGHT * agreement_score
                        + STABILITY_WEIGHT * stability_score,
                    success_rate: s.success_rate,
                    agreement_score,
                    stability_score,
                }
            })
            .collect();

        entries.sort_by(compare);
        for (i, e) in entries.iter_mut().enumerate() {
            e.rank = i + 1;
        }
        Self { entries }
    }

    /// Entries, best first.
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// Most reliable instrument.
    pub fn best(&self) -> Option<&RankEntry> {
        self.entries.first()
    }

    /// Instrument ids, best first.
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.instrument_id.as_str()).collect()
    }
}

fn agreement_score(instrument_id: &str, pairs: &[PairwiseAgreement]) -> f64 {
    let maes: Vec<f64> = pairs
        .iter()
        .filter(|p| p.involves(instrument_id))
        .filter_map(|p| p.mae)
        .collect();
    if maes.is_empty() {
        return NEUTRAL_SCORE;
    }
    let mean_mae = maes.iter().sum::<f64>() / maes.len() as f64;
    1.0 / (1.0 + mean_mae)
}

fn compare(x: &RankEntry, y: &RankEntry) -> Ordering {
    y.score
        .total_cmp(&x.score)
        .then_with(|| y.success_rate.total_cmp(&x.success_rate))
        .then_with(|| y.agreement_score.total_cmp(&x.agreement_score))
        .then_with(|| y.stability_score.total_cmp(&x.stability_score))
        .then_with(|| x.instrument_id.cmp(&y.instrument_id))
}
