//! Pairwise agreement between instruments.
//!
//! Samples are aligned by `sequence_index`, never by timestamp: instruments are
//! polled one after another inside a tick, so their wall-clock times differ by
//! design while the tick is shared.

use ammeter_core::InstrumentSeries;
use serde::Serialize;
use std::collections::BTreeMap;

/// Agreement between instruments `a` and `b`.
///
/// Every statistic is `None` when the two never succeeded on the same tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseAgreement {
    /// First instrument in sampling order.
    pub a: String,
    /// Second instrument in sampling order.
    pub b: String,
    /// Ticks where both were ok.
    pub paired_count: usize,
    /// Mean absolute difference.
    pub mae: Option<f64>,
    /// Root-mean-square difference.
    pub rmse: Option<f64>,
    /// Pearson correlation; needs two pairs and non-zero variance on both sides.
    pub correlation: Option<f64>,
}

impl PairwiseAgreement {
    /// Compare two series over the ticks where both succeeded.
    pub fn between(a: &InstrumentSeries, b: &InstrumentSeries) -> Self {
        let a_ok: BTreeMap<u64, f64> = a
            .measurements()
            .iter()
            .filter_map(|m| m.value().map(|v| (m.sequence_index(), v)))
            .collect();
        let pairs: Vec<(f64, f64)> = b
            .measurements()
            .iter()
            .filter_map(|m| {
                let vb = m.value()?;
                let va = a_ok.get(&m.sequence_index())?;
                Some((*va, vb))
            })
            .collect();

        let n = pairs.len();
        let (mae, rmse) = if n == 0 {
            (None, None)
        } else {
            let abs_sum: f64 = pairs.iter().map(|(x, y)| (x - y).abs()).sum();
            let sq_sum: f64 = pairs.iter().map(|(x, y)| (x - y).powi(2)).sum();
            (Some(abs_sum / n as f64), Some((sq_sum / n as f64).sqrt()))
        };

        Self {
            a: a.instrument_id().to_string(),
            b: b.instrument_id().to_string(),
            paired_count: n,
            mae,
            rmse,
            correlation: pearson(&pairs),
        }
    }

    /// Whether `instrument_id` is one side of this pair.
    pub fn involves(&self, instrument_id: &str) -> bool {
        self.a == instrument_id || self.b == instrument_id
    }

    /// Report key, `a__b`.
    pub fn key(&self) -> String {
        format!("{}__{}", self.a, self.b)
    }
}

/// Every unordered pair of `series`, `(a, b)` with `a` earlier in the slice.
pub fn all_pairs(series: &[InstrumentSeries]) -> Vec<PairwiseAgreement> {
    let mut out = Vec::with_capacity(series.len() * series.len().saturating_sub(1) / 2);
    for (i, a) in series.iter().enumerate() {
        for b in &series[i + 1..] {
            out.push(PairwiseAgreement::between(a, b));
        }
    }
    out
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}
