//! Descriptive statistics per instrument.

use ammeter_core::{DaqError, ErrorKind, InstrumentSeries};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Robust z-score above which an ok value counts as a statistical outlier.
pub const ROBUST_Z_THRESHOLD: f64 = 3.5;

/// Scales the median absolute deviation to a standard deviation under normality.
const MAD_SCALE: f64 = 1.4826;

/// Selectable summary statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Arithmetic mean.
    Mean,
    /// Median.
    Median,
    /// Population standard deviation.
    StdDev,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
}

impl Metric {
    /// Every metric, in report order.
    pub const ALL: [Metric; 5] = [
        Metric::Mean,
        Metric::Median,
        Metric::StdDev,
        Metric::Min,
        Metric::Max,
    ];

    /// Configuration and report name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Mean => "mean",
            Metric::Median => "median",
            Metric::StdDev => "std_dev",
            Metric::Min => "min",
            Metric::Max => "max",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DaqError::Configuration(format!("unknown statistical metric '{}'", s)))
    }
}

/// Summary of one instrument's sequence.
///
/// Value statistics cover ok measurements only and are `None` when there are
/// none. Corrupted values are still ok and are included; they are flagged
/// separately through `suspected_corrupted`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalSummary {
    /// Instrument this summary describes.
    pub instrument_id: String,
    /// Measurements collected.
    pub total: usize,
    /// Measurements with `ok == true`.
    pub ok_count: usize,
    /// `ok_count / total`, 0 for an empty sequence.
    pub success_rate: f64,
    /// Failed measurements grouped by kind.
    pub error_counts: BTreeMap<ErrorKind, usize>,
    /// Mean of ok values.
    pub mean: Option<f64>,
    /// Median of ok values.
    pub median: Option<f64>,
    /// Population standard deviation of ok values.
    pub std_dev: Option<f64>,
    /// Smallest ok value.
    pub min: Option<f64>,
    /// Largest ok value.
    pub max: Option<f64>,
    /// Ok measurements tagged as corrupted or outlier by fault injection.
    pub suspected_corrupted: usize,
    /// Ok values whose robust z-score exceeds [`ROBUST_Z_THRESHOLD`].
    pub statistical_outliers: usize,
}

impl StatisticalSummary {
    /// Summarize `series`.
    pub fn from_series(series: &InstrumentSeries) -> Self {
        let values = series.ok_values();
        let total = series.len();
        let ok_count = values.len();

        let mut error_counts = BTreeMap::new();
        for kind in series.measurements().iter().filter_map(|m| m.error_kind()) {
            *error_counts.entry(kind).or_insert(0) += 1;
        }

        let suspected_corrupted = series
            .measurements()
            .iter()
            .filter(|m| m.is_ok() && m.faults().affects_value())
            .count();

        Self {
            instrument_id: series.instrument_id().to_string(),
            total,
            ok_count,
            success_rate: if total == 0 {
                0.0
            } else {
                ok_count as f64 / total as f64
            },
            error_counts,
            mean: mean(&values),
            median: median(&values),
            std_dev: population_std_dev(&values),
            min: values.iter().copied().min_by(f64::total_cmp),
            max: values.iter().copied().max_by(f64::total_cmp),
            suspected_corrupted,
            statistical_outliers: robust_outliers(&values),
        }
    }

    /// Value of one selectable metric.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Mean => self.mean,
            Metric::Median => self.median,
            Metric::StdDev => self.std_dev,
            Metric::Min => self.min,
            Metric::Max => self.max,
        }
    }

    /// Failed measurements of every kind.
    pub fn error_total(&self) -> usize {
        self.error_counts.values().sum()
    }
}

/// Arithmetic mean; `None` for no values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; the mean of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation; 0 for a single value.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Count of values with `|x - median| / (1.4826 * MAD) > 3.5`.
///
/// Zero when the MAD is zero, since no spread means no scale to judge by.
pub fn robust_outliers(values: &[f64]) -> usize {
    let Some(med) = median(values) else {
        return 0;
    };
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let Some(mad) = median(&deviations) else {
        return 0;
    };
    if mad == 0.0 {
        return 0;
    }
    deviations
        .iter()
        .filter(|d| **d / (MAD_SCALE * mad) > ROBUST_Z_THRESHOLD)
        .count()
}
