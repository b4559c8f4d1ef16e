//! Collected sequences of one sampling run.

use crate::measurement::Measurement;
use crate::plan::SamplingPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered measurements of a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSeries {
    instrument_id: String,
    measurements: Vec<Measurement>,
}

impl InstrumentSeries {
    /// Empty series for `instrument_id`.
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            measurements: Vec::new(),
        }
    }

    /// Empty series with room for `capacity` measurements.
    pub fn with_capacity(instrument_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            measurements: Vec::with_capacity(capacity),
        }
    }

    /// Append the next measurement.
    pub fn push(&mut self, measurement: Measurement) {
        debug_assert_eq!(measurement.instrument_id(), self.instrument_id);
        self.measurements.push(measurement);
    }

    /// Instrument this series belongs to.
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Measurements in tick order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Values of the ok measurements, in tick order.
    pub fn ok_values(&self) -> Vec<f64> {
        self.measurements.iter().filter_map(Measurement::value).collect()
    }
}

/// Everything a sampling run collected, handed off to the analysis once.
///
/// Series are kept in the sampling order of the instruments. Under normal
/// completion all series have `ticks_completed` measurements; a cancelled run
/// carries whatever ticks finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledRun {
    plan: SamplingPlan,
    series: Vec<InstrumentSeries>,
    ticks_completed: u64,
    cancelled: bool,
    overruns: u64,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl SampledRun {
    /// Wrap collected series. `ticks_completed` is the longest series length.
    pub fn new(plan: SamplingPlan, series: Vec<InstrumentSeries>) -> Self {
        let ticks_completed = series.iter().map(|s| s.len() as u64).max().unwrap_or(0);
        let now = Utc::now();
        Self {
            plan,
            series,
            ticks_completed,
            cancelled: false,
            overruns: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Record wall-clock start and end.
    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }

    /// Mark whether the run was stopped by an external signal.
    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Record how many ticks finished after the next tick's target.
    pub fn with_overruns(mut self, overruns: u64) -> Self {
        self.overruns = overruns;
        self
    }

    /// Plan the run executed.
    pub fn plan(&self) -> &SamplingPlan {
        &self.plan
    }

    /// Per-instrument series, in sampling order.
    pub fn series(&self) -> &[InstrumentSeries] {
        &self.series
    }

    /// Series of one instrument.
    pub fn series_for(&self, instrument_id: &str) -> Option<&InstrumentSeries> {
        self.series.iter().find(|s| s.instrument_id() == instrument_id)
    }

    /// Instrument ids in sampling order.
    pub fn instrument_ids(&self) -> Vec<&str> {
        self.series.iter().map(InstrumentSeries::instrument_id).collect()
    }

    /// Number of ticks that completed.
    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed
    }

    /// Whether the run was cancelled before its plan was exhausted.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Ticks that overran the next tick's target.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Wall-clock start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock end.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Total measurements across all instruments.
    pub fn total_measurements(&self) -> usize {
        self.series.iter().map(InstrumentSeries::len).sum()
    }

    /// All measurements ordered by tick, then by sampling order within a tick.
    pub fn interleaved(&self) -> Vec<&Measurement> {
        let mut out: Vec<(u64, usize, &Measurement)> = self
            .series
            .iter()
            .enumerate()
            .flat_map(|(pos, s)| s.measurements().iter().map(move |m| (m.sequence_index(), pos, m)))
            .collect();
        out.sort_by_key(|(tick, pos, _)| (*tick, *pos));
        out.into_iter().map(|(_, _, m)| m).collect()
    }
}
