//! The [`Measurement`] record.
//!
//! A measurement is the unit of exchange between the client, the fault
//! injector, the sampler and the analysis. Exactly one of `value` and
//! `error_kind` is present; the constructors are the only way to build one, so
//! the invariant cannot be broken from outside this module.
//!
//! Transformations (`dropped`, `with_added_latency`, ...) consume the record
//! and return a new one. None of them touch `instrument_id` or
//! `sequence_index`.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effects applied to a measurement by fault injection.
///
/// `corrupted` and `outlier` mark value-integrity faults: the measurement stays
/// `ok` but its value is silently wrong. The analysis counts them as
/// "suspected corrupted" rather than as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultTags {
    /// The real outcome was discarded.
    pub dropped: bool,
    /// Extra latency was added.
    pub delayed: bool,
    /// The value was perturbed.
    pub corrupted: bool,
    /// The value was scaled into an outlier.
    pub outlier: bool,
}

impl FaultTags {
    /// True when no effect was applied.
    pub fn is_clean(&self) -> bool {
        !(self.dropped || self.delayed || self.corrupted || self.outlier)
    }

    /// True when the value is ok but not trustworthy.
    pub fn affects_value(&self) -> bool {
        self.corrupted || self.outlier
    }
}

/// One reading (or failed reading) from one instrument on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    instrument_id: String,
    sequence_index: u64,
    value: Option<f64>,
    #[serde(rename = "latency_s", with = "duration_secs")]
    latency: Duration,
    ok: bool,
    error_kind: Option<ErrorKind>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    faults: FaultTags,
}

impl Measurement {
    /// A usable reading.
    pub fn success(
        instrument_id: impl Into<String>,
        sequence_index: u64,
        value: f64,
        latency: Duration,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            sequence_index,
            value: Some(value),
            latency,
            ok: true,
            error_kind: None,
            timestamp: Utc::now(),
            faults: FaultTags::default(),
        }
    }

    /// A failed reading.
    pub fn failure(
        instrument_id: impl Into<String>,
        sequence_index: u64,
        kind: ErrorKind,
        latency: Duration,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            sequence_index,
            value: None,
            latency,
            ok: false,
            error_kind: Some(kind),
            timestamp: Utc::now(),
            faults: FaultTags::default(),
        }
    }

    /// Source instrument.
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Tick index assigned by the sampler.
    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }

    /// Reading in amperes, present iff [`is_ok`](Self::is_ok).
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Request-to-reply (or request-to-failure) time, plus any injected delay.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Whether a usable value was obtained.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Failure reason, present iff not ok.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Wall-clock instant the measurement was finalized.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Fault injection effects applied to this record.
    pub fn faults(&self) -> FaultTags {
        self.faults
    }

    /// Replace the finalization timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Discard the real outcome: an immediate, silent failure with zero latency.
    pub fn dropped(mut self) -> Self {
        self.value = None;
        self.ok = false;
        self.error_kind = Some(ErrorKind::FaultDrop);
        self.latency = Duration::ZERO;
        self.faults.dropped = true;
        self
    }

    /// Add injected latency. `ok` and `value` are untouched.
    pub fn with_added_latency(mut self, extra: Duration) -> Self {
        self.latency = self.latency.saturating_add(extra);
        self.faults.delayed = true;
        self
    }

    /// Replace the value with a corrupted one. No-op on a failed measurement.
    pub fn with_corrupted_value(mut self, value: f64) -> Self {
        if self.ok {
            self.value = Some(value);
            self.faults.corrupted = true;
        }
        self
    }

    /// Replace the value with an outlier. No-op on a failed measurement.
    pub fn with_outlier_value(mut self, value: f64) -> Self {
        if self.ok {
            self.value = Some(value);
            self.faults.outlier = true;
        }
        self
    }
}

/// Serialize a [`Duration`] as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
