//! Sampling plan: when to stop and how often to tick.

use crate::error::{DaqError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Validated snapshot of the sampling configuration.
///
/// At least one of `count` and `duration` is set; when both are, the run stops
/// at whichever bound is reached first. `frequency_hz` is positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingPlan {
    count: Option<u64>,
    #[serde(with = "opt_duration_secs")]
    duration: Option<Duration>,
    frequency_hz: f64,
}

impl SamplingPlan {
    /// Build a plan, rejecting configurations that could never terminate or tick.
    pub fn new(count: Option<u64>, duration: Option<Duration>, frequency_hz: f64) -> Result<Self> {
        if count.is_none() && duration.is_none() {
            return Err(DaqError::InvalidPlan(
                "either count or duration must be set".into(),
            ));
        }
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(DaqError::InvalidPlan(format!(
                "frequency_hz must be a positive finite number, got {}",
                frequency_hz
            )));
        }
        if Duration::try_from_secs_f64(1.0 / frequency_hz).is_err() {
            return Err(DaqError::InvalidPlan(format!(
                "frequency_hz {} gives a period too long to schedule",
                frequency_hz
            )));
        }
        Ok(Self {
            count,
            duration,
            frequency_hz,
        })
    }

    /// Count-bounded plan.
    pub fn with_count(count: u64, frequency_hz: f64) -> Result<Self> {
        Self::new(Some(count), None, frequency_hz)
    }

    /// Duration-bounded plan.
    pub fn with_duration(duration: Duration, frequency_hz: f64) -> Result<Self> {
        Self::new(None, Some(duration), frequency_hz)
    }

    /// Maximum number of ticks, if bounded by count.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Maximum elapsed time, if bounded by duration.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Nominal tick frequency.
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    /// Nominal time between tick targets.
    pub fn period(&self) -> Duration {
        // Representable: checked in `new`.
        Duration::try_from_secs_f64(1.0 / self.frequency_hz).unwrap_or(Duration::MAX)
    }

    /// Target offset of tick `n` from the run start, `None` when it does not
    /// fit a `Duration`.
    ///
    /// Always a fixed multiple of the period, never derived from when the
    /// previous tick actually finished.
    pub fn target_offset(&self, n: u64) -> Option<Duration> {
        Duration::try_from_secs_f64(n as f64 / self.frequency_hz).ok()
    }

    /// Whether tick `n` must not be issued, given the elapsed time since start.
    pub fn should_stop(&self, n: u64, elapsed: Duration) -> bool {
        if let Some(count) = self.count {
            if n >= count {
                return true;
            }
        }
        if let Some(duration) = self.duration {
            if elapsed >= duration {
                return true;
            }
        }
        false
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
