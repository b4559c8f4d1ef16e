//! The fault injector.
//!
//! Draw pattern per call (input-independent, so a seed replays identically
//! whatever the instruments answered):
//!
//! 1. drop trial; on success return immediately
//! 2. delay trial, plus one draw for the extra latency when triggered
//! 3. corrupt trial, plus factor, offset and sign draws when triggered
//! 4. outlier trial
//!
//! Corruption and outlier compose: the outlier scales the value as it stands
//! after corruption. Both only alter ok measurements.

use crate::profile::FaultProfile;
use crate::rng::FaultRng;
use ammeter_core::Measurement;
use tracing::trace;

/// Corruption scale factor range `[low, high)`.
const CORRUPT_FACTOR: (f64, f64) = (1.25, 3.0);
/// Corruption absolute offset range in amperes `[low, high)`.
const CORRUPT_OFFSET: (f64, f64) = (0.01, 0.1);

/// Applies a [`FaultProfile`] to measurements.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    profile: FaultProfile,
    enabled: bool,
}

impl FaultInjector {
    /// Enabled injector for `profile`.
    pub fn new(profile: FaultProfile) -> Self {
        Self {
            profile,
            enabled: true,
        }
    }

    /// Identity injector. Consumes no randomness.
    pub fn disabled() -> Self {
        Self {
            profile: FaultProfile::none(),
            enabled: false,
        }
    }

    /// Whether this injector alters anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Profile in use.
    pub fn profile(&self) -> &FaultProfile {
        &self.profile
    }

    /// Transform one measurement.
    ///
    /// Deterministic given `rng`'s state and the input. Never changes
    /// `instrument_id` or `sequence_index`.
    pub fn apply(&self, measurement: Measurement, rng: &mut FaultRng) -> Measurement {
        if !self.enabled {
            return measurement;
        }
        let p = &self.profile;

        if rng.trial(p.drop_prob()) {
            trace!(
                instrument_id = measurement.instrument_id(),
                sequence_index = measurement.sequence_index(),
                "Injected drop"
            );
            return measurement.dropped();
        }

        let mut m = measurement;

        if rng.trial(p.delay_prob()) {
            let (min, max) = p.delay_range();
            let extra = rng.uniform_duration(min, max);
            trace!(
                instrument_id = m.instrument_id(),
                sequence_index = m.sequence_index(),
                extra_ms = extra.as_secs_f64() * 1000.0,
                "Injected delay"
            );
            m = m.with_added_latency(extra);
        }

        if rng.trial(p.corrupt_prob()) {
            let factor = rng.uniform(CORRUPT_FACTOR.0, CORRUPT_FACTOR.1);
            let offset = rng.uniform(CORRUPT_OFFSET.0, CORRUPT_OFFSET.1);
            let sign = rng.sign();
            if let Some(v) = m.value() {
                let corrupted = clamp_finite(corrupt_value(v, factor, offset, sign));
                trace!(
                    instrument_id = m.instrument_id(),
                    sequence_index = m.sequence_index(),
                    original = v,
                    corrupted,
                    "Injected corruption"
                );
                m = m.with_corrupted_value(corrupted);
            }
        }

        if rng.trial(p.outlier_prob()) {
            if let Some(v) = m.value() {
                m = m.with_outlier_value(clamp_finite(v * p.outlier_scale()));
            }
        }

        m
    }
}

/// `v + sign * (|v| * (factor - 1) + offset)`. The shift is at least `offset`,
/// so the result never equals `v` for a positive offset.
fn corrupt_value(v: f64, factor: f64, offset: f64, sign: f64) -> f64 {
    v + sign * (v.abs() * (factor - 1.0) + offset)
}

/// Saturate an overflowed reading at the largest finite magnitude, keeping
/// its sign. Injected values stay usable by the statistics.
fn clamp_finite(v: f64) -> f64 {
    v.clamp(-f64::MAX, f64::MAX)
}
