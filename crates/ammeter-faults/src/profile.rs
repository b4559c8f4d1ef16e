//! Fault profile: per-effect probabilities and parameters.

use ammeter_core::{DaqError, Result};
use serde::Serialize;
use std::time::Duration;

/// Default multiplier applied by the outlier effect.
pub const DEFAULT_OUTLIER_SCALE: f64 = 5.0;

/// Validated set of fault probabilities and parameters.
///
/// Effects are evaluated independently per sample; only drop short-circuits
/// the others.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultProfile {
    drop_prob: f64,
    delay_prob: f64,
    corrupt_prob: f64,
    outlier_prob: f64,
    delay_min: Duration,
    delay_max: Duration,
    outlier_scale: f64,
}

impl FaultProfile {
    /// Profile that never triggers any effect.
    pub fn none() -> Self {
        Self {
            drop_prob: 0.0,
            delay_prob: 0.0,
            corrupt_prob: 0.0,
            outlier_prob: 0.0,
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            outlier_scale: DEFAULT_OUTLIER_SCALE,
        }
    }

    /// Start building a profile from [`none`](Self::none).
    pub fn builder() -> FaultProfileBuilder {
        FaultProfileBuilder {
            profile: Self::none(),
        }
    }

    /// Probability of discarding the real outcome.
    pub fn drop_prob(&self) -> f64 {
        self.drop_prob
    }

    /// Probability of adding latency.
    pub fn delay_prob(&self) -> f64 {
        self.delay_prob
    }

    /// Probability of perturbing the value.
    pub fn corrupt_prob(&self) -> f64 {
        self.corrupt_prob
    }

    /// Probability of turning the value into an outlier.
    pub fn outlier_prob(&self) -> f64 {
        self.outlier_prob
    }

    /// Inclusive range of injected latency.
    pub fn delay_range(&self) -> (Duration, Duration) {
        (self.delay_min, self.delay_max)
    }

    /// Outlier multiplier.
    pub fn outlier_scale(&self) -> f64 {
        self.outlier_scale
    }

    /// True when every probability is zero.
    pub fn is_inert(&self) -> bool {
        self.drop_prob == 0.0
            && self.delay_prob == 0.0
            && self.corrupt_prob == 0.0
            && self.outlier_prob == 0.0
    }

    fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("drop_prob", self.drop_prob),
            ("delay_prob", self.delay_prob),
            ("corrupt_prob", self.corrupt_prob),
            ("outlier_prob", self.outlier_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DaqError::InvalidFaultProfile(format!(
                    "{} must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.delay_min > self.delay_max {
            return Err(DaqError::InvalidFaultProfile(format!(
                "delay range is inverted: min {:?} > max {:?}",
                self.delay_min, self.delay_max
            )));
        }
        if !self.outlier_scale.is_finite() || self.outlier_scale <= 0.0 {
            return Err(DaqError::InvalidFaultProfile(format!(
                "outlier_scale must be a positive finite number, got {}",
                self.outlier_scale
            )));
        }
        Ok(())
    }
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self::none()
    }
}

/// Builder for [`FaultProfile`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct FaultProfileBuilder {
    profile: FaultProfile,
}

impl FaultProfileBuilder {
    /// Set the drop probability.
    pub fn drop_prob(mut self, p: f64) -> Self {
        self.profile.drop_prob = p;
        self
    }

    /// Set the delay probability.
    pub fn delay_prob(mut self, p: f64) -> Self {
        self.profile.delay_prob = p;
        self
    }

    /// Set the corruption probability.
    pub fn corrupt_prob(mut self, p: f64) -> Self {
        self.profile.corrupt_prob = p;
        self
    }

    /// Set the outlier probability.
    pub fn outlier_prob(mut self, p: f64) -> Self {
        self.profile.outlier_prob = p;
        self
    }

    /// Set the injected latency range.
    pub fn delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.profile.delay_min = min;
        self.profile.delay_max = max;
        self
    }

    /// Set the outlier multiplier.
    pub fn outlier_scale(mut self, scale: f64) -> Self {
        self.profile.outlier_scale = scale;
        self
    }

    /// Validate and return the profile.
    pub fn build(self) -> Result<FaultProfile> {
        self.profile.validate()?;
        Ok(self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inert() {
        let profile = FaultProfile::default();
        assert!(profile.is_inert());
        assert_eq!(profile.outlier_scale(), DEFAULT_OUTLIER_SCALE);
    }

    #[test]
    fn test_builder_sets_fields() {
        let profile = FaultProfile::builder()
            .drop_prob(0.06)
            .delay_prob(0.1)
            .delay_range(Duration::from_millis(5), Duration::from_millis(20))
            .corrupt_prob(0.02)
            .outlier_prob(0.01)
            .outlier_scale(3.0)
            .build()
            .unwrap();
        assert_eq!(profile.drop_prob(), 0.06);
        assert_eq!(
            profile.delay_range(),
            (Duration::from_millis(5), Duration::from_millis(20))
        );
        assert_eq!(profile.outlier_scale(), 3.0);
        assert!(!profile.is_inert());
    }

    #[test]
    fn test_rejects_probability_out_of_range() {
        assert!(FaultProfile::builder().drop_prob(1.5).build().is_err());
        assert!(FaultProfile::builder().corrupt_prob(-0.1).build().is_err());
        assert!(FaultProfile::builder().outlier_prob(f64::NAN).build().is_err());
    }

    #[test]
    fn test_rejects_inverted_delay_range() {
        let err = FaultProfile::builder()
            .delay_range(Duration::from_millis(50), Duration::from_millis(10))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        assert!(FaultProfile::builder().outlier_scale(0.0).build().is_err());
        assert!(FaultProfile::builder().outlier_scale(-2.0).build().is_err());
    }
}
