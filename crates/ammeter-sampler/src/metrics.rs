//! Per-measurement metrics hook.

use ammeter_core::Measurement;

/// Receives every finalized measurement, after fault injection.
///
/// Called from inside the sampling loop: implementations must not block and
/// must swallow their own errors.
pub trait MetricsSink: Send + Sync {
    /// Record one measurement.
    fn record(&self, measurement: &Measurement);
}
