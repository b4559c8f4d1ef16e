//! Periodic sampling across a fixed set of ammeters.
//!
//! A [`Sampler`] polls every instrument once per tick, strictly sequentially
//! in the order it was given, optionally routes each result through a
//! [`FaultInjector`](ammeter_faults::FaultInjector), and hands the collected
//! sequences back as a [`SampledRun`](ammeter_core::SampledRun).
//!
//! Stops when the [`SamplingPlan`](ammeter_core::SamplingPlan) says so or when
//! its [`CancelHandle`] fires, whichever comes first.

pub mod cancel;
pub mod metrics;
pub mod sampler;

pub use cancel::CancelHandle;
pub use metrics::MetricsSink;
pub use sampler::Sampler;
