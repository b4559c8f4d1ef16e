//! `ammeter-core`
//!
//! Core types and traits shared by every stage of the ammeter sampling pipeline.
//!
//! ## Key Types
//!
//! - [`Measurement`]: the immutable record produced for every instrument on every tick
//! - [`ErrorKind`]: the closed taxonomy of instrument-level failures
//! - [`SamplingPlan`]: validated stopping condition and nominal frequency
//! - [`SampledRun`]: the per-instrument sequences collected by one sampling run
//! - [`Ammeter`]: the capability every instrument client implements
//! - [`DaqError`]: fatal, configuration-level errors
//!
//! Instrument failures are data, not errors: a client that cannot reach its
//! instrument still returns a [`Measurement`], with `ok == false` and an
//! [`ErrorKind`] attached. [`DaqError`] is reserved for contract violations that
//! must abort a run before any sampling starts.

pub mod capabilities;
pub mod error;
pub mod measurement;
pub mod plan;
pub mod run;

pub use capabilities::Ammeter;
pub use error::{DaqError, ErrorKind, Result};
pub use measurement::{FaultTags, Measurement};
pub use plan::SamplingPlan;
pub use run::{InstrumentSeries, SampledRun};
