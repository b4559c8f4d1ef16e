//! Statistical analysis of a sampling run.
//!
//! - [`StatisticalSummary`]: per-instrument counts and value statistics over ok
//!   measurements
//! - [`PairwiseAgreement`]: MAE, RMSE and correlation between two instruments,
//!   aligned by tick
//! - [`ReliabilityRanking`]: weighted composite ordering, see [`ranking`]
//! - [`RunResult`]: a run and its analysis, the unit handed to persistence
//!
//! Everything here is a pure function of the [`SampledRun`](ammeter_core::SampledRun).
//! Statistics that cannot be computed are `None`, never `0` or `NaN`.

pub mod agreement;
pub mod engine;
pub mod ranking;
pub mod result;
pub mod stats;

pub use agreement::PairwiseAgreement;
pub use engine::{analyze, AnalysisSummary};
pub use ranking::{RankEntry, ReliabilityRanking};
pub use result::RunResult;
pub use stats::{Metric, StatisticalSummary};
