//! Persistence of completed runs.
//!
//! A [`ResultStore`] turns a [`RunResult`](ammeter_analysis::RunResult) into a
//! self-contained run directory: the configuration snapshot, the raw
//! measurements (JSON or CSV), the analysis summary and free-form metadata.

pub mod error;
pub mod store;

pub use error::{Result, StorageError};
pub use store::{ResultStore, SaveFormat};
