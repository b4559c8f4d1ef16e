//! Multi-ammeter sampling, fault injection and reliability analysis.
//!
//! The workspace crates do the work; this crate wires them to a configuration
//! file and a command line:
//!
//! - [`config`]: YAML/TOML project configuration with `AMMETER_` overrides
//! - [`logging`]: tracing subscriber setup
//! - [`metrics`]: DogStatsD export of every measurement
//! - [`runner`]: sample → analyse → persist
//!
//! # Example
//! ```no_run
//! use ammeter_daq::{config::ProjectConfig, runner};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = ProjectConfig::load("config/test_config.yaml")?;
//! let outcome = runner::run_project(&config).await?;
//! println!("saved to {}", outcome.run_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod runner;
