//! Fault injection for ammeter measurements.
//!
//! Turns a real measurement into a simulated failure or a silently wrong value,
//! without any cooperation from the instrument:
//!
//! - **drop**: discard the outcome, report `fault_drop` with zero latency
//! - **delay**: add extra reported latency
//! - **corrupt**: perturb the value while keeping `ok == true`
//! - **outlier**: scale the value by `outlier_scale`
//!
//! The random source is an explicit, seedable [`FaultRng`] passed by `&mut` to
//! every [`FaultInjector::apply`] call. Two runs with the same seed make the
//! same decisions.
//!
//! # Example
//!
//! ```rust
//! use ammeter_core::Measurement;
//! use ammeter_faults::{FaultInjector, FaultProfile, FaultRng};
//! use std::time::Duration;
//!
//! let profile = FaultProfile::builder().drop_prob(1.0).build().unwrap();
//! let injector = FaultInjector::new(profile);
//! let mut rng = FaultRng::new(Some(42));
//!
//! let real = Measurement::success("greenlee", 0, 0.12, Duration::from_millis(3));
//! let faulted = injector.apply(real, &mut rng);
//! assert!(!faulted.is_ok());
//! ```

pub mod injector;
pub mod profile;
pub mod rng;

pub use injector::FaultInjector;
pub use profile::{FaultProfile, FaultProfileBuilder};
pub use rng::FaultRng;
