//! Ammeter drivers.
//!
//! - [`AmmeterKind`]: the three supported instrument families and their
//!   per-family protocol details (default port, command, legacy aliases)
//! - [`AmmeterClient`]: the unified TCP client, implementing
//!   [`ammeter_core::Ammeter`]
//! - [`EmulatorServer`]: in-process emulators for development and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use ammeter_core::Ammeter;
//! use ammeter_driver::{AmmeterClient, AmmeterKind, EmulatorBehavior, EmulatorServer};
//!
//! let server = EmulatorServer::spawn(AmmeterKind::Entes, "127.0.0.1:0", EmulatorBehavior::Normal, Some(1)).await?;
//! let client = AmmeterClient::new(AmmeterKind::Entes)
//!     .with_host("127.0.0.1")
//!     .with_port(server.port());
//! let m = client.measure(0).await;
//! assert!(m.is_ok());
//! ```

pub mod client;
pub mod emulator;
pub mod instrument;

pub use client::{AmmeterClient, DEFAULT_TIMEOUT};
pub use emulator::{EmulatorBehavior, EmulatorServer};
pub use instrument::{parse_reply, AmmeterKind};
