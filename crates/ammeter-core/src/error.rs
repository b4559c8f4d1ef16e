//! Error types for the sampling pipeline.
//!
//! Two very different kinds of failure exist here and they must not be mixed:
//!
//! - **[`ErrorKind`]**: an instrument-level failure. It is never returned as an
//!   `Err`; it is attached to a [`Measurement`](crate::Measurement) so the run
//!   keeps going and the analysis can count it.
//! - **[`DaqError`]**: a configuration-level contract violation (a sampling plan
//!   without a stopping bound, a probability outside `[0, 1]`, ...). These are
//!   fatal and surface before the first tick.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Measurement Error Taxonomy
// =============================================================================

/// Closed set of reasons a measurement can be unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The connection could not be established or the transport failed mid-exchange.
    ConnectionError,
    /// No reply arrived within the configured timeout.
    Timeout,
    /// A reply arrived but did not contain a usable number (includes
    /// `ERROR: Unsupported command` replies and empty replies).
    NoData,
    /// The fault injector discarded the real outcome.
    FaultDrop,
}

impl ErrorKind {
    /// All variants, in taxonomy order.
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::ConnectionError,
        ErrorKind::Timeout,
        ErrorKind::NoData,
        ErrorKind::FaultDrop,
    ];

    /// Stable snake_case label, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NoData => "no_data",
            ErrorKind::FaultDrop => "fault_drop",
        }
    }

    /// Whether this failure was synthesized by fault injection rather than observed.
    pub fn is_injected(&self) -> bool {
        matches!(self, ErrorKind::FaultDrop)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Fatal Errors
// =============================================================================

/// Convenience alias for results using the fatal error type.
pub type Result<T> = std::result::Result<T, DaqError>;

/// Fatal errors that abort a run before sampling begins.
///
/// # Error Categories
///
/// 1. **Contract violations** - `InvalidPlan`, `InvalidFaultProfile`, `Configuration`
///    - Raised while turning configuration values into validated core types
///    - Recovery: fix the configuration and start again
///
/// 2. **I/O** - `Io`
///    - Raised by collaborators (emulator binding, persistence helpers)
#[derive(Error, Debug)]
pub enum DaqError {
    /// The sampling plan cannot be executed.
    ///
    /// Occurs when neither `count` nor `duration` is set, or the frequency is
    /// not a positive finite number.
    #[error("Invalid sampling plan: {0}")]
    InvalidPlan(String),

    /// A fault profile parameter is out of range.
    #[error("Invalid fault profile: {0}")]
    InvalidFaultProfile(String),

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
