//! Instrument capability traits.
//!
//! Every instrument, whatever its wire protocol, is driven through the single
//! [`Ammeter`] capability. The sampler only ever sees this trait.

use crate::measurement::Measurement;
use async_trait::async_trait;

/// Capability: Current Measurement
///
/// # Contract
/// - `measure()` never fails: every failure mode is captured as a
///   [`Measurement`] with `ok == false` and an [`ErrorKind`](crate::ErrorKind)
/// - The returned measurement carries this instrument's id and the given
///   `sequence_index`
/// - Latency covers request issuance to reply (or failure detection),
///   including any timeout wait
/// - Implementations hold no state across calls other than connection
///   parameters
#[async_trait]
pub trait Ammeter: Send + Sync {
    /// Identifier stamped on every measurement.
    fn instrument_id(&self) -> &str;

    /// Perform one measurement for tick `sequence_index`.
    async fn measure(&self, sequence_index: u64) -> Measurement;
}

#[async_trait]
impl<T: Ammeter + ?Sized> Ammeter for Box<T> {
    fn instrument_id(&self) -> &str {
        (**self).instrument_id()
    }

    async fn measure(&self, sequence_index: u64) -> Measurement {
        (**self).measure(sequence_index).await
    }
}

#[async_trait]
impl<T: Ammeter + ?Sized> Ammeter for std::sync::Arc<T> {
    fn instrument_id(&self) -> &str {
        (**self).instrument_id()
    }

    async fn measure(&self, sequence_index: u64) -> Measurement {
        (**self).measure(sequence_index).await
    }
}
