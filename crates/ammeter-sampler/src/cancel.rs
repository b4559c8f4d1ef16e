//! External stop signal for a sampling run.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle that stops a running [`Sampler`](crate::Sampler).
///
/// Cancellation takes effect between ticks; a tick in progress always
/// completes.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub(crate) fn new(tx: Arc<watch::Sender<bool>>) -> Self {
        Self { tx }
    }

    /// Request the run to stop.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let (tx, rx) = watch::channel(false);
        let handle = CancelHandle::new(Arc::new(tx));
        let other = handle.clone();
        assert!(!other.is_cancelled());
        handle.cancel();
        assert!(other.is_cancelled());
        assert!(*rx.borrow());
    }
}
