//! Observer handles.
//!
//! A [`Subscription`] is both the state stream and the registration that
//! keeps the store's background ticker alive. Creating one registers an
//! observer with the processing loop; dropping it unregisters. The ticker
//! runs exactly while the registered count is above zero.

use crate::store::{Control, ControlSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

/// A live view of a store's state
///
/// Every committed state replacement is observable in order through
/// [`next`](Self::next). An observer that is slower than the store sees the
/// latest value rather than every intermediate one.
pub struct Subscription<S> {
    receiver: watch::Receiver<S>,
    control: ControlSink,
    count: Arc<AtomicUsize>,
}

impl<S> Subscription<S> {
    pub(crate) fn register(
        receiver: watch::Receiver<S>,
        control: ControlSink,
        count: Arc<AtomicUsize>,
    ) -> Self {
        let observers = count.fetch_add(1, Ordering::AcqRel) + 1;
        control(Control::Subscribed);
        tracing::trace!(observers, "Subscription registered");
        Self {
            receiver,
            control,
            count,
        }
    }
}

impl<S: Clone> Subscription<S> {
    /// The current state
    #[must_use]
    pub fn current(&self) -> S {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state replacement
    ///
    /// Returns `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<S> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<S> std::fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("observers", &self.count.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<S> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
        (self.control)(Control::Unsubscribed);
    }
}
