//! The counter state container.
//!
//! [`CounterContainer`] is the composition root of the counter screen: it
//! wires the [`CounterReducer`] into a [`Store`] with the recover hook, the
//! observer-gated ticker and file persistence, and exposes the three-part
//! container contract (state stream, intent entry point, notice stream).

use crate::{AppState, CounterAction, CounterConfig, CounterEnvironment, CounterIntent, CounterNotice, CounterReducer};
use mvi_core::environment::{Random, SystemRandom};
use mvi_core::fault::Fault;
use mvi_core::persistence::StateStorage;
use mvi_runtime::{FileStorage, Persistence, SavePolicy, Store, StoreConfig, StoreError, Subscription};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Name the counter store logs under
pub const STORE_NAME: &str = "counter";

/// The counter screen's state container
///
/// Cloning yields another handle to the same container.
pub struct CounterContainer<R: Random + 'static = SystemRandom> {
    store: Store<CounterReducer<R>>,
}

impl<R: Random + 'static> Clone for CounterContainer<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<R: Random + 'static> std::fmt::Debug for CounterContainer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterContainer").field("store", &self.store).finish()
    }
}

impl<R: Random + 'static> CounterContainer<R> {
    /// Start a container persisting to `config.cache_path`
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: &CounterConfig, environment: CounterEnvironment<R>) -> Self {
        let storage = Arc::new(FileStorage::new(config.cache_path.clone()));
        Self::with_storage(config, environment, storage).await
    }

    /// Start a container persisting to `storage`
    ///
    /// The initial state is the saved `Content` snapshot, or `Content{0}` when
    /// nothing readable was saved.
    pub async fn with_storage(
        config: &CounterConfig,
        environment: CounterEnvironment<R>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let policy = SavePolicy::default()
            .with_periodic(config.save_period)
            .with_on_unsubscribe(config.save_on_unsubscribe);

        let mut builder = Store::builder(CounterReducer::new(), environment)
            .config(StoreConfig::new(STORE_NAME))
            .recover(to_error)
            .persist(Persistence::new(storage, policy));
        if config.ticker_enabled {
            builder = builder.while_subscribed(config.tick_period, || CounterAction::Tick);
        }

        tracing::info!(
            tick_period = ?config.tick_period,
            ticker_enabled = config.ticker_enabled,
            save_period = ?config.save_period,
            "Starting counter container"
        );
        Self {
            store: builder.start(AppState::default()).await,
        }
    }

    /// Submit a user intent
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after
    /// [`shutdown`](Self::shutdown) began.
    pub fn submit(&self, intent: CounterIntent) -> Result<(), StoreError> {
        self.store.send(intent.into())
    }

    /// Observe the state
    ///
    /// The ticker runs while at least one subscription is alive.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<AppState> {
        self.store.subscribe()
    }

    /// Receive notices emitted from now on
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<CounterNotice> {
        self.store.subscribe_notices()
    }

    /// The current state
    #[must_use]
    pub fn state(&self) -> AppState {
        self.store.state(AppState::clone)
    }

    /// Save the current state now
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ChannelClosed`] once the container stopped.
    pub fn save_now(&self) -> Result<(), StoreError> {
        self.store.save_now()
    }

    /// Stop the container, flushing the last save
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if the store did not stop in
    /// time.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        tracing::info!(store = %self.store.name(), "Stopping counter container");
        self.store.close().await
    }
}

/// Turn an unhandled fault into the `Error` screen, keeping the last value
fn to_error(state: &AppState, fault: &Fault) -> Option<AppState> {
    Some(AppState::Error {
        message: fault.to_string(),
        value: state.value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_keeps_value() {
        let state = AppState::Content { value: 12 };
        assert_eq!(
            to_error(&state, &Fault::new("disk on fire")),
            Some(AppState::Error {
                message: "disk on fire".to_string(),
                value: 12,
            })
        );
    }
}
