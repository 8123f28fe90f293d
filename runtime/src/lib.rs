//! # MVI Runtime
//!
//! Runtime implementation for the MVI state container.
//!
//! This crate provides the [`Store`]: the runtime that owns a state value,
//! feeds actions through a reducer one at a time and publishes the results.
//!
//! ## Core Components
//!
//! - **Store**: Handle for sending actions, reading state and subscribing
//! - **Processing loop**: One task per store; every action, tick, save
//!   request and subscription change is applied in sequence on it
//! - **Ticker**: Optional background action source that only runs while at
//!   least one [`Subscription`] is alive
//! - **Recovery**: Turns reducer faults (and panics) into state
//! - **Persistence**: Saves the savable part of the state periodically and
//!   when the last subscriber leaves; restores it on start
//!
//! ## Example
//!
//! ```ignore
//! use mvi_runtime::{Store, StoreConfig};
//!
//! let store = Store::builder(CounterReducer::new(), environment)
//!     .config(StoreConfig::new("counter"))
//!     .recover(|state, fault| Some(state.to_error(fault)))
//!     .while_subscribed(Duration::from_secs(1), || CounterAction::Tick)
//!     .start(AppState::default())
//!     .await;
//!
//! let mut subscription = store.subscribe();
//! store.send(CounterAction::Increment)?;
//! let next = subscription.next().await;
//! ```

/// Store and processing-loop configuration
pub mod config;

/// Snapshot persistence wiring and the file-backed storage slot
pub mod persistence;

/// The Store runtime
pub mod store;

/// Observer handles that gate the background ticker
pub mod subscription;

mod ticker;

/// Error types for the Store runtime
pub mod error {
    use std::time::Duration;
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Reducer faults are not part of this type: they are converted into
    /// state by the store and never reach the caller.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for the processing loop to finish
        #[error("Shutdown timed out after {0:?}")]
        ShutdownTimeout(Duration),

        /// The processing loop is gone
        ///
        /// Returned when the loop task exited abnormally before the action
        /// could be enqueued.
        #[error("Store processing loop closed")]
        ChannelClosed,

        /// The processing loop task failed while shutting down
        #[error("Store processing loop failed: {0}")]
        LoopFailed(String),
    }
}

pub use config::{SavePolicy, StoreConfig};
pub use error::StoreError;
pub use persistence::{FileStorage, Persistence};
pub use store::{Store, StoreBuilder};
pub use subscription::Subscription;
