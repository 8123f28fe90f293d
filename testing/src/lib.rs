//! # MVI Testing
//!
//! Testing utilities and helpers for the MVI state container.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - An in-memory state storage slot
//! - A Given-When-Then harness for reducers
//! - Helpers for awaiting store output with a timeout
//!
//! ## Example
//!
//! ```ignore
//! use mvi_testing::{FixedRandom, InMemoryStorage};
//! use mvi_runtime::{Persistence, SavePolicy, Store};
//!
//! #[tokio::test]
//! async fn test_counter_flow() {
//!     let storage = InMemoryStorage::new();
//!     let store = Store::builder(CounterReducer::new(), env_with(FixedRandom::new(7)))
//!         .persist(Persistence::new(Arc::new(storage.clone()), SavePolicy::default()))
//!         .start(AppState::default())
//!         .await;
//!
//!     store.send(CounterIntent::Increment.into()).unwrap();
//! }
//! ```

use mvi_core::environment::Random;


/// In-memory state storage
pub mod storage_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::Random;
    use std::ops::Range;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Random source that always returns the same value
    ///
    /// The value is clamped into the requested range, so `FixedRandom::new(99)`
    /// asked for `0..100` returns 99 and asked for `0..10` returns 9.
    ///
    /// # Example
    ///
    /// ```
    /// use mvi_testing::mocks::FixedRandom;
    /// use mvi_core::environment::Random;
    ///
    /// let random = FixedRandom::new(42);
    /// assert_eq!(random.gen_range(0..100), 42);
    /// assert_eq!(random.gen_range(0..10), 9);
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedRandom {
        value: i64,
    }

    impl FixedRandom {
        /// Create a random source that yields `value`
        #[must_use]
        pub const fn new(value: i64) -> Self {
            Self { value }
        }
    }

    impl Random for FixedRandom {
        fn gen_range(&self, range: Range<i64>) -> i64 {
            clamp_into(self.value, &range)
        }
    }

    /// Random source that cycles through a fixed list of values
    ///
    /// Clones share the position in the sequence.
    #[derive(Debug, Clone)]
    pub struct SequenceRandom {
        values: Arc<[i64]>,
        position: Arc<AtomicUsize>,
    }

    impl SequenceRandom {
        /// Create a source yielding `values` in order, then starting over
        ///
        /// An empty list behaves like a source that always returns the
        /// start of the requested range.
        #[must_use]
        pub fn new(values: impl Into<Vec<i64>>) -> Self {
            let values: Vec<i64> = values.into();
            Self {
                values: Arc::from(values),
                position: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// How many values have been drawn so far
        #[must_use]
        pub fn draws(&self) -> usize {
            self.position.load(Ordering::SeqCst)
        }
    }

    impl Random for SequenceRandom {
        fn gen_range(&self, range: Range<i64>) -> i64 {
            if self.values.is_empty() {
                return range.start;
            }
            let index = self.position.fetch_add(1, Ordering::SeqCst) % self.values.len();
            clamp_into(self.values[index], &range)
        }
    }

    fn clamp_into(value: i64, range: &Range<i64>) -> i64 {
        if range.is_empty() {
            range.start
        } else {
            value.clamp(range.start, range.end - 1)
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use mvi_runtime::Subscription;
    use std::time::Duration;

    /// Install a `tracing` subscriber honouring `RUST_LOG`, once per process
    ///
    /// Safe to call from every test; later calls are no-ops.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Wait for the first state replacement that satisfies `predicate`
    ///
    /// Returns `None` if the store shut down or `timeout` elapsed first.
    pub async fn next_state_matching<S, F>(
        subscription: &mut Subscription<S>,
        timeout: Duration,
        mut predicate: F,
    ) -> Option<S>
    where
        S: Clone,
        F: FnMut(&S) -> bool,
    {
        let wait = async {
            while let Some(state) = subscription.next().await {
                if predicate(&state) {
                    return Some(state);
                }
            }
            None
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }
}

// Re-export commonly used items
pub use mocks::{FixedRandom, SequenceRandom};
pub use reducer_test::ReducerTest;
pub use storage_mocks::InMemoryStorage;
