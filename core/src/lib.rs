//! # MVI Core
//!
//! Core traits and types for the MVI (Model-View-Intent) state container.
//!
//! This crate provides the fundamental abstractions the runtime coordinates:
//!
//! ## Core Concepts
//!
//! - **State**: The single value a store holds and publishes to observers
//! - **Action**: Every input a reducer processes (user intents, timer ticks)
//! - **Notice**: One-shot side-channel output, never part of state
//! - **Reducer**: `(State, Action, Environment) → Result<Effects, Fault>`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Faults are values, converted to state at the store boundary
//!
//! ## Example
//!
//! ```
//! use mvi_core::{effect::Effect, fault::Fault, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct Clicks(u64);
//!
//! struct ClickReducer;
//!
//! impl Reducer for ClickReducer {
//!     type State = Clicks;
//!     type Action = ();
//!     type Notice = String;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Clicks,
//!         _action: (),
//!         _env: &(),
//!     ) -> Result<SmallVec<[Effect<(), String>; 4]>, Fault> {
//!         state.0 = state.0.checked_add(1).ok_or_else(|| Fault::new("too many clicks"))?;
//!         Ok(smallvec![Effect::Notify(format!("clicked {} times", state.0))])
//!     }
//! }
//!
//! let mut state = Clicks::default();
//! let effects = ClickReducer.reduce(&mut state, (), &()).unwrap();
//! assert_eq!(state.0, 1);
//! assert_eq!(effects.len(), 1);
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// The single fault kind raised during action processing
pub mod fault;

/// Snapshot persistence traits and the JSON snapshot codec
pub mod persistence;

/// Reducer module - The core trait for business logic
///
/// Reducers are functions `(State, Action, Environment) → Result<Effects, Fault>`.
///
/// They contain all business logic and are deterministic given their
/// environment, which makes them testable without a runtime.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;
    use super::fault::Fault;

    /// Effects returned by a single reduction
    pub type Effects<A, N> = SmallVec<[Effect<A, N>; 4]>;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Notice`: The one-shot notification type emitted through [`Effect::Notify`]
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The notice type emitted alongside state transitions
        type Notice;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// 1. Inspects the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// The runtime calls this on a copy of the current state and only
        /// commits the copy when the reduction succeeds.
        ///
        /// # Errors
        ///
        /// Returns a [`Fault`] when the action cannot be applied. The store
        /// converts the fault into state through its recover hook.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Effects<Self::Action, Self::Notice>, Fault>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    /// - `Notice`: The one-shot notification type
    pub enum Effect<Action, Notice> {
        /// No-op effect
        None,

        /// Emit a one-shot notice to every current notice subscriber
        Notify(Notice),

        /// Run effects concurrently
        Parallel(Vec<Effect<Action, Notice>>),

        /// Delayed action
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action, Notice> std::fmt::Debug for Effect<Action, Notice>
    where
        Action: std::fmt::Debug,
        Notice: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Notify(notice) => f.debug_tuple("Effect::Notify").field(notice).finish(),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action, Notice> Effect<Action, Notice> {
        /// Combine effects to run concurrently
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action, Notice>>) -> Effect<Action, Notice> {
            Effect::Parallel(effects)
        }

        /// Returns the notice carried by this effect, if it is a `Notify`
        #[must_use]
        pub const fn as_notice(&self) -> Option<&Notice> {
            match self {
                Effect::Notify(notice) => Some(notice),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All sources of nondeterminism a reducer needs are abstracted behind
/// traits and injected via the Environment parameter.
pub mod environment {
    use rand::Rng;
    use std::ops::Range;

    /// Random number source - abstracts randomness for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use mvi_core::environment::{Random, SystemRandom};
    ///
    /// let random = SystemRandom;
    /// let n = random.gen_range(0..100);
    /// assert!((0..100).contains(&n));
    ///
    /// // Empty ranges collapse to their start
    /// assert_eq!(random.gen_range(5..5), 5);
    /// ```
    pub trait Random: Send + Sync {
        /// Draw a value uniformly from `range`
        ///
        /// An empty range yields `range.start`.
        fn gen_range(&self, range: Range<i64>) -> i64;
    }

    /// Production randomness backed by the thread-local RNG
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemRandom;

    impl Random for SystemRandom {
        fn gen_range(&self, range: Range<i64>) -> i64 {
            if range.is_empty() {
                return range.start;
            }
            rand::thread_rng().gen_range(range)
        }
    }
}
