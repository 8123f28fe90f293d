//! # Counter
//!
//! A counter screen built on the MVI state container.
//!
//! This crate showcases:
//! - A tagged state union (`Content`, `Loading`, `Error`)
//! - User intents next to runtime-only actions (`Tick`)
//! - One-shot notices on a side channel
//! - A recover hook turning faults into an `Error` state
//! - A ticker that only runs while the screen is observed
//! - Snapshot persistence of the `Content` state
//!
//! ## Example
//!
//! ```no_run
//! use counter::{CounterConfig, CounterContainer, CounterEnvironment, CounterIntent};
//! use mvi_core::environment::SystemRandom;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CounterConfig::from_env();
//! let environment = CounterEnvironment::new(SystemRandom, config.tick_bound);
//! let container = CounterContainer::start(&config, environment).await;
//!
//! let mut states = container.subscribe();
//! container.submit(CounterIntent::Increment)?;
//! let next = states.next().await;
//! # let _ = next;
//! container.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use mvi_core::environment::Random;
use mvi_core::persistence::Persistable;
use mvi_core::{Deserialize, Serialize, effect::Effect, fault::Fault, reducer::Effects, reducer::Reducer, smallvec};
use std::fmt;

pub mod config;
pub mod container;

pub use config::CounterConfig;
pub use container::CounterContainer;

/// The value shown on the counter screen
pub type CounterValue = i64;

/// Counter screen state
///
/// Exactly one variant at a time, and every variant carries the last known
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// The counter is shown and accepts intents
    Content {
        /// Current count
        value: CounterValue,
    },
    /// Waiting for data (no transition currently leads here)
    Loading {
        /// Last known count
        value: CounterValue,
    },
    /// Processing failed; the screen stays here
    Error {
        /// Description of the fault
        message: String,
        /// Count at the time of the fault
        value: CounterValue,
    },
}

impl AppState {
    /// The value carried by any variant
    #[must_use]
    pub const fn value(&self) -> CounterValue {
        match self {
            Self::Content { value } | Self::Loading { value } | Self::Error { value, .. } => *value,
        }
    }

    /// Whether the screen shows content
    #[must_use]
    pub const fn is_content(&self) -> bool {
        matches!(self, Self::Content { .. })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::Content { value: 0 }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content { value } => write!(f, "Content(value={value})"),
            Self::Loading { value } => write!(f, "Loading(value={value})"),
            Self::Error { message, value } => write!(f, "Error(value={value}, message={message})"),
        }
    }
}

/// The persisted record of a `Content` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    /// The saved count
    pub value: CounterValue,
}

impl Persistable for AppState {
    type Snapshot = ContentSnapshot;

    fn snapshot(&self) -> Option<ContentSnapshot> {
        match self {
            Self::Content { value } => Some(ContentSnapshot { value: *value }),
            Self::Loading { .. } | Self::Error { .. } => None,
        }
    }

    fn restore(snapshot: ContentSnapshot) -> Self {
        Self::Content {
            value: snapshot.value,
        }
    }
}

/// What the user can ask the counter to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterIntent {
    /// Add one to the counter
    Increment,
    /// Set the counter back to zero
    Reset,
}

/// Everything the counter reducer processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    /// A user intent
    Intent(CounterIntent),
    /// A periodic random bump, dispatched by the ticker while observed
    Tick,
}

impl From<CounterIntent> for CounterAction {
    fn from(intent: CounterIntent) -> Self {
        Self::Intent(intent)
    }
}

/// One-shot messages for the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterNotice {
    /// Show a transient message
    ShowMessage {
        /// The message text
        text: String,
    },
}

impl CounterNotice {
    fn increased(value: CounterValue) -> Self {
        Self::ShowMessage {
            text: format!("Counter increased: {value}"),
        }
    }

    fn reset() -> Self {
        Self::ShowMessage {
            text: "Counter has been reset.".to_string(),
        }
    }

    /// The message text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::ShowMessage { text } => text,
        }
    }
}

/// Default upper bound (exclusive) of a tick's random increment
pub const DEFAULT_TICK_BOUND: CounterValue = 100;

/// Counter environment
///
/// `random` draws the tick increment from `0..tick_bound`.
#[derive(Debug, Clone)]
pub struct CounterEnvironment<R: Random> {
    /// Source of tick increments
    pub random: R,
    /// Exclusive upper bound of a tick increment
    pub tick_bound: CounterValue,
}

impl<R: Random> CounterEnvironment<R> {
    /// Create a new counter environment
    #[must_use]
    pub const fn new(random: R, tick_bound: CounterValue) -> Self {
        Self { random, tick_bound }
    }
}

/// Counter reducer
///
/// Only `Content` accepts actions. In `Loading` and `Error` every action is
/// ignored. Arithmetic is checked: an overflow is a fault, which the
/// container turns into an `Error` state.
///
/// Generic over the Random type R to work with any random source.
#[derive(Debug, Clone, Copy)]
pub struct CounterReducer<R> {
    _phantom: std::marker::PhantomData<R>,
}

impl<R> CounterReducer<R> {
    /// Create a new counter reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<R> Default for CounterReducer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Random> Reducer for CounterReducer<R> {
    type State = AppState;
    type Action = CounterAction;
    type Notice = CounterNotice;
    type Environment = CounterEnvironment<R>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        environment: &Self::Environment,
    ) -> Result<Effects<Self::Action, Self::Notice>, Fault> {
        let value = match &*state {
            AppState::Content { value } => *value,
            AppState::Loading { .. } | AppState::Error { .. } => {
                tracing::debug!(?action, state = %state, "Ignoring action outside Content");
                return Ok(smallvec![Effect::None]);
            },
        };

        match action {
            CounterAction::Intent(CounterIntent::Increment) => {
                let next = value
                    .checked_add(1)
                    .ok_or_else(|| Fault::new(format!("counter overflow: {value} + 1")))?;
                *state = AppState::Content { value: next };
                Ok(smallvec![Effect::Notify(CounterNotice::increased(next))])
            },
            CounterAction::Intent(CounterIntent::Reset) => {
                *state = AppState::Content { value: 0 };
                Ok(smallvec![Effect::Notify(CounterNotice::reset())])
            },
            CounterAction::Tick => {
                let bump = environment.random.gen_range(0..environment.tick_bound);
                let next = value
                    .checked_add(bump)
                    .ok_or_else(|| Fault::new(format!("counter overflow: {value} + {bump}")))?;
                *state = AppState::Content { value: next };
                tracing::trace!(bump, value = next, "Tick applied");
                Ok(smallvec![Effect::None])
            },
        }
    }
}
