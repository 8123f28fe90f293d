//! Shared fixtures for Store integration tests

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::panic)] // The fixture reducer panics on purpose

use mvi_core::persistence::Persistable;
use mvi_core::{effect::Effect, fault::Fault, reducer::Effects, reducer::Reducer, smallvec};
use mvi_runtime::{Store, StoreConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyState {
    Ready { total: i64 },
    Failed { message: String, total: i64 },
}

impl Default for TallyState {
    fn default() -> Self {
        Self::Ready { total: 0 }
    }
}

impl TallyState {
    pub const fn total(&self) -> i64 {
        match self {
            Self::Ready { total } | Self::Failed { total, .. } => *total,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ReadySnapshot {
    pub total: i64,
}

impl Persistable for TallyState {
    type Snapshot = ReadySnapshot;

    fn snapshot(&self) -> Option<ReadySnapshot> {
        match self {
            Self::Ready { total } => Some(ReadySnapshot { total: *total }),
            Self::Failed { .. } => None,
        }
    }

    fn restore(snapshot: ReadySnapshot) -> Self {
        Self::Ready {
            total: snapshot.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyAction {
    /// Add to the total and announce it
    Add(i64),
    /// Add to the total silently
    Tick,
    /// Fail with a fault
    Boom,
    /// Panic inside the reducer
    Explode,
    /// Add 1 after a short delay
    Later,
    /// Add 10 from an async computation
    Fetch,
}

pub const TICK_AMOUNT: i64 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct TallyReducer;

impl Reducer for TallyReducer {
    type State = TallyState;
    type Action = TallyAction;
    type Notice = String;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut TallyState,
        action: TallyAction,
        _env: &(),
    ) -> Result<Effects<TallyAction, String>, Fault> {
        let TallyState::Ready { total } = state else {
            return Ok(smallvec![Effect::None]);
        };
        match action {
            TallyAction::Add(amount) => {
                *total = total.checked_add(amount).ok_or_else(|| Fault::new("total overflow"))?;
                Ok(smallvec![Effect::Notify(format!("added {amount}"))])
            },
            TallyAction::Tick => {
                *total += TICK_AMOUNT;
                Ok(smallvec![Effect::None])
            },
            TallyAction::Boom => Err(Fault::new("boom")),
            TallyAction::Explode => panic!("exploded"),
            TallyAction::Later => Ok(smallvec![Effect::Delay {
                duration: Duration::from_millis(10),
                action: Box::new(TallyAction::Add(1)),
            }]),
            TallyAction::Fetch => Ok(smallvec![Effect::Future(Box::pin(async {
                tokio::task::yield_now().await;
                Some(TallyAction::Add(10))
            }))]),
        }
    }
}

pub fn to_failed(state: &TallyState, fault: &Fault) -> Option<TallyState> {
    Some(TallyState::Failed {
        message: fault.to_string(),
        total: state.total(),
    })
}

/// A store with the recover hook and no ticker or persistence
pub async fn tally_store() -> Store<TallyReducer> {
    Store::builder(TallyReducer, ())
        .config(StoreConfig::new("tally"))
        .recover(to_failed)
        .start(TallyState::default())
        .await
}

pub const WAIT: Duration = Duration::from_secs(2);
