//! The Store - runtime coordinator for a reducer.
//!
//! A store owns one state value and one processing loop. Everything that can
//! change the state reaches the loop through a channel and is applied in
//! arrival order:
//!
//! - actions from [`Store::send`]
//! - actions fed back by [`Effect::Future`] and [`Effect::Delay`]
//! - ticks from the background ticker
//! - subscribe/unsubscribe notifications and save requests
//!
//! All of them share one queue, so a save or an unsubscribe sees every
//! action sent before it. Only shutdown jumps the queue, and it still applies
//! whatever was queued before closing.
//!
//! Each action is reduced into a copy of the current state. A successful
//! reduction replaces the state and then runs its effects; a failed one
//! (an `Err(Fault)` or a panic) goes through the recover hook instead. No
//! fault ever reaches the caller of `send` or stops the loop.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::persistence::Persistence;
use crate::subscription::Subscription;
use crate::ticker::{self, MIN_PERIOD};
use mvi_core::effect::Effect;
use mvi_core::fault::Fault;
use mvi_core::reducer::Reducer;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle messages for the processing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Subscribed,
    Unsubscribed,
    Save,
}

/// Everything the processing loop applies, in arrival order
pub(crate) enum Inbound<A> {
    Action(A),
    Tick { generation: u64 },
    Control(Control),
}

/// Delivers a [`Control`] message onto a store's queue
pub(crate) type ControlSink = Arc<dyn Fn(Control) + Send + Sync>;

type RecoverHook<S> = Box<dyn Fn(&S, &Fault) -> Option<S> + Send + Sync>;
type ActionFactory<A> = Box<dyn Fn() -> A + Send + Sync>;

struct TickerSpec<A> {
    period: Duration,
    make_action: ActionFactory<A>,
}

/// Builder for a [`Store`]
///
/// Obtained from [`Store::builder`]. Nothing runs until [`start`](Self::start).
pub struct StoreBuilder<R: Reducer> {
    reducer: R,
    environment: R::Environment,
    config: StoreConfig,
    recover: Option<RecoverHook<R::State>>,
    ticker: Option<TickerSpec<R::Action>>,
    persistence: Option<Persistence<R::State>>,
}

impl<R> StoreBuilder<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: Send + 'static,
    R::Notice: Clone + Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    /// Use `config` instead of [`StoreConfig::default`]
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Convert faults into state
    ///
    /// The hook sees the state as it was before the failed action. Returning
    /// `Some` replaces the state; `None` keeps it. Without a hook faults are
    /// only logged.
    #[must_use]
    pub fn recover<F>(mut self, hook: F) -> Self
    where
        F: Fn(&R::State, &Fault) -> Option<R::State> + Send + Sync + 'static,
    {
        self.recover = Some(Box::new(hook));
        self
    }

    /// Dispatch `make_action()` every `period` while at least one
    /// [`Subscription`] exists
    ///
    /// The ticker starts when the subscriber count goes from zero to one and
    /// is cancelled when it drops back to zero. Its first action arrives one
    /// full period after it starts.
    #[must_use]
    pub fn while_subscribed<F>(mut self, period: Duration, make_action: F) -> Self
    where
        F: Fn() -> R::Action + Send + Sync + 'static,
    {
        self.ticker = Some(TickerSpec {
            period: period.max(MIN_PERIOD),
            make_action: Box::new(make_action),
        });
        self
    }

    /// Save and restore state through `persistence`
    #[must_use]
    pub fn persist(mut self, persistence: Persistence<R::State>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Restore saved state (if any) and spawn the processing loop
    ///
    /// `initial` is used when there is no persistence, nothing was saved, or
    /// the saved data cannot be read. A broken snapshot is logged and
    /// discarded; it never produces a fault.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(self, initial: R::State) -> Store<R> {
        let name = self.config.name.clone();

        let state = match &self.persistence {
            Some(persistence) => match persistence.restore().await {
                Ok(Some(restored)) => {
                    tracing::info!(store = %name, "Restored saved state");
                    restored
                },
                Ok(None) => {
                    tracing::debug!(store = %name, "No saved state, starting fresh");
                    initial
                },
                Err(error) => {
                    tracing::warn!(store = %name, error = %error, "Discarding unreadable saved state");
                    initial
                },
            },
            None => initial,
        };

        let (state_tx, state_rx) = watch::channel(state);
        let (notice_tx, _) = broadcast::channel(self.config.notice_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let lifetime = CancellationToken::new();
        let stop = lifetime.child_token();

        let (save_tx, save_worker) = match &self.persistence {
            Some(persistence) => {
                let (tx, handle) = persistence.spawn_worker(name.clone());
                (Some(tx), Some(handle))
            },
            None => (None, None),
        };
        let save_timer = self
            .persistence
            .as_ref()
            .and_then(|persistence| persistence.policy().periodic)
            .map(|period| {
                let period = period.max(MIN_PERIOD);
                let mut timer = tokio::time::interval_at(Instant::now() + period, period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                timer
            });

        let processor = Processor {
            name: name.clone(),
            reducer: self.reducer,
            environment: self.environment,
            state: state_tx,
            notices: notice_tx.clone(),
            inbound: inbound_tx.clone(),
            recover: self.recover,
            ticker: self.ticker,
            running_ticker: None,
            next_generation: 0,
            persistence: self.persistence,
            save_tx,
            save_worker,
            save_timer,
            subscribers: 0,
            effects: JoinSet::new(),
            lifetime: lifetime.clone(),
            stop: stop.clone(),
        };
        let task = tokio::spawn(processor.run(inbound_rx));

        tracing::info!(store = %name, "Store started");
        metrics::counter!("store.started").increment(1);

        Store {
            shared: Arc::new(Shared {
                name,
                inbound: inbound_tx,
                stop,
                state: state_rx,
                notices: Mutex::new(Some(notice_tx)),
                subscribers: Arc::new(AtomicUsize::new(0)),
                shutting_down: AtomicBool::new(false),
                shutdown_timeout: self.config.shutdown_timeout,
                lifetime,
                task: tokio::sync::Mutex::new(Some(task)),
            }),
        }
    }
}

struct Shared<S, A, N> {
    name: String,
    inbound: mpsc::UnboundedSender<Inbound<A>>,
    stop: CancellationToken,
    state: watch::Receiver<S>,
    notices: Mutex<Option<broadcast::Sender<N>>>,
    subscribers: Arc<AtomicUsize>,
    shutting_down: AtomicBool,
    shutdown_timeout: Duration,
    lifetime: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<S, A, N> Drop for Shared<S, A, N> {
    fn drop(&mut self) {
        // Last store handle gone: stop the loop even without an explicit shutdown
        self.lifetime.cancel();
    }
}

/// The Store - runtime coordinator for a reducer
///
/// The Store manages:
/// 1. State (published through a watch channel)
/// 2. Reducer (business logic, run on the processing loop)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
/// 5. Notices (broadcast, no replay)
///
/// Cloning a store yields another handle to the same loop.
pub struct Store<R: Reducer> {
    shared: Arc<Shared<R::State, R::Action, R::Notice>>,
}

impl<R: Reducer> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Reducer> std::fmt::Debug for Store<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.shared.name)
            .field("subscribers", &self.shared.subscribers.load(Ordering::Acquire))
            .field("shutting_down", &self.shared.shutting_down.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<R> Store<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: Send + 'static,
    R::Notice: Clone + Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    /// Start building a store around `reducer` and `environment`
    #[must_use]
    pub fn builder(reducer: R, environment: R::Environment) -> StoreBuilder<R> {
        StoreBuilder {
            reducer,
            environment,
            config: StoreConfig::default(),
            recover: None,
            ticker: None,
            persistence: None,
        }
    }

    /// Send an action to the store
    ///
    /// The action is queued onto the processing loop and applied after every
    /// action queued before it. There is no result: the outcome shows up on
    /// the state and notice streams.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownInProgress`] if shutdown has begun
    /// - [`StoreError::ChannelClosed`] if the processing loop is gone
    #[tracing::instrument(skip(self, action), fields(store = %self.shared.name), level = "trace")]
    pub fn send(&self, action: R::Action) -> Result<(), StoreError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            metrics::counter!("store.shutdown.rejected_actions").increment(1);
            return Err(StoreError::ShutdownInProgress);
        }
        self.shared
            .inbound
            .send(Inbound::Action(action))
            .map_err(|_| StoreError::ChannelClosed)
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let value = store.state(|s| s.value());
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&R::State) -> T,
    {
        f(&*self.shared.state.borrow())
    }

    /// Register an observer of the state
    ///
    /// The background ticker (if configured) runs while at least one
    /// subscription is alive.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<R::State> {
        let mut receiver = self.shared.state.clone();
        // Only replacements after this point count as `next`
        receiver.borrow_and_update();
        let inbound = self.shared.inbound.clone();
        let sink: ControlSink = Arc::new(move |message| {
            // A closed loop just means there is nothing left to gate
            let _ = inbound.send(Inbound::Control(message));
        });
        Subscription::register(receiver, sink, Arc::clone(&self.shared.subscribers))
    }

    /// Subscribe to notices emitted from now on
    ///
    /// Notices are not replayed to late subscribers. After shutdown the
    /// returned receiver is already closed.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<R::Notice> {
        let notices = self.shared.notices.lock().unwrap_or_else(PoisonError::into_inner);
        match notices.as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Number of live [`Subscription`]s
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.load(Ordering::Acquire)
    }

    /// Ask the store to save its state once every action sent so far is applied
    ///
    /// A no-op for stores without persistence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ChannelClosed`] if the processing loop is gone.
    pub fn save_now(&self) -> Result<(), StoreError> {
        self.shared
            .inbound
            .send(Inbound::Control(Control::Save))
            .map_err(|_| StoreError::ChannelClosed)
    }

    /// The configured store name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether shutdown has begun
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::Acquire)
    }

    /// Gracefully shut down the store
    ///
    /// 1. Stops accepting new actions
    /// 2. Applies actions that were already queued
    /// 3. Cancels the ticker and aborts running effect tasks
    /// 4. Lets the save worker finish its last write (best-effort within `timeout`)
    /// 5. Closes the state and notice streams
    ///
    /// Calling it again after it completed returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownTimeout`] if the loop did not finish in time
    ///   (it is aborted)
    /// - [`StoreError::LoopFailed`] if the loop task panicked
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!(store = %self.shared.name, "Initiating graceful shutdown");
        metrics::counter!("store.shutdown.initiated").increment(1);

        self.shared.shutting_down.store(true, Ordering::Release);
        self.shared.stop.cancel();

        let Some(mut task) = self.shared.task.lock().await.take() else {
            return Ok(());
        };

        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {
                metrics::counter!("store.shutdown.completed").increment(1);
                tracing::info!(store = %self.shared.name, "Shutdown complete");
                Ok(())
            },
            Ok(Err(error)) => {
                tracing::error!(store = %self.shared.name, error = %error, "Processing loop failed");
                Err(StoreError::LoopFailed(error.to_string()))
            },
            Err(_) => {
                task.abort();
                metrics::counter!("store.shutdown.timeout").increment(1);
                tracing::error!(store = %self.shared.name, timeout = ?timeout, "Shutdown timed out");
                Err(StoreError::ShutdownTimeout(timeout))
            },
        };

        self.shared
            .notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        result
    }

    /// Shut down with the configured [`StoreConfig::shutdown_timeout`]
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn close(&self) -> Result<(), StoreError> {
        self.shutdown(self.shared.shutdown_timeout).await
    }
}

/// The processing loop's owned state
struct Processor<R: Reducer> {
    name: String,
    reducer: R,
    environment: R::Environment,
    state: watch::Sender<R::State>,
    notices: broadcast::Sender<R::Notice>,
    inbound: mpsc::UnboundedSender<Inbound<R::Action>>,
    recover: Option<RecoverHook<R::State>>,
    ticker: Option<TickerSpec<R::Action>>,
    running_ticker: Option<(u64, CancellationToken)>,
    next_generation: u64,
    persistence: Option<Persistence<R::State>>,
    save_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    save_worker: Option<JoinHandle<()>>,
    save_timer: Option<Interval>,
    subscribers: usize,
    effects: JoinSet<()>,
    lifetime: CancellationToken,
    stop: CancellationToken,
}

impl<R> Processor<R>
where
    R: Reducer + Send + Sync + 'static,
    R::State: Clone + Send + Sync + 'static,
    R::Action: Send + 'static,
    R::Notice: Clone + Send + 'static,
    R::Environment: Send + Sync + 'static,
{
    async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Inbound<R::Action>>) {
        let lifetime = self.lifetime.clone();
        let stop = self.stop.clone();
        let graceful = loop {
            tokio::select! {
                biased;
                () = lifetime.cancelled() => {
                    tracing::debug!(store = %self.name, "All store handles dropped");
                    break false;
                }
                () = stop.cancelled() => break true,
                Some(message) = inbound.recv() => self.handle_inbound(message),
                () = next_save(&mut self.save_timer) => self.save("periodic"),
                Some(result) = self.effects.join_next(), if !self.effects.is_empty() => {
                    if let Err(error) = result {
                        if error.is_panic() {
                            tracing::warn!(store = %self.name, error = %error, "Effect task panicked");
                        }
                    }
                }
            }
        };

        self.stop_ticker();
        // No ticker may start while draining
        self.ticker = None;
        if graceful {
            while let Ok(message) = inbound.try_recv() {
                self.handle_inbound(message);
            }
        }
        self.finish().await;
    }

    fn handle_control(&mut self, message: Control) {
        match message {
            Control::Subscribed => {
                self.subscribers += 1;
                #[allow(clippy::cast_precision_loss)]
                metrics::gauge!("store.subscribers").set(self.subscribers as f64);
                if self.subscribers == 1 {
                    self.start_ticker();
                }
            },
            Control::Unsubscribed => {
                self.subscribers = self.subscribers.saturating_sub(1);
                #[allow(clippy::cast_precision_loss)]
                metrics::gauge!("store.subscribers").set(self.subscribers as f64);
                if self.subscribers == 0 {
                    self.stop_ticker();
                    if self.saves_on_unsubscribe() {
                        self.save("unsubscribe");
                    }
                }
            },
            Control::Save => self.save("requested"),
        }
    }

    fn handle_inbound(&mut self, message: Inbound<R::Action>) {
        match message {
            Inbound::Action(action) => self.process(action),
            Inbound::Control(control) => self.handle_control(control),
            Inbound::Tick { generation } => {
                let current = self.running_ticker.as_ref().map(|(current, _)| *current);
                if current != Some(generation) {
                    tracing::trace!(store = %self.name, generation, "Dropping stale tick");
                    return;
                }
                let Some(ticker) = &self.ticker else {
                    return;
                };
                metrics::counter!("store.ticks.total").increment(1);
                let action = (ticker.make_action)();
                self.process(action);
            },
        }
    }

    fn process(&mut self, action: R::Action) {
        tracing::debug!(store = %self.name, "Processing action");
        metrics::counter!("store.actions.total").increment(1);

        let mut next = self.state.borrow().clone();
        let reducer = &self.reducer;
        let environment = &self.environment;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            reducer.reduce(&mut next, action, environment)
        }))
        .unwrap_or_else(|payload| Err(Fault::from_panic(payload.as_ref())));

        match outcome {
            Ok(effects) => {
                self.state.send_replace(next);
                tracing::trace!(store = %self.name, effects = effects.len(), "State committed");
                for effect in effects {
                    self.execute(effect);
                }
            },
            Err(fault) => self.recover(&fault),
        }
    }

    fn recover(&self, fault: &Fault) {
        metrics::counter!("store.faults.total").increment(1);
        tracing::error!(store = %self.name, fault = %fault, "Recovering from unhandled fault");

        let Some(hook) = &self.recover else {
            return;
        };
        let replacement = {
            let current = self.state.borrow();
            panic::catch_unwind(AssertUnwindSafe(|| hook(&*current, fault)))
        };
        match replacement {
            Ok(Some(state)) => {
                self.state.send_replace(state);
            },
            Ok(None) => {},
            Err(payload) => {
                let secondary = Fault::from_panic(payload.as_ref());
                tracing::error!(store = %self.name, fault = %secondary, "Recover hook panicked, keeping state");
            },
        }
    }

    fn execute(&mut self, effect: Effect<R::Action, R::Notice>) {
        match effect {
            Effect::None => {},
            Effect::Notify(notice) => {
                // No receivers is fine: notices are never replayed
                let _ = self.notices.send(notice);
                metrics::counter!("store.notices.total").increment(1);
            },
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.execute(effect);
                }
            },
            Effect::Delay { duration, action } => {
                let inbound = self.inbound.clone();
                self.effects.spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = inbound.send(Inbound::Action(*action));
                });
            },
            Effect::Future(future) => {
                let inbound = self.inbound.clone();
                self.effects.spawn(async move {
                    if let Some(action) = future.await {
                        let _ = inbound.send(Inbound::Action(action));
                    }
                });
            },
        }
    }

    fn start_ticker(&mut self) {
        let Some(ticker) = &self.ticker else {
            return;
        };
        let generation = self.next_generation;
        self.next_generation += 1;

        let token = self.lifetime.child_token();
        self.effects.spawn(ticker::run(
            ticker.period,
            generation,
            self.inbound.clone(),
            token.clone(),
        ));
        self.running_ticker = Some((generation, token));
        tracing::info!(store = %self.name, generation, period = ?ticker.period, "Ticker started");
    }

    fn stop_ticker(&mut self) {
        if let Some((generation, token)) = self.running_ticker.take() {
            token.cancel();
            tracing::info!(store = %self.name, generation, "Ticker stopped");
        }
    }

    fn saves_on_unsubscribe(&self) -> bool {
        self.persistence
            .as_ref()
            .is_some_and(|persistence| persistence.policy().on_unsubscribe)
    }

    fn save(&self, trigger: &'static str) {
        let (Some(persistence), Some(worker)) = (&self.persistence, &self.save_tx) else {
            return;
        };
        let state = self.state.borrow();
        match persistence.encode(&*state) {
            Ok(Some(bytes)) => {
                tracing::trace!(store = %self.name, trigger, "Queued state snapshot");
                let _ = worker.send(bytes);
            },
            Ok(None) => {
                tracing::trace!(store = %self.name, trigger, "Current state is not persisted, skipping save");
            },
            Err(error) => {
                metrics::counter!("store.saves.failed").increment(1);
                tracing::warn!(store = %self.name, trigger, error = %error, "Failed to encode state snapshot");
            },
        }
    }

    async fn finish(mut self) {
        // Shutting down removes every observer at once
        if self.subscribers > 0 && self.saves_on_unsubscribe() {
            self.save("shutdown");
        }

        self.effects.shutdown().await;

        drop(self.save_tx.take());
        if let Some(worker) = self.save_worker.take() {
            if let Err(error) = worker.await {
                tracing::warn!(store = %self.name, error = %error, "Save worker failed");
            }
        }
        tracing::info!(store = %self.name, "Store stopped");
    }
}

/// Resolves on the next periodic save, or never when saving is not periodic
async fn next_save(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        },
        None => std::future::pending::<()>().await,
    }
}
