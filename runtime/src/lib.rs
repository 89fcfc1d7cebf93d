//! # Batchtrace Runtime
//!
//! The [`Store`] coordinates a reducer with its state and environment.
//!
//! - Every action is reduced while holding the state's write lock, so all
//!   mutations are applied atomically and in a single total order.
//! - Effects returned by the reducer run on spawned tokio tasks after the lock
//!   is released. Actions they produce are broadcast to observers and fed back
//!   into the store.
//! - Readers take the read lock and never see a half-applied action.
//!
//! ## Example
//!
//! ```ignore
//! use batchtrace_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action and wait for the effects it spawned
//! let handle = store.send(Action::DoSomething).await?;
//! handle.wait().await;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use batchtrace_core::{effect::Effect, reducer::Reducer};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The store is shutting down and rejects new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out with effects still running
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Waiting for effects took longer than allowed
        #[error("Timed out waiting for effects")]
        Timeout,
    }
}

pub use error::StoreError;

/// Handle to the effects spawned by one `send`.
///
/// Waiting on the handle waits for every effect the action produced,
/// including effects of actions those effects fed back into the store.
#[derive(Debug, Default)]
pub struct EffectHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl EffectHandle {
    /// A handle with nothing to wait for.
    #[must_use]
    pub const fn completed() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Number of effect tasks tracked by this handle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no effect tasks were spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every tracked effect has finished.
    ///
    /// A panicking effect task is logged and otherwise ignored.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(error) = task.await {
                tracing::error!(%error, "Effect task failed");
            }
        }
    }

    /// Wait for the effects, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the effects are still running when
    /// the timeout expires.
    pub async fn wait_with_timeout(self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

/// Decrements the store-wide pending effect counter when dropped.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - the runtime coordinator
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, BoxFuture, Duration, Effect, EffectHandle, JoinHandle,
        Ordering, PendingGuard, Reducer, RwLock, StoreError, broadcast,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`, single writer)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Cloning a store is cheap and yields a handle to the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Actions produced by effects, for observers (audit tails, tests).
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The action broadcast buffers 16 actions; use
        /// [`Store::with_broadcast_capacity`] for busier observers.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new store with a custom action broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Borrow the injected environment.
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Calls the reducer with (state, action, environment)
        /// 3. Releases the lock and spawns the returned effects
        ///
        /// `send()` returns once the effects are started, not finished. Use the
        /// returned [`EffectHandle`] to wait for them.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip_all, name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            let ((), handle) = self.send_then(action, |_| ()).await?;
            Ok(handle)
        }

        /// Send an action and inspect the resulting state before the lock is released.
        ///
        /// The inspector runs under the same write lock as the reducer, so it
        /// observes exactly the state this action produced. This is how callers
        /// collect a synchronous result the reducer left in its state.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send_then<T, F>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<(T, EffectHandle), StoreError>
        where
            F: FnOnce(&mut S) -> T,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejecting action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions").increment(1);

            let (output, effects) = {
                let mut state = self.state.write().await;
                let effects = self
                    .reducer
                    .reduce(&mut *state, action, &self.environment);
                (inspect(&mut *state), effects)
            };

            let mut tasks = Vec::new();
            for effect in effects {
                self.spawn_effect(effect, &mut tasks);
            }
            Ok((output, EffectHandle { tasks }))
        }

        /// Read from the current state
        ///
        /// # Example
        ///
        /// ```ignore
        /// let pending = store.state(|s| s.pending.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Subscribe to actions produced by effects
        ///
        /// Only fed-back actions are broadcast, not the ones passed to `send`.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Number of effect tasks currently running.
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Stop accepting actions and wait for running effects to drain
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout expires.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(50);

            loop {
                let pending = self.pending_effects();
                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Spawn one effect, pushing the tasks it creates onto `tasks`.
        fn spawn_effect(&self, effect: Effect<A>, tasks: &mut Vec<JoinHandle<()>>) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guard = PendingGuard::enter(&self.pending_effects);
                    let store = self.clone();
                    tasks.push(tokio::spawn(async move {
                        let _guard = guard;
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    }));
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let guard = PendingGuard::enter(&self.pending_effects);
                    let store = self.clone();
                    tasks.push(tokio::spawn(async move {
                        let _guard = guard;
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    }));
                },
                Effect::Parallel(effects) => {
                    for effect in effects {
                        self.spawn_effect(effect, tasks);
                    }
                },
                Effect::Sequential(effects) => {
                    let guard = PendingGuard::enter(&self.pending_effects);
                    let store = self.clone();
                    tasks.push(tokio::spawn(async move {
                        let _guard = guard;
                        for effect in effects {
                            let mut inner = Vec::new();
                            store.spawn_effect(effect, &mut inner);
                            EffectHandle { tasks: inner }.wait().await;
                        }
                    }));
                },
            }
        }

        /// Broadcast an effect-produced action and reduce it.
        fn feed_back(&self, action: A) -> BoxFuture<'static, ()> {
            let store = self.clone();
            Box::pin(async move {
                let _ = store.action_broadcast.send(action.clone());
                match store.send(action).await {
                    Ok(handle) => handle.wait().await,
                    Err(error) => tracing::warn!(%error, "Dropped fed-back action"),
                }
            })
        }
    }
}

pub use store::Store;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;
    use batchtrace_core::{SmallVec, smallvec};

    #[derive(Debug, Clone, Default)]
    struct Ledger {
        entries: Vec<u32>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum LedgerAction {
        Record(u32),
        RecordLater(u32),
        RecordBoth(u32, u32),
    }

    struct LedgerReducer;

    impl Reducer for LedgerReducer {
        type State = Ledger;
        type Action = LedgerAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Ledger,
            action: LedgerAction,
            _env: &(),
        ) -> SmallVec<[Effect<LedgerAction>; 4]> {
            match action {
                LedgerAction::Record(value) => {
                    state.entries.push(value);
                    smallvec![Effect::None]
                },
                LedgerAction::RecordLater(value) => {
                    smallvec![Effect::Future(Box::pin(async move {
                        Some(LedgerAction::Record(value))
                    }))]
                },
                LedgerAction::RecordBoth(first, second) => smallvec![Effect::chain(vec![
                    Effect::Future(Box::pin(async move { Some(LedgerAction::Record(first)) })),
                    Effect::Delay {
                        duration: Duration::from_millis(5),
                        action: Box::new(LedgerAction::Record(second)),
                    },
                ])],
            }
        }
    }

    #[tokio::test]
    async fn send_applies_reducer() {
        let store = Store::new(Ledger::default(), LedgerReducer, ());
        store.send(LedgerAction::Record(1)).await.unwrap().wait().await;
        assert_eq!(store.state(|s| s.entries.clone()).await, vec![1]);
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = Store::new(Ledger::default(), LedgerReducer, ());
        let mut observer = store.subscribe_actions();

        let handle = store.send(LedgerAction::RecordLater(7)).await.unwrap();
        handle.wait().await;

        assert_eq!(store.state(|s| s.entries.clone()).await, vec![7]);
        assert_eq!(observer.recv().await.unwrap(), LedgerAction::Record(7));
        assert_eq!(store.pending_effects(), 0);
    }

    #[tokio::test]
    async fn sequential_effects_keep_order() {
        let store = Store::new(Ledger::default(), LedgerReducer, ());
        store
            .send(LedgerAction::RecordBoth(1, 2))
            .await
            .unwrap()
            .wait_with_timeout(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.state(|s| s.entries.clone()).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn send_then_sees_state_of_this_action() {
        let store = Store::new(Ledger::default(), LedgerReducer, ());
        let (len, handle) = store
            .send_then(LedgerAction::Record(3), |s| s.entries.len())
            .await
            .unwrap();
        assert_eq!(len, 1);
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = Store::new(Ledger::default(), LedgerReducer, ());
        store.shutdown(Duration::from_secs(1)).await.unwrap();
        let result = store.send(LedgerAction::Record(1)).await;
        assert_eq!(result.unwrap_err(), StoreError::ShutdownInProgress);
    }
}
