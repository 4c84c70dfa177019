//! Executes reducer effects for the temple booking services.
//!
//! [`Store`] wraps one aggregate: its state behind a lock, its reducer, and
//! the environment the effects draw on. [`Store::send`] reduces an action,
//! runs whatever effects come back, and keeps feeding produced actions in
//! until nothing is left. Everything is awaited inline; the API spins up a
//! store per request and reads the state as soon as `send` returns.
//!
//! ```ignore
//! let store = Store::new(OrderState::new(), OrderReducer::new(), env);
//! let event = store
//!     .send_and_wait_for(OrderAction::PlaceOrder { order }, OrderAction::is_event, Duration::from_secs(10))
//!     .await?;
//! ```

use futures::future::{BoxFuture, join_all};
use std::time::Duration;
use temple_booking_core::{effect::Effect, reducer::Reducer};
use thiserror::Error;
use tokio::sync::RwLock;

/// Why [`Store::send_and_wait_for`] came back empty-handed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// Effects were still running when the deadline passed.
    #[error("Timed out waiting for the action to settle")]
    Timeout,

    /// Effects finished but none produced a matching action.
    #[error("No matching action was produced")]
    NoMatchingAction,
}

/// A reducer together with its state and environment.
pub struct Store<R: Reducer> {
    state: RwLock<R::State>,
    reducer: R,
    env: R::Environment,
}

impl<R> Store<R>
where
    R: Reducer + Sync,
    R::State: Send + Sync,
    R::Action: Clone + Send,
    R::Environment: Sync,
{
    /// Wrap `state`.
    #[must_use]
    pub fn new(state: R::State, reducer: R, env: R::Environment) -> Self {
        Self {
            state: RwLock::new(state),
            reducer,
            env,
        }
    }

    /// Reduce `action` and run effects until none remain.
    ///
    /// Returns every action the effects produced, in the order they were
    /// reduced. The state lock is only held while reducing.
    #[tracing::instrument(skip_all, name = "store_send")]
    pub async fn send(&self, action: R::Action) -> Vec<R::Action> {
        self.reduce_and_run(action).await
    }

    /// [`send`](Self::send), then pick the first produced action matching `wanted`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Timeout`] when the effects outlive `timeout`;
    /// [`RuntimeError::NoMatchingAction`] when they finish without a match.
    pub async fn send_and_wait_for<F>(
        &self,
        action: R::Action,
        wanted: F,
        timeout: Duration,
    ) -> Result<R::Action, RuntimeError>
    where
        F: Fn(&R::Action) -> bool,
    {
        tokio::time::timeout(timeout, self.reduce_and_run(action))
            .await
            .map_err(|_| RuntimeError::Timeout)?
            .into_iter()
            .find(|a| wanted(a))
            .ok_or(RuntimeError::NoMatchingAction)
    }

    /// Project the current state.
    pub async fn state<T>(&self, read: impl FnOnce(&R::State) -> T) -> T {
        read(&*self.state.read().await)
    }

    fn reduce_and_run(&self, action: R::Action) -> BoxFuture<'_, Vec<R::Action>> {
        Box::pin(async move {
            let effects = {
                let mut state = self.state.write().await;
                self.reducer.reduce(&mut state, action, &self.env)
            };
            self.run_all(effects.into_vec()).await
        })
    }

    async fn run_all(&self, effects: Vec<Effect<R::Action>>) -> Vec<R::Action> {
        join_all(effects.into_iter().map(|e| self.run(e)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn run(&self, effect: Effect<R::Action>) -> BoxFuture<'_, Vec<R::Action>> {
        Box::pin(async move {
            let kind = match &effect {
                Effect::None => "none",
                Effect::Future(_) => "future",
                Effect::Delay { .. } => "delay",
                Effect::Parallel(_) => "parallel",
                Effect::Sequential(_) => "sequential",
            };
            tracing::trace!(kind, "running effect");
            metrics::counter!("store_effects_executed_total", "type" => kind).increment(1);

            match effect {
                Effect::None => Vec::new(),
                Effect::Future(fut) => match fut.await {
                    Some(action) => self.feed_back(action).await,
                    None => Vec::new(),
                },
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    self.feed_back(*action).await
                }
                Effect::Parallel(children) => self.run_all(children).await,
                Effect::Sequential(children) => {
                    let mut produced = Vec::new();
                    for child in children {
                        produced.extend(self.run(child).await);
                    }
                    produced
                }
            }
        })
    }

    async fn feed_back(&self, action: R::Action) -> Vec<R::Action> {
        let mut produced = vec![action.clone()];
        produced.extend(self.reduce_and_run(action).await);
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temple_booking_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Increment,
        Decrement,
        ProduceEffect,
        ProduceDelayedAction,
        ProduceParallelEffects,
        ProduceSequentialEffects,
    }

    #[derive(Debug, Clone)]
    struct TestEnv;

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                }
                TestAction::Decrement => {
                    state.value -= 1;
                    smallvec![Effect::None]
                }
                TestAction::ProduceEffect => {
                    smallvec![Effect::future(async { Some(TestAction::Increment) })]
                }
                TestAction::ProduceDelayedAction => smallvec![Effect::Delay {
                    duration: Duration::from_millis(10),
                    action: Box::new(TestAction::Increment),
                }],
                TestAction::ProduceParallelEffects => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                ])],
                TestAction::ProduceSequentialEffects => smallvec![Effect::chain(vec![
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::Decrement) }),
                ])],
            }
        }
    }

    fn store() -> Store<TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv)
    }

    #[tokio::test]
    async fn test_send_runs_reducer() {
        let store = store();
        let produced = store.send(TestAction::Increment).await;

        assert!(produced.is_empty());
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_future_effect_feeds_back() {
        let store = store();
        let produced = store.send(TestAction::ProduceEffect).await;

        assert_eq!(produced, vec![TestAction::Increment]);
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_delay_effect() {
        let store = store();
        store.send(TestAction::ProduceDelayedAction).await;
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_parallel_effects() {
        let store = store();
        let produced = store.send(TestAction::ProduceParallelEffects).await;

        assert_eq!(produced.len(), 3);
        assert_eq!(store.state(|s| s.value).await, 3);
    }

    #[tokio::test]
    async fn test_sequential_effects_keep_order() {
        let store = store();
        let produced = store.send(TestAction::ProduceSequentialEffects).await;

        assert_eq!(
            produced,
            vec![TestAction::Increment, TestAction::Increment, TestAction::Decrement]
        );
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_send_and_wait_for_matches() {
        let store = store();
        let result = store
            .send_and_wait_for(
                TestAction::ProduceEffect,
                |a| matches!(a, TestAction::Increment),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(result, Ok(TestAction::Increment));
    }

    #[tokio::test]
    async fn test_send_and_wait_for_without_match() {
        let store = store();
        let result = store
            .send_and_wait_for(
                TestAction::Increment,
                |a| matches!(a, TestAction::Decrement),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(result, Err(RuntimeError::NoMatchingAction));
    }

    #[tokio::test]
    async fn test_send_and_wait_for_times_out() {
        let store = store();
        let result = store
            .send_and_wait_for(
                TestAction::ProduceDelayedAction,
                |_| true,
                Duration::from_millis(1),
            )
            .await;

        assert_eq!(result, Err(RuntimeError::Timeout));
    }
}
