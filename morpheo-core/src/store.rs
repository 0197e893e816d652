//! Centralized state store with reducer chain and middleware
//!
//! A dispatch runs the action through the middleware chain (index 0..n) and
//! then folds the reducers left to right. Reducers receive the previous
//! reducer's output and return `Some(new_state)` only when they change
//! something; if none do, the `Arc<S>` held by the store is left untouched so
//! consumers can skip re-rendering with `Arc::ptr_eq`.
//!
//! # Example
//!
//! ```ignore
//! fn counter(state: &i64, action: &StateAction) -> Option<i64> {
//!     match action.kind.as_str() {
//!         "INCREMENT" => Some(state + 1),
//!         _ => None,
//!     }
//! }
//!
//! let mut store = Store::new(0)
//!     .with_reducer("counter", counter)
//!     .with_middleware(ThunkMiddleware);
//! store.dispatch(StateAction::new("INCREMENT"));
//! assert_eq!(*store.state(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::StateAction;
use crate::dispatcher::Dispatcher;
use crate::middleware::{Chain, Downstream, Middleware};
use crate::storage::{merge_objects, pick_keys, Storage};

/// Upper bound on actions processed by one drain of the queue.
///
/// Re-entrant dispatch (thunks, batches, middleware re-dispatching) is
/// iterative; this caps runaway loops.
///
/// The queue is depth first: actions queued while an action is processed
/// run right after it, ahead of anything that was already waiting.
pub const MAX_QUEUED_DISPATCHES: usize = 1024;

/// A reducer: `None` means "unchanged"
pub type Reducer<S> = Box<dyn Fn(&S, &StateAction) -> Option<S> + Send + Sync>;

type StoreListener<S> = Box<dyn Fn(&S) + Send>;
type PersistFn<S> = Box<dyn Fn(&S) + Send>;

/// Identifies a store listener for [`Store::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Which slice of the state is persisted, and where
#[derive(Clone)]
pub struct PersistOptions {
    /// Storage key the slice is saved under
    pub key: String,
    pub storage: Arc<dyn Storage>,
    /// Top-level keys to keep; wins over `exclude`
    pub include: Option<Vec<String>>,
    /// Top-level keys to drop
    pub exclude: Option<Vec<String>>,
}

impl PersistOptions {
    pub fn new(key: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            key: key.into(),
            storage,
            include: None,
            exclude: None,
        }
    }

    pub fn include<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.include = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.exclude = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

impl std::fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistOptions")
            .field("key", &self.key)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish()
    }
}

struct NamedReducer<S> {
    name: String,
    reducer: Reducer<S>,
}

/// Centralized state container
pub struct Store<S> {
    state: Arc<S>,
    reducers: Vec<NamedReducer<S>>,
    middleware: Vec<Box<dyn Middleware<S>>>,
    listeners: Vec<(ListenerId, StoreListener<S>)>,
    next_listener: u64,
    persist: Option<PersistFn<S>>,
    action_tx: mpsc::UnboundedSender<StateAction>,
    action_rx: mpsc::UnboundedReceiver<StateAction>,
    queue: VecDeque<StateAction>,
}

impl<S> Store<S> {
    /// Create a store with no reducers and no middleware
    pub fn new(state: S) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(state),
            reducers: Vec::new(),
            middleware: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            persist: None,
            action_tx,
            action_rx,
            queue: VecDeque::new(),
        }
    }

    /// Builder-style [`add_reducer`](Self::add_reducer)
    pub fn with_reducer<F>(mut self, name: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&S, &StateAction) -> Option<S> + Send + Sync + 'static,
    {
        self.add_reducer(name, reducer);
        self
    }

    /// Builder-style [`add_middleware`](Self::add_middleware)
    pub fn with_middleware<M: Middleware<S> + 'static>(mut self, middleware: M) -> Self {
        self.add_middleware(middleware);
        self
    }

    /// Append a reducer, replacing any reducer already registered under `name`
    pub fn add_reducer<F>(&mut self, name: impl Into<String>, reducer: F)
    where
        F: Fn(&S, &StateAction) -> Option<S> + Send + Sync + 'static,
    {
        let name = name.into();
        let reducer: Reducer<S> = Box::new(reducer);
        match self.reducers.iter_mut().find(|r| r.name == name) {
            Some(existing) => {
                debug!(reducer = %name, "Replacing reducer");
                existing.reducer = reducer;
            }
            None => self.reducers.push(NamedReducer { name, reducer }),
        }
    }

    /// Remove a reducer by name; returns whether one was registered
    pub fn remove_reducer(&mut self, name: &str) -> bool {
        let before = self.reducers.len();
        self.reducers.retain(|r| r.name != name);
        before != self.reducers.len()
    }

    /// Append a middleware at the end of the chain
    pub fn add_middleware<M: Middleware<S> + 'static>(&mut self, middleware: M) {
        self.middleware.push(Box::new(middleware));
    }

    /// Append an already boxed middleware
    pub fn add_boxed_middleware(&mut self, middleware: Box<dyn Middleware<S>>) {
        self.middleware.push(middleware);
    }

    /// Names of the registered reducers, in fold order
    pub fn reducer_names(&self) -> Vec<&str> {
        self.reducers.iter().map(|r| r.name.as_str()).collect()
    }

    /// Current state
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    /// Project the current state
    pub fn select<T>(&self, selector: impl Fn(&S) -> T) -> T {
        selector(&self.state)
    }

    /// Handle for dispatching from async work or other owners
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.action_tx.clone())
    }

    /// Call `listener` after every state change
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&S) + Send + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != self.listeners.len()
    }

    /// Dispatch an action, then drain everything it queued.
    ///
    /// Returns `true` if the state changed.
    pub fn dispatch(&mut self, action: StateAction) -> bool {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self.action_tx.send(action);
        self.drain()
    }

    /// Process actions that arrived from [`Dispatcher`] handles.
    ///
    /// Returns `true` if the state changed.
    pub fn process_pending(&mut self) -> bool {
        self.drain()
    }

    /// Wait for the next queued action (e.g. an api response), then drain.
    pub async fn next_async(&mut self) -> bool {
        match self.action_rx.recv().await {
            Some(action) => {
                let changed = self.run(action);
                self.drain() || changed
            }
            None => false,
        }
    }

    fn drain(&mut self) -> bool {
        let mut changed = false;
        let mut processed = 0;
        loop {
            while let Ok(action) = self.action_rx.try_recv() {
                self.queue.push_back(action);
            }
            let Some(action) = self.queue.pop_front() else {
                break;
            };
            if processed == MAX_QUEUED_DISPATCHES {
                warn!(
                    limit = MAX_QUEUED_DISPATCHES,
                    action = %action.kind,
                    dropped = self.queue.len() + 1,
                    "Dispatch queue limit reached, dropping queued actions"
                );
                self.queue.clear();
                break;
            }
            processed += 1;
            changed |= self.run(action);
        }
        changed
    }

    fn run(&mut self, action: StateAction) -> bool {
        let snapshot = Arc::clone(&self.state);
        let mut reduction = Reduction {
            state: &mut self.state,
            reducers: &self.reducers,
            action_tx: &self.action_tx,
            derived: Vec::new(),
            changed: false,
        };
        Chain::new(&mut self.middleware, &snapshot, &mut reduction).next(action);

        let changed = reduction.changed;
        for derived in reduction.derived.into_iter().rev() {
            self.queue.push_front(derived);
        }
        if changed {
            if let Some(persist) = &self.persist {
                persist(&self.state);
            }
            for (_, listener) in &self.listeners {
                listener(&self.state);
            }
        }
        changed
    }
}

impl<S> Store<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Persist the selected slice on every change, rehydrating from storage first.
    ///
    /// A stored slice is shallow-merged over the current state; if the merged
    /// value no longer deserializes, the stored slice is ignored.
    pub fn with_persistence(mut self, options: PersistOptions) -> Self {
        match options.storage.load(&options.key) {
            Ok(Some(saved)) => match serde_json::to_value(&*self.state) {
                Ok(mut merged) => {
                    merge_objects(&mut merged, &saved);
                    match serde_json::from_value::<S>(merged) {
                        Ok(state) => self.state = Arc::new(state),
                        Err(e) => warn!(key = %options.key, error = %e, "Ignoring persisted state"),
                    }
                }
                Err(e) => warn!(error = %e, "State is not serializable"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %options.key, error = %e, "Failed to load persisted state"),
        }

        self.persist = Some(Box::new(move |state: &S| {
            let value = match serde_json::to_value(state) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "State is not serializable");
                    return;
                }
            };
            let slice = pick_keys(
                &value,
                options.include.as_deref(),
                options.exclude.as_deref(),
            );
            if let Err(e) = options.storage.save(&options.key, &slice) {
                warn!(key = %options.key, error = %e, "Failed to persist state");
            }
        }));
        self
    }
}

/// Build a store from reducers, middleware and optional persistence
pub fn create_store<S>(
    initial: S,
    reducers: Vec<Reducer<S>>,
    middleware: Vec<Box<dyn Middleware<S>>>,
    persist: Option<PersistOptions>,
) -> Store<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    let mut store = Store::new(initial);
    for (i, reducer) in reducers.into_iter().enumerate() {
        store.reducers.push(NamedReducer {
            name: format!("reducer-{i}"),
            reducer,
        });
    }
    store.middleware = middleware;
    match persist {
        Some(options) => store.with_persistence(options),
        None => store,
    }
}

/// Terminal of the middleware chain: folds the reducers
struct Reduction<'a, S> {
    state: &'a mut Arc<S>,
    reducers: &'a [NamedReducer<S>],
    action_tx: &'a mpsc::UnboundedSender<StateAction>,
    /// Queued by middleware; runs before anything already waiting
    derived: Vec<StateAction>,
    changed: bool,
}

impl<S> Downstream<S> for Reduction<'_, S> {
    fn forward(&mut self, action: StateAction) {
        let mut current = Arc::clone(self.state);
        let mut touched = false;
        for reducer in self.reducers {
            if let Some(next) = (reducer.reducer)(&current, &action) {
                current = Arc::new(next);
                touched = true;
            }
        }
        if touched {
            *self.state = current;
            self.changed = true;
        }
    }

    fn enqueue(&mut self, action: StateAction) {
        self.derived.push(action);
    }

    fn current_state(&self) -> Arc<S> {
        Arc::clone(self.state)
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.action_tx.clone())
    }
}

/// Memoized projection of the state
///
/// [`poll`](Self::poll) reports a value only when it differs from the last
/// one seen, which is what a view needs to decide whether to re-render.
pub struct Selector<S, T> {
    select: Box<dyn Fn(&S) -> T + Send>,
    last: Option<T>,
}

impl<S, T: PartialEq> Selector<S, T> {
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&S) -> T + Send + 'static,
    {
        Self {
            select: Box::new(select),
            last: None,
        }
    }

    /// Returns the new value if it changed since the previous poll
    pub fn poll(&mut self, state: &S) -> Option<&T> {
        let value = (self.select)(state);
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value);
        self.last.as_ref()
    }

    /// Last value seen by [`poll`](Self::poll)
    pub fn current(&self) -> Option<&T> {
        self.last.as_ref()
    }
}

/// Shared store handed to consumers that do not own it
///
/// This is the provider: clone it into whatever needs to read or dispatch.
pub struct StoreHandle<S> {
    inner: Arc<Mutex<Store<S>>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> StoreHandle<S> {
    pub fn new(store: Store<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Lock the store for direct access
    pub fn lock(&self) -> MutexGuard<'_, Store<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dispatch(&self, action: StateAction) -> bool {
        self.lock().dispatch(action)
    }

    pub fn state(&self) -> Arc<S> {
        self.lock().state()
    }

    pub fn select<T>(&self, selector: impl Fn(&S) -> T) -> T {
        self.lock().select(selector)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.lock().dispatcher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct TestState {
        counter: i64,
        label: String,
    }

    fn counter_reducer(state: &TestState, action: &StateAction) -> Option<TestState> {
        match action.kind.as_str() {
            "INCREMENT" => Some(TestState {
                counter: state.counter + 1,
                ..state.clone()
            }),
            "DECREMENT" => Some(TestState {
                counter: state.counter - 1,
                ..state.clone()
            }),
            _ => None,
        }
    }

    fn label_reducer(state: &TestState, action: &StateAction) -> Option<TestState> {
        match action.kind.as_str() {
            "INCREMENT" => Some(TestState {
                label: format!("count={}", state.counter),
                ..state.clone()
            }),
            "SET_LABEL" => Some(TestState {
                label: action.payload_value()?.as_str()?.to_string(),
                ..state.clone()
            }),
            _ => None,
        }
    }

    #[test]
    fn test_store_dispatch() {
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);

        assert!(store.dispatch(StateAction::new("INCREMENT")));
        assert_eq!(store.state().counter, 1);

        assert!(store.dispatch(StateAction::new("DECREMENT")));
        assert_eq!(store.state().counter, 0);
    }

    #[test]
    fn test_unchanged_state_keeps_reference() {
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);
        let before = store.state();

        assert!(!store.dispatch(StateAction::new("UNKNOWN")));
        assert!(Arc::ptr_eq(&before, &store.state()));
    }

    #[test]
    fn test_reducers_fold_left_to_right() {
        let mut store = Store::new(TestState::default())
            .with_reducer("counter", counter_reducer)
            .with_reducer("label", label_reducer);

        store.dispatch(StateAction::new("INCREMENT"));
        // label reducer saw the counter reducer's output
        assert_eq!(store.state().label, "count=1");
    }

    #[test]
    fn test_dynamic_reducer_registration() {
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);
        store.add_reducer("label", label_reducer);
        assert_eq!(store.reducer_names(), vec!["counter", "label"]);

        assert!(store.remove_reducer("counter"));
        assert!(!store.remove_reducer("counter"));
        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(store.state().counter, 0);
    }

    #[test]
    fn test_listeners_only_on_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);
        let c = calls.clone();
        let id = store.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.dispatch(StateAction::new("INCREMENT"));
        store.dispatch(StateAction::new("NOOP"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(store.unsubscribe(id));
        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatcher_queue_processed_on_demand() {
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);
        let dispatcher = store.dispatcher();

        dispatcher.dispatch(StateAction::new("INCREMENT"));
        dispatcher.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(store.state().counter, 0);

        assert!(store.process_pending());
        assert_eq!(store.state().counter, 2);
    }

    #[test]
    fn test_selector_reports_changes_only() {
        let mut store = Store::new(TestState::default()).with_reducer("counter", counter_reducer);
        let mut selector = Selector::new(|s: &TestState| s.counter);

        assert_eq!(selector.poll(&store.state()), Some(&0));
        assert_eq!(selector.poll(&store.state()), None);

        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(selector.poll(&store.state()), Some(&1));
        assert_eq!(store.select(|s| s.counter * 10), 10);
    }

    #[test]
    fn test_persistence_include_wins() {
        let storage = Arc::new(MemoryStorage::new());
        let options = PersistOptions::new("app", storage.clone())
            .include(["counter"])
            .exclude(["counter", "label"]);
        let mut store = Store::new(TestState::default())
            .with_reducer("counter", counter_reducer)
            .with_persistence(options);

        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(storage.load("app").unwrap(), Some(json!({"counter": 1})));
    }

    #[test]
    fn test_persistence_exclude_and_rehydrate() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save("app", &json!({"counter": 41, "label": "ignored-later"}))
            .unwrap();

        let options = PersistOptions::new("app", storage.clone()).exclude(["label"]);
        let mut store = Store::new(TestState::default())
            .with_reducer("counter", counter_reducer)
            .with_persistence(options);
        assert_eq!(store.state().counter, 41);

        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(storage.load("app").unwrap(), Some(json!({"counter": 42})));
    }

    #[test]
    fn test_create_store() {
        let reducers: Vec<Reducer<TestState>> = vec![Box::new(counter_reducer)];
        let mut store = create_store(TestState::default(), reducers, Vec::new(), None);
        store.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(store.state().counter, 1);
        assert_eq!(store.reducer_names(), vec!["reducer-0"]);
    }

    #[test]
    fn test_store_handle_shares_state() {
        let handle = StoreHandle::new(
            Store::new(TestState::default()).with_reducer("counter", counter_reducer),
        );
        let other = handle.clone();

        other.dispatch(StateAction::new("INCREMENT"));
        assert_eq!(handle.select(|s| s.counter), 1);
    }
}
