//! Local persistence middleware
//!
//! Watches a set of dot paths in the state and writes them to storage a
//! short while after they last changed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{Chain, Middleware};
use crate::action::StateAction;
use crate::storage::{select_paths, Storage};
use crate::timers::{runtime_available, Timers};

const DEFAULT_PERSIST_DELAY_MS: u64 = 1000;

/// Where and how often selected state paths are written
#[derive(Clone)]
pub struct LocalPersistenceOptions {
    pub key: String,
    /// Dot paths into the serialized state, e.g. `"form.email"`
    pub paths: Vec<String>,
    pub delay: Duration,
    pub storage: Arc<dyn Storage>,
}

impl LocalPersistenceOptions {
    pub fn new<I, P>(key: impl Into<String>, paths: I, storage: Arc<dyn Storage>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            key: key.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            delay: Duration::from_millis(DEFAULT_PERSIST_DELAY_MS),
            storage,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl std::fmt::Debug for LocalPersistenceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPersistenceOptions")
            .field("key", &self.key)
            .field("paths", &self.paths)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Debounced writer for selected state paths
pub struct LocalPersistenceMiddleware {
    options: LocalPersistenceOptions,
    last: Option<Map<String, Value>>,
    timers: Timers,
}

impl LocalPersistenceMiddleware {
    pub fn new(options: LocalPersistenceOptions) -> Self {
        Self {
            options,
            last: None,
            timers: Timers::new(),
        }
    }

    fn select<S: Serialize>(&self, state: &S) -> Option<Map<String, Value>> {
        match serde_json::to_value(state) {
            Ok(value) => Some(select_paths(&value, &self.options.paths)),
            Err(e) => {
                warn!(error = %e, "State is not serializable");
                None
            }
        }
    }

    fn write(&mut self, slice: Map<String, Value>) {
        let storage = Arc::clone(&self.options.storage);
        let key = self.options.key.clone();
        let value = Value::Object(slice);

        if !runtime_available() {
            save(storage.as_ref(), &key, &value);
            return;
        }
        let timer_key = key.clone();
        self.timers
            .schedule(timer_key, self.options.delay, async move {
                save(storage.as_ref(), &key, &value);
            });
    }
}

fn save(storage: &dyn Storage, key: &str, value: &Value) {
    match storage.save(key, value) {
        Ok(()) => debug!(key = %key, "Persisted state slice"),
        Err(e) => warn!(key = %key, error = %e, "Failed to persist state slice"),
    }
}

impl<S: Serialize> Middleware<S> for LocalPersistenceMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        if self.last.is_none() {
            self.last = self.select(chain.state());
        }

        chain.next(action);

        let Some(current) = self.select(&*chain.current_state()) else {
            return;
        };
        if self.last.as_ref() != Some(&current) {
            self.last = Some(current.clone());
            self.write(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::store::Store;
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize)]
    struct Form {
        email: String,
        clicks: u32,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    struct AppState {
        form: Form,
    }

    fn reducer(state: &AppState, action: &StateAction) -> Option<AppState> {
        let mut next = state.clone();
        match action.kind.as_str() {
            "SET_EMAIL" => next.form.email = action.payload_value()?.as_str()?.to_string(),
            "CLICK" => next.form.clicks += 1,
            _ => return None,
        }
        Some(next)
    }

    fn store(storage: Arc<MemoryStorage>, delay: u64) -> Store<AppState> {
        let options = LocalPersistenceOptions::new("form", ["form.email"], storage)
            .delay(Duration::from_millis(delay));
        Store::new(AppState::default())
            .with_reducer("form", reducer)
            .with_middleware(LocalPersistenceMiddleware::new(options))
    }

    #[test]
    fn test_writes_immediately_without_runtime() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = store(storage.clone(), 1000);

        store.dispatch(StateAction::new("SET_EMAIL").with_payload("a@b.c"));
        assert_eq!(
            storage.load("form").unwrap(),
            Some(json!({"form.email": "a@b.c"}))
        );
    }

    #[test]
    fn test_untracked_change_not_written() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = store(storage.clone(), 1000);

        store.dispatch(StateAction::new("CLICK"));
        assert!(storage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounces_writes() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = store(storage.clone(), 100);

        store.dispatch(StateAction::new("SET_EMAIL").with_payload("a"));
        store.dispatch(StateAction::new("SET_EMAIL").with_payload("ab"));
        assert!(storage.is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            storage.load("form").unwrap(),
            Some(json!({"form.email": "ab"}))
        );
    }
}
