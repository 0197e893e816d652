//! Debounce and throttle middleware
//!
//! Both read their options from action meta:
//!
//! ```json
//! {"type": "SEARCH", "payload": "ab", "meta": {"debounce": {"id": "search", "delay": 300}}}
//! {"type": "SCROLL", "meta": {"throttle": {"delay": 100}}}
//! ```
//!
//! The key defaults to the action type; `delay` is in milliseconds and may
//! also be given as a bare number (`"debounce": 250`).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Chain, Middleware};
use crate::action::StateAction;
use crate::timers::{runtime_available, Timers};

const DEFAULT_DELAY_MS: u64 = 300;

/// Per-action timing options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimingOptions {
    #[serde(default)]
    pub id: Option<String>,
    /// Window in milliseconds
    #[serde(default)]
    pub delay: Option<u64>,
}

impl TimingOptions {
    fn from_meta(value: &Value) -> Self {
        match value {
            Value::Number(n) => Self {
                id: None,
                delay: n.as_u64(),
            },
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    fn key(&self, action: &StateAction) -> String {
        self.id.clone().unwrap_or_else(|| action.kind.clone())
    }

    fn window(&self, default: Duration) -> Duration {
        self.delay.map(Duration::from_millis).unwrap_or(default)
    }
}

/// Keeps only the last action per key within the window
///
/// The surviving action is re-dispatched with `meta.debounce` removed once
/// the window elapses, so it travels the whole chain again from the top.
/// Middleware placed before this one therefore sees every debounced action
/// plus the final copy; put it first to hide the intermediate ones.
/// Outside a tokio runtime the action is forwarded immediately.
#[derive(Debug)]
pub struct DebounceMiddleware {
    timers: Timers,
    default_delay: Duration,
}

impl Default for DebounceMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceMiddleware {
    pub fn new() -> Self {
        Self::with_default_delay(Duration::from_millis(DEFAULT_DELAY_MS))
    }

    pub fn with_default_delay(default_delay: Duration) -> Self {
        Self {
            timers: Timers::new(),
            default_delay,
        }
    }

    /// Whether an action is waiting under `key`
    pub fn is_pending(&self, key: &str) -> bool {
        self.timers.is_pending(key)
    }
}

impl<S> Middleware<S> for DebounceMiddleware {
    fn handle(&mut self, mut action: StateAction, chain: &mut Chain<'_, S>) {
        let Some(options) = action.meta.remove("debounce").map(|v| TimingOptions::from_meta(&v))
        else {
            chain.next(action);
            return;
        };

        if !runtime_available() {
            warn!(action = %action.kind, "No async runtime, forwarding debounced action");
            chain.next(action);
            return;
        }

        let key = options.key(&action);
        let delay = options.window(self.default_delay);
        debug!(action = %action.kind, key = %key, ?delay, "Debouncing action");
        let dispatcher = chain.dispatcher();
        self.timers.schedule(key, delay, async move {
            dispatcher.dispatch(action);
        });
    }
}

/// Drops actions fired within the window of the last accepted one per key
///
/// Dropped actions are not queued. Keys whose window has closed are
/// forgotten on the next accepted action.
#[derive(Debug)]
pub struct ThrottleMiddleware {
    /// End of the open window per key
    windows: HashMap<String, Instant>,
    default_delay: Duration,
}

impl Default for ThrottleMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleMiddleware {
    pub fn new() -> Self {
        Self::with_default_delay(Duration::from_millis(DEFAULT_DELAY_MS))
    }

    pub fn with_default_delay(default_delay: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            default_delay,
        }
    }
}

impl<S> Middleware<S> for ThrottleMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        let Some(options) = action.meta.get("throttle").map(TimingOptions::from_meta) else {
            chain.next(action);
            return;
        };

        let key = options.key(&action);
        let delay = options.window(self.default_delay);
        let now = Instant::now();
        if self.windows.get(&key).is_some_and(|end| now < *end) {
            debug!(action = %action.kind, key = %key, "Throttled action dropped");
            return;
        }
        self.windows.retain(|_, end| now < *end);
        self.windows.insert(key, now + delay);
        chain.next(action);
    }
}
