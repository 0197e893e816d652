//! Keyed timers for debounced work
//!
//! Scheduling work under a key that is already pending aborts the pending
//! task first, so only the most recent schedule for a key ever runs.
//!
//! ```ignore
//! let mut timers = Timers::new();
//! timers.schedule("search", Duration::from_millis(200), async move {
//!     dispatcher.dispatch(StateAction::new("SEARCH"));
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;

/// Whether a tokio runtime is available to run timers on
pub fn runtime_available() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

/// Registry of pending keyed timers
#[derive(Debug, Default)]
pub struct Timers {
    tasks: HashMap<String, AbortHandle>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` after `delay`, replacing any pending work for `key`.
    ///
    /// Returns `false` (and drops `work`) when called outside a tokio runtime.
    pub fn schedule<F>(&mut self, key: impl Into<String>, delay: Duration, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let key = key.into();
        self.cancel(&key);
        self.tasks.retain(|_, handle| !handle.is_finished());

        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        self.tasks.insert(key, task.abort_handle());
        true
    }

    /// Cancel pending work for a key; no-op if nothing is pending
    pub fn cancel(&mut self, key: &str) {
        if let Some(handle) = self.tasks.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Whether work for `key` is scheduled and has not finished
    pub fn is_pending(&self, key: &str) -> bool {
        self.tasks
            .get(key)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_schedule_without_runtime() {
        let mut timers = Timers::new();
        assert!(!runtime_available());
        assert!(!timers.schedule("k", Duration::from_millis(1), async {}));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending() {
        let mut timers = Timers::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for value in [1, 10, 100] {
            let hits = hits.clone();
            timers.schedule("save", Duration::from_millis(50), async move {
                hits.fetch_add(value, Ordering::SeqCst);
            });
        }
        assert!(timers.is_pending("save"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 100);
        assert!(!timers.is_pending("save"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_keys_are_pruned() {
        let mut timers = Timers::new();
        for key in ["a", "b", "c"] {
            timers.schedule(key, Duration::from_millis(10), async {});
        }
        assert_eq!(timers.len(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        timers.schedule("d", Duration::from_millis(10), async {});
        assert_eq!(timers.len(), 1);
        assert!(timers.is_pending("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let mut timers = Timers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        timers.schedule("k", Duration::from_millis(10), async move {
            h.fetch_add(1, Ordering::SeqCst);
        });

        timers.cancel("k");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(timers.is_empty());
    }
}
