//! Handle for dispatching actions from outside the current dispatch
//!
//! Async work (api calls, debounce timers, thunks that await I/O) cannot hold
//! the store, so it reports back through this channel. The store drains the
//! channel on every [`Store::dispatch`](crate::Store::dispatch) and on
//! [`Store::process_pending`](crate::Store::process_pending).

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::action::StateAction;

/// Actions held back while a synchronous call is in progress
///
/// `None` once closed; later dispatches go to the channel.
type Hold = Arc<Mutex<Option<Vec<StateAction>>>>;

/// Cloneable sender feeding the store's action queue
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<StateAction>,
    mark: Option<&'static str>,
    hold: Option<Hold>,
}

impl Dispatcher {
    pub(crate) fn new(tx: mpsc::UnboundedSender<StateAction>) -> Self {
        Self {
            tx,
            mark: None,
            hold: None,
        }
    }

    /// Queue an action; returns `false` if the store has been dropped
    pub fn dispatch(&self, mut action: StateAction) -> bool {
        if let Some(mark) = self.mark {
            action.meta.insert(mark.to_string(), Value::Bool(true));
        }
        if let Some(hold) = &self.hold {
            let mut held = hold.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(held) = held.as_mut() {
                held.push(action);
                return true;
            }
        }
        self.tx.send(action).is_ok()
    }

    /// A dispatcher that sets `meta[key] = true` on everything it sends
    pub fn marked(&self, key: &'static str) -> Self {
        Self {
            mark: Some(key),
            ..self.clone()
        }
    }

    /// A dispatcher that holds its actions until [`Held::release`]
    ///
    /// Used to hand a synchronous callback a dispatcher whose immediate
    /// dispatches the caller queues itself, in order. Clones that outlive the
    /// release send to the store channel as usual.
    pub(crate) fn holding(&self) -> (Self, Held) {
        let hold: Hold = Arc::new(Mutex::new(Some(Vec::new())));
        let dispatcher = Self {
            hold: Some(Arc::clone(&hold)),
            ..self.clone()
        };
        (dispatcher, Held(hold))
    }
}

/// Release side of [`Dispatcher::holding`]
#[derive(Debug)]
pub(crate) struct Held(Hold);

impl Held {
    /// Stop holding and return what was dispatched so far
    pub(crate) fn release(self) -> Vec<StateAction> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_dispatcher_sets_meta() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(tx).marked("thunk");

        assert!(dispatcher.dispatch(StateAction::new("LOADED")));
        let action = rx.try_recv().unwrap();
        assert!(action.has_flag("thunk"));
    }

    #[test]
    fn test_holding_dispatcher_releases_then_sends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (dispatcher, held) = Dispatcher::new(tx).marked("thunk").holding();

        dispatcher.dispatch(StateAction::new("FIRST"));
        dispatcher.dispatch(StateAction::new("SECOND"));
        assert!(rx.try_recv().is_err());

        let released = held.release();
        let kinds: Vec<_> = released.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, ["FIRST", "SECOND"]);
        assert!(released[0].has_flag("thunk"));

        dispatcher.dispatch(StateAction::new("LATER"));
        assert_eq!(rx.try_recv().unwrap().kind, "LATER");
    }

    #[test]
    fn test_dispatch_after_drop_reports_failure() {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(tx);
        drop(rx);
        assert!(!dispatcher.dispatch(StateAction::new("LOST")));
    }
}
