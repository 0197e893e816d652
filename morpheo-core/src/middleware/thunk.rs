//! Thunk middleware: actions whose payload is a function

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Chain, Middleware};
use crate::action::{Payload, StateAction, ThunkContext};

/// Runs `Payload::Thunk` actions instead of forwarding them
///
/// The thunk receives a JSON snapshot of the state and a dispatcher. Every
/// action dispatched through that dispatcher carries `meta.thunk = true` and
/// restarts from the first middleware. Actions dispatched before the thunk
/// returns are processed right after it, ahead of anything already queued
/// (e.g. the rest of a batch); later ones arrive through the store channel.
/// Other actions pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThunkMiddleware;

impl<S: Serialize> Middleware<S> for ThunkMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        let Payload::Thunk(thunk) = &action.payload else {
            chain.next(action);
            return;
        };

        let state = serde_json::to_value(chain.state()).unwrap_or_else(|e| {
            warn!(action = %action.kind, error = %e, "State is not serializable, thunk sees null");
            Value::Null
        });
        debug!(action = %action.kind, "Running thunk");
        let (dispatch, held) = chain.dispatcher().marked("thunk").holding();
        thunk.call(ThunkContext { state, dispatch });
        for action in held.release() {
            chain.dispatch(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde_json::json;
    use std::time::Duration;

    fn reducer(state: &Vec<String>, action: &StateAction) -> Option<Vec<String>> {
        let mut next = state.clone();
        let marker = if action.has_flag("thunk") { "(thunk)" } else { "" };
        next.push(format!("{}{}", action.kind, marker));
        Some(next)
    }

    #[test]
    fn test_non_function_payload_passes_through() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(ThunkMiddleware);

        store.dispatch(StateAction::new("PLAIN").with_payload(json!(1)));
        assert_eq!(*store.state(), vec!["PLAIN".to_string()]);
    }

    #[test]
    fn test_thunk_dispatches_marked_actions_synchronously() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(ThunkMiddleware);

        store.dispatch(StateAction::thunk("LOAD", |ctx| {
            assert_eq!(ctx.state, json!([]));
            ctx.dispatch.dispatch(StateAction::new("FIRST"));
            ctx.dispatch.dispatch(StateAction::new("SECOND"));
        }));

        // the thunk itself never reaches the reducers
        assert_eq!(
            *store.state(),
            vec!["FIRST(thunk)".to_string(), "SECOND(thunk)".to_string()]
        );
    }

    #[test]
    fn test_thunk_may_dispatch_nothing() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(ThunkMiddleware);

        assert!(!store.dispatch(StateAction::thunk("NOTHING", |_| {})));
        assert!(store.state().is_empty());
    }

    #[test]
    fn test_thunk_dispatches_run_before_the_rest_of_a_batch() {
        use crate::middleware::BatchMiddleware;

        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(BatchMiddleware)
            .with_middleware(ThunkMiddleware);

        store.dispatch(StateAction::batch(vec![
            StateAction::thunk("LOAD", |ctx| {
                ctx.dispatch.dispatch(StateAction::new("FROM_THUNK"));
            }),
            StateAction::new("AFTER"),
        ]));
        assert_eq!(
            *store.state(),
            vec!["FROM_THUNK(thunk)".to_string(), "AFTER".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thunk_dispatches_asynchronously() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(ThunkMiddleware);

        store.dispatch(StateAction::thunk("FETCH", |ctx| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ctx.dispatch.dispatch(StateAction::new("FETCHED"));
            });
        }));
        assert!(store.state().is_empty());

        assert!(store.next_async().await);
        assert_eq!(*store.state(), vec!["FETCHED(thunk)".to_string()]);
    }
}
