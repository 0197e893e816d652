//! Batch middleware: one dispatch, many actions

use serde_json::Value;
use tracing::warn;

use super::{Chain, Middleware};
use crate::action::{Payload, StateAction, BATCH_ACTIONS};

/// Unpacks `BATCH_ACTIONS` into its actions, in order
///
/// The payload is either `Payload::Batch` or a JSON array of wire actions;
/// array entries that are not actions are skipped. Each unpacked action is
/// dispatched from the first middleware and fully processed, including
/// anything it queues, before the next one starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchMiddleware;

impl<S> Middleware<S> for BatchMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        if action.kind != BATCH_ACTIONS {
            chain.next(action);
            return;
        }

        match action.payload {
            Payload::Batch(actions) => {
                for action in actions {
                    chain.dispatch(action);
                }
            }
            Payload::Value(Value::Array(items)) => {
                for item in &items {
                    match StateAction::from_value(item) {
                        Some(action) => chain.dispatch(action),
                        None => warn!(entry = %item, "Skipping malformed batch entry"),
                    }
                }
            }
            payload => chain.next(StateAction { payload, ..action }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde_json::json;

    fn reducer(state: &Vec<String>, action: &StateAction) -> Option<Vec<String>> {
        let mut next = state.clone();
        next.push(action.kind.clone());
        Some(next)
    }

    #[test]
    fn test_batch_reaches_reducers_in_order() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(BatchMiddleware);

        store.dispatch(StateAction::batch(vec![
            StateAction::new("A"),
            StateAction::new("B"),
        ]));
        assert_eq!(*store.state(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_json_array_batch() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(BatchMiddleware);

        store.dispatch(
            StateAction::new(BATCH_ACTIONS)
                .with_payload(json!([{"type": "A"}, 42, {"type": "C", "payload": 1}])),
        );
        assert_eq!(*store.state(), vec!["A".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_non_array_batch_passes_through() {
        let mut store = Store::new(Vec::new())
            .with_reducer("log", reducer)
            .with_middleware(BatchMiddleware);

        store.dispatch(StateAction::new(BATCH_ACTIONS).with_payload(json!("oops")));
        assert_eq!(*store.state(), vec![BATCH_ACTIONS.to_string()]);
    }
}
