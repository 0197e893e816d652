//! Validation middleware

use serde_json::json;
use tracing::debug;

use super::{Chain, Middleware};
use crate::action::{StateAction, VALIDATION_ERROR};

type RuleTest<S> = Box<dyn Fn(&StateAction, &S) -> bool + Send + Sync>;

/// A single rule; `test` returns `true` when the action is valid
pub struct ValidationRule<S> {
    test: RuleTest<S>,
    error: String,
    actions: Option<Vec<String>>,
}

impl<S> ValidationRule<S> {
    pub fn new<F>(error: impl Into<String>, test: F) -> Self
    where
        F: Fn(&StateAction, &S) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Box::new(test),
            error: error.into(),
            actions: None,
        }
    }

    /// Restrict the rule to these action types
    pub fn for_actions<I, K>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    fn applies_to(&self, kind: &str) -> bool {
        self.actions
            .as_ref()
            .map(|allowed| allowed.iter().any(|a| a == kind))
            .unwrap_or(true)
    }
}

impl<S> std::fmt::Debug for ValidationRule<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("error", &self.error)
            .field("actions", &self.actions)
            .finish()
    }
}

/// Runs rules in order; the first failure replaces the action with `VALIDATION_ERROR`
///
/// The error payload is `{"action": <wire action>, "message": <rule error>}`.
/// `VALIDATION_ERROR` actions themselves are never validated.
pub struct ValidationMiddleware<S> {
    rules: Vec<ValidationRule<S>>,
}

impl<S> Default for ValidationMiddleware<S> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<S> ValidationMiddleware<S> {
    pub fn new(rules: Vec<ValidationRule<S>>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: ValidationRule<S>) -> Self {
        self.rules.push(rule);
        self
    }
}

impl<S> Middleware<S> for ValidationMiddleware<S> {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        if action.kind == VALIDATION_ERROR {
            chain.next(action);
            return;
        }

        let failed = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(&action.kind))
            .find(|rule| !(rule.test)(&action, chain.state()));

        match failed {
            Some(rule) => {
                debug!(action = %action.kind, error = %rule.error, "Action failed validation");
                chain.dispatch(StateAction::new(VALIDATION_ERROR).with_payload(json!({
                    "action": action.to_value(),
                    "message": rule.error,
                })));
            }
            None => chain.next(action),
        }
    }
}
