//! Middleware chain
//!
//! Every dispatched action walks the middleware list in order. Each
//! middleware receives the action plus a [`Chain`] and decides what happens
//! next:
//!
//! - `chain.next(action)` hands an action to the following middleware (the
//!   last one hands it to the reducers). It may be called zero, one or many
//!   times, with the original action or a rewritten one.
//! - `chain.dispatch(action)` queues a fresh action that restarts from the
//!   first middleware once the current one has finished, ahead of actions
//!   that were already queued. The store drains the queue iteratively, so
//!   derived dispatches never grow the stack.
//! - `chain.dispatcher()` returns a handle for dispatching from async work.
//!
//! `chain.state()` is the snapshot captured when the dispatch started; every
//! middleware in the same pass sees the same snapshot. `chain.current_state()`
//! reads the live state, e.g. after calling `next`.
//!
//! # Example
//!
//! ```ignore
//! struct Uppercase;
//!
//! impl<S> Middleware<S> for Uppercase {
//!     fn handle(&mut self, mut action: StateAction, chain: &mut Chain<'_, S>) {
//!         action.kind = action.kind.to_uppercase();
//!         chain.next(action);
//!     }
//! }
//! ```

mod batch;
mod persist;
mod subscription;
mod thunk;
mod timing;
mod validation;

#[cfg(feature = "api")]
mod api;

use std::sync::Arc;

use crate::action::StateAction;
use crate::dispatcher::Dispatcher;

pub use batch::BatchMiddleware;
pub use persist::{LocalPersistenceMiddleware, LocalPersistenceOptions};
pub use subscription::SubscriptionMiddleware;
pub use thunk::ThunkMiddleware;
pub use timing::{DebounceMiddleware, ThrottleMiddleware, TimingOptions};
pub use validation::{ValidationMiddleware, ValidationRule};

#[cfg(feature = "api")]
pub use api::{ApiConfig, ApiMiddleware, ApiRequest, ResponseType};

/// Intercepts actions on their way to the reducers
///
/// Middleware must treat the state as read-only; only the reducer fold
/// produces new state.
pub trait Middleware<S>: Send {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>);
}

/// Where a chain sends actions once its own middleware list is exhausted
pub(crate) trait Downstream<S> {
    fn forward(&mut self, action: StateAction);
    fn enqueue(&mut self, action: StateAction);
    fn current_state(&self) -> Arc<S>;
    fn dispatcher(&self) -> Dispatcher;
}

/// The remainder of the middleware chain for one dispatch
pub struct Chain<'a, S> {
    rest: &'a mut [Box<dyn Middleware<S>>],
    snapshot: &'a Arc<S>,
    downstream: &'a mut dyn Downstream<S>,
}

impl<'a, S> Chain<'a, S> {
    pub(crate) fn new(
        rest: &'a mut [Box<dyn Middleware<S>>],
        snapshot: &'a Arc<S>,
        downstream: &'a mut dyn Downstream<S>,
    ) -> Self {
        Self {
            rest,
            snapshot,
            downstream,
        }
    }

    /// State captured when this dispatch started
    pub fn state(&self) -> &S {
        self.snapshot
    }

    /// Shared handle to the dispatch-start snapshot
    pub fn snapshot(&self) -> Arc<S> {
        Arc::clone(self.snapshot)
    }

    /// Live state, reflecting any reducers that already ran for this dispatch
    pub fn current_state(&self) -> Arc<S> {
        self.downstream.current_state()
    }

    /// Pass an action to the rest of the chain
    pub fn next(&mut self, action: StateAction) {
        match self.rest.split_first_mut() {
            Some((head, tail)) => {
                let mut chain = Chain {
                    rest: tail,
                    snapshot: self.snapshot,
                    downstream: &mut *self.downstream,
                };
                head.handle(action, &mut chain);
            }
            None => self.downstream.forward(action),
        }
    }

    /// Queue an action that restarts from the first middleware
    pub fn dispatch(&mut self, action: StateAction) {
        self.downstream.enqueue(action);
    }

    /// Handle for dispatching from async continuations
    pub fn dispatcher(&self) -> Dispatcher {
        self.downstream.dispatcher()
    }
}

impl<S> Downstream<S> for Chain<'_, S> {
    fn forward(&mut self, action: StateAction) {
        self.next(action);
    }

    fn enqueue(&mut self, action: StateAction) {
        self.dispatch(action);
    }

    fn current_state(&self) -> Arc<S> {
        Chain::current_state(self)
    }

    fn dispatcher(&self) -> Dispatcher {
        Chain::dispatcher(self)
    }
}

/// Middleware that logs actions (for debugging)
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl<S> Middleware<S> for LoggingMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        if self.log_before {
            tracing::debug!(action = %action.kind, "Dispatching action");
        }
        let kind = self.log_after.then(|| action.kind.clone());
        chain.next(action);
        if let Some(kind) = kind {
            let state_changed = !Arc::ptr_eq(&chain.snapshot(), &chain.current_state());
            tracing::debug!(
                action = %kind,
                state_changed = state_changed,
                "Action processed"
            );
        }
    }
}

/// Several middleware acting as one
///
/// The inner list runs in order; the last inner middleware's `next` continues
/// with whatever follows the composed middleware in the outer chain.
pub struct ComposedMiddleware<S> {
    middlewares: Vec<Box<dyn Middleware<S>>>,
}

impl<S> std::fmt::Debug for ComposedMiddleware<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<S> Default for ComposedMiddleware<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ComposedMiddleware<S> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware<S> + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder-style [`add`](Self::add)
    pub fn with<M: Middleware<S> + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl<S> Middleware<S> for ComposedMiddleware<S> {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        let snapshot = chain.snapshot();
        let mut inner = Chain::new(&mut self.middlewares, &snapshot, chain);
        inner.next(action);
    }
}

/// Compose boxed middleware into one, preserving order
pub fn combine_middleware<S>(middlewares: Vec<Box<dyn Middleware<S>>>) -> ComposedMiddleware<S> {
    ComposedMiddleware { middlewares }
}
