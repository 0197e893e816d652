//! Test utilities for Morpheo applications
//!
//! - [`RenderHarness`]: render into an in-memory terminal and read it back
//! - [`ActionLog`]: record every action that reaches the reducers
//! - Assertion macros over recorded actions
//!
//! # Example
//!
//! ```ignore
//! use morpheo_core::testing::{ActionLog, RenderHarness};
//! use morpheo_core::assert_dispatched;
//!
//! let log = ActionLog::new();
//! let mut store = Store::new(state).with_middleware(log.recorder());
//! store.dispatch(StateAction::new("SAVE"));
//! assert_dispatched!(log.drain(), "SAVE");
//!
//! let mut harness = RenderHarness::new(40, 10);
//! let output = harness.render_to_string_plain(|frame| {
//!     runtime.render(&root, frame, frame.area(), None);
//! });
//! assert!(output.contains("Submit"));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ratatui::{backend::TestBackend, buffer::Buffer, Frame, Terminal};

use crate::action::StateAction;
use crate::middleware::{Chain, Middleware};

/// Renders frames into a [`TestBackend`] of fixed size
pub struct RenderHarness {
    terminal: Terminal<TestBackend>,
}

impl RenderHarness {
    /// # Panics
    ///
    /// Panics if the test backend cannot be created.
    pub fn new(width: u16, height: u16) -> Self {
        let terminal = Terminal::new(TestBackend::new(width, height))
            .unwrap_or_else(|e| panic!("test backend: {e}"));
        Self { terminal }
    }

    /// Draw one frame and return the resulting buffer
    pub fn render<F>(&mut self, draw: F) -> &Buffer
    where
        F: FnOnce(&mut Frame),
    {
        self.terminal
            .draw(draw)
            .unwrap_or_else(|e| panic!("test draw: {e}"));
        self.terminal.backend().buffer()
    }

    /// Draw one frame and return its text, one line per row, without styles
    pub fn render_to_string_plain<F>(&mut self, draw: F) -> String
    where
        F: FnOnce(&mut Frame),
    {
        buffer_to_string_plain(self.render(draw))
    }
}

/// Buffer contents as text with trailing spaces trimmed per row
pub fn buffer_to_string_plain(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut lines = Vec::with_capacity(area.height as usize);
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        for x in area.left()..area.right() {
            line.push_str(buffer[(x, y)].symbol());
        }
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

/// Shared record of actions seen by a [`Recorder`]
#[derive(Clone, Default)]
pub struct ActionLog {
    actions: Arc<Mutex<Vec<StateAction>>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware that appends every action to this log and passes it on
    ///
    /// Place it last to see exactly what reaches the reducers.
    pub fn recorder(&self) -> Recorder {
        Recorder { log: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StateAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take everything recorded so far
    pub fn drain(&self) -> Vec<StateAction> {
        std::mem::take(&mut *self.lock())
    }

    /// Types of the recorded actions, in order
    pub fn kinds(&self) -> Vec<String> {
        self.lock().iter().map(|a| a.kind.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// See [`ActionLog::recorder`]
pub struct Recorder {
    log: ActionLog,
}

impl<S> Middleware<S> for Recorder {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        self.log.lock().push(action.clone());
        chain.next(action);
    }
}

/// Assert that an action of the given type was dispatched.
///
/// ```ignore
/// let actions = log.drain();
/// assert_dispatched!(actions, "FETCH_USER_SUCCESS");
/// ```
#[macro_export]
macro_rules! assert_dispatched {
    ($actions:expr, $kind:expr) => {
        assert!(
            $actions.iter().any(|a| a.kind == $kind),
            "Expected action `{}` to be dispatched, but got: {:?}",
            $kind,
            $actions.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>()
        );
    };
}

/// Assert that NO action of the given type was dispatched.
#[macro_export]
macro_rules! assert_not_dispatched {
    ($actions:expr, $kind:expr) => {
        assert!(
            !$actions.iter().any(|a| a.kind == $kind),
            "Expected action `{}` NOT to be dispatched, but it was: {:?}",
            $kind,
            $actions.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>()
        );
    };
}

/// First dispatched action of the given type.
#[macro_export]
macro_rules! find_dispatched {
    ($actions:expr, $kind:expr) => {
        $actions.iter().find(|a| a.kind == $kind)
    };
}

/// Count dispatched actions of the given type.
///
/// ```ignore
/// assert_eq!(count_dispatched!(log.drain(), "SEARCH"), 1);
/// ```
#[macro_export]
macro_rules! count_dispatched {
    ($actions:expr, $kind:expr) => {
        $actions.iter().filter(|a| a.kind == $kind).count()
    };
}
