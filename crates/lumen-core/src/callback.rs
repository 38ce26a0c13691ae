//! Multi-completion gate
//!
//! A [`MultiCallback`] runs its terminal action once it has been signalled a
//! fixed number of times. Per-participant completions usually hold a
//! [`GateGuard`] instead of the gate itself: the guard signals when it is used
//! and also when it is dropped unused, so a completion that gets discarded on
//! the way back still counts and the terminal action is never stranded.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct GateState {
    remaining: usize,
    on_complete: Option<Box<dyn FnOnce()>>,
}

/// Runs a terminal action after `limit` signals
///
/// Clones share the same count. With a limit of 0 the action runs during
/// construction.
#[derive(Clone)]
pub struct MultiCallback {
    state: Rc<RefCell<GateState>>,
}

impl MultiCallback {
    /// Create a gate that fires `on_complete` after `limit` calls to [`run`](Self::run)
    pub fn new(limit: usize, on_complete: impl FnOnce() + 'static) -> Self {
        let gate = Self {
            state: Rc::new(RefCell::new(GateState {
                remaining: limit,
                on_complete: Some(Box::new(on_complete)),
            })),
        };
        if limit == 0 {
            gate.fire();
        }
        gate
    }

    /// Signal one completion. Signals past the limit are ignored.
    pub fn run(&self) {
        let fire = {
            let mut state = self.state.borrow_mut();
            if state.remaining == 0 {
                false
            } else {
                state.remaining -= 1;
                state.remaining == 0
            }
        };
        if fire {
            self.fire();
        }
    }

    /// A guard that signals this gate exactly once
    pub fn guard(&self) -> GateGuard {
        GateGuard {
            gate: Some(self.clone()),
        }
    }

    /// Signals still outstanding
    pub fn remaining(&self) -> usize {
        self.state.borrow().remaining
    }

    /// True once the terminal action has run
    pub fn is_complete(&self) -> bool {
        self.state.borrow().on_complete.is_none()
    }

    fn fire(&self) {
        let action = self.state.borrow_mut().on_complete.take();
        if let Some(action) = action {
            action();
        }
    }
}

impl fmt::Debug for MultiCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiCallback")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// One participant's share of a [`MultiCallback`]
///
/// Signals the gate on [`signal`](Self::signal), or on drop if never used.
#[derive(Debug)]
pub struct GateGuard {
    gate: Option<MultiCallback>,
}

impl GateGuard {
    /// Signal the gate now
    pub fn signal(mut self) {
        if let Some(gate) = self.gate.take() {
            gate.run();
        }
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.run();
        }
    }
}
