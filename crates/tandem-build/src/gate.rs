//! Single-flight execution gate
//!
//! Every consumer of a unit's outputs funnels through one gate before
//! reading anything. The first caller in executes the guarded body; every
//! caller that arrives while it is running blocks until the body finishes
//! and then shares its result verbatim, success or failure. Later callers
//! observe the published result directly. One gate covers one build
//! invocation, so the body runs at most once per invocation.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::UnitResult;
use crate::unit::RunOutcome;

#[derive(Debug)]
enum GateState {
    /// No caller has entered yet
    Idle,
    /// A leader is executing the body
    Running,
    /// The body finished; result shared with every caller
    Complete(UnitResult<RunOutcome>),
}

/// Single-flight latch over one guarded body.
#[derive(Debug)]
pub struct RunGate {
    state: Mutex<GateState>,
    finished: Condvar,
}

impl RunGate {
    /// Create a gate with no recorded result
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
            finished: Condvar::new(),
        }
    }

    /// Execute `body` at most once, coalescing concurrent callers.
    ///
    /// The first caller becomes the leader and runs `body` outside the
    /// lock. Concurrent callers block until the leader publishes its
    /// result; all of them return that same result. The body must not
    /// re-enter the gate.
    pub fn coalesce<F>(&self, body: F) -> UnitResult<RunOutcome>
    where
        F: FnOnce() -> UnitResult<RunOutcome>,
    {
        let mut state = self.lock();
        loop {
            match &*state {
                GateState::Complete(result) => return result.clone(),
                GateState::Running => {
                    state = self
                        .finished
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
                GateState::Idle => break,
            }
        }
        *state = GateState::Running;
        drop(state);

        // If the body unwinds, reset to Idle and wake the waiters so one of
        // them can take over instead of blocking forever.
        let mut reset = ResetOnUnwind {
            gate: self,
            armed: true,
        };
        let result = body();
        reset.armed = false;

        let mut state = self.lock();
        *state = GateState::Complete(result.clone());
        self.finished.notify_all();
        result
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // A poisoned lock means a caller panicked during a state
        // transition; the state value itself is still a valid variant.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

struct ResetOnUnwind<'a> {
    gate: &'a RunGate,
    armed: bool,
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.gate.lock();
            *state = GateState::Idle;
            self.gate.finished.notify_all();
        }
    }
}
