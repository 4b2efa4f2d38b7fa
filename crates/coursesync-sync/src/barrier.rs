//! Dynamic-party join barrier
//!
//! A [`JoinBarrier`] tracks an initially unknown, growing number of
//! outstanding units of work. Units register their children *before*
//! arriving themselves, so the pending count can only reach zero once the
//! whole fan-out tree has finished.
//!
//! ```text
//!   register(1) ──► pending += 1
//!   arrive()    ──► pending -= 1 ──► 0? ──► release waiters
//!   force_terminate() ──────────────────► release waiters, poison
//! ```
//!
//! The pending count and the terminated flag live in one `watch` channel
//! value, so a registration and a release can never interleave.

use tokio::sync::watch;

/// Snapshot of the barrier's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BarrierState {
    pending: usize,
    terminated: bool,
}

impl BarrierState {
    fn is_released(&self) -> bool {
        self.terminated || self.pending == 0
    }
}

/// How the barrier was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// Every registered unit arrived
    Completed,
    /// [`JoinBarrier::force_terminate`] was called
    Terminated,
}

/// Join barrier with a dynamically growing party count
#[derive(Debug)]
pub struct JoinBarrier {
    state: watch::Sender<BarrierState>,
}

impl JoinBarrier {
    /// Creates a barrier with `parties` initially registered units
    pub fn new(parties: usize) -> Self {
        let (state, _) = watch::channel(BarrierState {
            pending: parties,
            terminated: false,
        });
        Self { state }
    }

    /// Adds `n` outstanding units.
    ///
    /// Returns `false` (and registers nothing) once the barrier has been
    /// released or terminated; the caller must not start the units then.
    pub fn register(&self, n: usize) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|s| {
            if s.is_released() {
                return false;
            }
            s.pending += n;
            accepted = true;
            false
        });
        accepted
    }

    /// Marks one unit as done. No-op after release or termination.
    pub fn arrive(&self) {
        self.state.send_if_modified(|s| {
            if s.is_released() {
                return false;
            }
            s.pending -= 1;
            s.pending == 0
        });
    }

    /// Arrives for the caller, then waits until every unit arrived or the
    /// barrier was terminated.
    pub async fn arrive_and_wait(&self) -> BarrierOutcome {
        let mut rx = self.state.subscribe();
        self.arrive();

        // The sender lives in `self`, so the channel cannot close while we wait.
        let released = match rx.wait_for(BarrierState::is_released).await {
            Ok(state) => *state,
            Err(_) => BarrierState {
                pending: 0,
                terminated: true,
            },
        };

        if released.terminated {
            BarrierOutcome::Terminated
        } else {
            BarrierOutcome::Completed
        }
    }

    /// Releases all waiters immediately and poisons the barrier
    pub fn force_terminate(&self) {
        self.state.send_if_modified(|s| {
            if s.terminated {
                return false;
            }
            s.terminated = true;
            true
        });
    }

    pub fn is_terminated(&self) -> bool {
        self.state.borrow().terminated
    }

    /// Units registered but not yet arrived
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }
}
