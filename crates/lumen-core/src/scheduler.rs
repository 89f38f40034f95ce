//! Injected timers
//!
//! Components never call platform timer primitives. They ask a
//! [`Scheduler`] for a timer and get a [`TimerId`] back; when the timer
//! elapses the host hands the [`FiredTimer`] to
//! [`PlayerSession::handle_timer`](crate::PlayerSession::handle_timer).
//! Each component remembers the id it is waiting on and ignores any
//! other, so a timer that fires after being superseded is inert.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Handle for a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What a timer is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Hide the control chrome after inactivity
    ControlsIdle,
    /// Hide the channel banner
    ChannelOsd,
    /// Offer the "next episode" button
    NextEpisode,
    /// Advance a simulated download
    DownloadTick(String),
}

/// A timer that has elapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub kind: TimerKind,
}

/// Timer service
pub trait Scheduler {
    /// Time since the scheduler started
    fn now(&self) -> Duration;

    /// Arm a one-shot timer
    fn after(&self, delay: Duration, kind: TimerKind) -> TimerId;

    /// Cancel a pending timer; unknown ids are ignored
    fn cancel(&self, id: TimerId);
}

// =============================================================================
// Manual (virtual time) scheduler
// =============================================================================

#[derive(Debug)]
struct PendingTimer {
    deadline: Duration,
    id: TimerId,
    kind: TimerKind,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

impl ManualState {
    /// Remove and return the earliest timer due at or before `limit`
    fn pop_due(&mut self, limit: Duration) -> Option<PendingTimer> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= limit)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(index))
    }
}

/// Scheduler driven by explicit calls to [`advance`](Self::advance)
///
/// Cloning shares the same clock, so a test can keep one handle while the
/// player owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and return every timer that came due, in order
    pub fn advance(&self, by: Duration) -> Vec<FiredTimer> {
        let mut fired = Vec::new();
        self.advance_with(by, |timer| fired.push(timer));
        fired
    }

    /// Move the clock forward, dispatching each due timer as it fires
    ///
    /// Timers armed by `dispatch` are honoured if they fall inside the
    /// window, which is what repeating timers need.
    pub fn advance_with(&self, by: Duration, mut dispatch: impl FnMut(FiredTimer)) {
        let target = self.inner.borrow().now + by;
        loop {
            let due = {
                let mut state = self.inner.borrow_mut();
                let due = state.pop_due(target);
                if let Some(timer) = &due {
                    state.now = timer.deadline;
                }
                due
            };
            match due {
                Some(timer) => dispatch(FiredTimer {
                    id: timer.id,
                    kind: timer.kind,
                }),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }

    /// Kinds of all pending timers
    pub fn pending(&self) -> Vec<TimerKind> {
        self.inner
            .borrow()
            .pending
            .iter()
            .map(|t| t.kind.clone())
            .collect()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.borrow().pending.iter().any(|t| t.id == id)
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn after(&self, delay: Duration, kind: TimerKind) -> TimerId {
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let deadline = state.now + delay;
        state.pending.push(PendingTimer { deadline, id, kind });
        id
    }

    fn cancel(&self, id: TimerId) {
        self.inner.borrow_mut().pending.retain(|t| t.id != id);
    }
}

// =============================================================================
// Tokio scheduler
// =============================================================================

#[cfg(feature = "runtime")]
pub use self::runtime::TokioScheduler;

#[cfg(feature = "runtime")]
mod runtime {
    use super::{FiredTimer, Scheduler, TimerId, TimerKind};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;
    use tokio::task::AbortHandle;
    use tracing::debug;

    type TaskMap = Arc<Mutex<HashMap<TimerId, AbortHandle>>>;

    /// Scheduler backed by tokio tasks
    ///
    /// Fired timers arrive on the receiver returned by [`TokioScheduler::new`].
    /// Must be used from inside a tokio runtime.
    pub struct TokioScheduler {
        started: Instant,
        next_id: AtomicU64,
        tasks: TaskMap,
        tx: mpsc::UnboundedSender<FiredTimer>,
    }

    impl TokioScheduler {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredTimer>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let scheduler = Self {
                started: Instant::now(),
                next_id: AtomicU64::new(1),
                tasks: Arc::new(Mutex::new(HashMap::new())),
                tx,
            };
            (scheduler, rx)
        }

        /// Number of timers still waiting to fire
        pub fn pending_count(&self) -> usize {
            self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    impl Scheduler for TokioScheduler {
        fn now(&self) -> Duration {
            self.started.elapsed()
        }

        fn after(&self, delay: Duration, kind: TimerKind) -> TimerId {
            let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let tx = self.tx.clone();
            let tasks = Arc::clone(&self.tasks);

            // Hold the map while spawning so the task cannot deregister
            // before it has been registered.
            let mut map = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                tasks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                let _ = tx.send(FiredTimer { id, kind });
            });
            map.insert(id, handle.abort_handle());
            debug!(timer = %id, delay_ms = delay.as_millis() as u64, "Timer armed");
            id
        }

        fn cancel(&self, id: TimerId) {
            let handle = self
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            if let Some(handle) = handle {
                handle.abort();
                debug!(timer = %id, "Timer cancelled");
            }
        }
    }

    impl Drop for TokioScheduler {
        fn drop(&mut self) {
            let mut map = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            for (_, handle) in map.drain() {
                handle.abort();
            }
        }
    }
}
