//! Scheduler on browser `setTimeout`
//!
//! Fired timers are handed to a dispatch callback set by the player facade,
//! which routes them into `PlayerSession::handle_timer`.

use gloo_timers::callback::Timeout;
use lumen_core::{FiredTimer, Scheduler, TimerId, TimerKind};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

type Dispatch = Box<dyn Fn(FiredTimer)>;

#[derive(Default)]
struct Inner {
    next_id: Cell<u64>,
    pending: RefCell<HashMap<TimerId, Timeout>>,
    /// Last timeout that ran, kept until the next one fires
    spent: RefCell<Vec<Timeout>>,
    dispatch: RefCell<Option<Dispatch>>,
}

/// Browser timer service; clones share the same timers
#[derive(Clone)]
pub struct BrowserScheduler {
    inner: Rc<Inner>,
    started_ms: f64,
}

impl BrowserScheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner::default()),
            started_ms: js_sys::Date::now(),
        }
    }

    /// Where fired timers go
    pub fn set_dispatch(&self, dispatch: impl Fn(FiredTimer) + 'static) {
        *self.inner.dispatch.borrow_mut() = Some(Box::new(dispatch));
    }

    /// Drop every pending timer and the dispatch target
    pub fn shutdown(&self) {
        self.inner.pending.borrow_mut().clear();
        self.inner.spent.borrow_mut().clear();
        self.inner.dispatch.borrow_mut().take();
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

impl Default for BrowserScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for BrowserScheduler {
    fn now(&self) -> Duration {
        Duration::from_secs_f64(((js_sys::Date::now() - self.started_ms) / 1000.0).max(0.0))
    }

    fn after(&self, delay: Duration, kind: TimerKind) -> TimerId {
        let id = TimerId(self.inner.next_id.get() + 1);
        self.inner.next_id.set(id.0);

        let weak = Rc::downgrade(&self.inner);
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let timeout = Timeout::new(millis, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(spent) = inner.pending.borrow_mut().remove(&id) else {
                return;
            };
            // Earlier timeouts are finished by now; this one is still running
            let finished = std::mem::replace(&mut *inner.spent.borrow_mut(), vec![spent]);
            drop(finished);
            if let Some(dispatch) = inner.dispatch.borrow().as_ref() {
                dispatch(FiredTimer { id, kind });
            }
        });

        self.inner.pending.borrow_mut().insert(id, timeout);
        id
    }

    fn cancel(&self, id: TimerId) {
        // Dropping a gloo Timeout clears it
        self.inner.pending.borrow_mut().remove(&id);
    }
}
