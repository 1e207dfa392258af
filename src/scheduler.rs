//! Periodic snapshot scheduling
//!
//! Ticks are fire-and-forget: a late tick fires once and missed ticks are
//! skipped rather than replayed.

use crate::clock::{Clock, ManualClock};
use crate::error::TelemetryError;
use crate::types::MonotonicMs;
use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::LocalSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Periodic task callback
pub type Task = Box<dyn FnMut()>;

/// Source of periodic ticks
pub trait Scheduler {
    /// Run `task` every `period`, first after one full period
    fn every(&self, period: Duration, task: Task) -> Result<TimerHandle, TelemetryError>;
}

/// Cancels its timer when cancelled or dropped
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire_cancel();
    }

    fn fire_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire_cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

fn validate_period(period: Duration) -> Result<(), TelemetryError> {
    if period.is_zero() {
        return Err(TelemetryError::Scheduler(
            "period must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

thread_local! {
    static SHARED_LOCAL_SET: Rc<LocalSet> = Rc::new(LocalSet::new());
}

/// Ticks driven by a tokio interval on a `LocalSet`.
///
/// The tasks only make progress while the local set is polled, for example
/// through `LocalSet::run_until`.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    local: Option<Rc<LocalSet>>,
}

impl TokioScheduler {
    /// Spawn onto an explicit local set
    pub fn new(local: Rc<LocalSet>) -> Self {
        Self { local: Some(local) }
    }

    /// Spawn onto this thread's shared local set.
    ///
    /// Ticks run while the shared set is driven through
    /// [`TokioScheduler::run_until`]; a host that never drives it keeps
    /// tracking without periodic snapshots.
    pub fn current() -> Self {
        Self { local: None }
    }

    /// The local set that [`TokioScheduler::current`] spawns onto
    pub fn shared_local_set() -> Rc<LocalSet> {
        SHARED_LOCAL_SET.with(Rc::clone)
    }

    /// Drive this thread's shared local set until `future` completes
    pub async fn run_until<F: Future>(future: F) -> F::Output {
        Self::shared_local_set().run_until(future).await
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: Task) -> Result<TimerHandle, TelemetryError> {
        validate_period(period)?;

        let local = match &self.local {
            Some(local) => Rc::clone(local),
            None => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(TelemetryError::Scheduler(
                        "no tokio runtime is running".to_string(),
                    ));
                }
                Self::shared_local_set()
            }
        };

        let start = Instant::now() + period;
        let handle = local.spawn_local(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                task();
            }
        });

        Ok(TimerHandle::new(move || handle.abort()))
    }
}

struct ManualTask {
    id: u64,
    period_ms: u64,
    next_due: MonotonicMs,
    callback: Rc<RefCell<Task>>,
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    tasks: Vec<ManualTask>,
}

/// Host-driven scheduler for replay and deterministic tests.
///
/// Owns a `ManualClock` and moves it to each tick's due time before firing,
/// so snapshots observe the instant they were due. Clones share one queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<ManualQueue>>,
    clock: ManualClock,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            queue: Rc::new(RefCell::new(ManualQueue::default())),
            clock,
        }
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn now_ms(&self) -> MonotonicMs {
        self.clock.now_ms()
    }

    /// Number of live timers
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Fire every tick due up to `target` in time order, then leave the clock at `target`.
    /// Returns the number of ticks fired.
    pub fn advance_to(&self, target: MonotonicMs) -> usize {
        let mut fired = 0;
        while self.fire_next(target) {
            fired += 1;
        }
        self.clock.set(target);
        fired
    }

    pub fn advance(&self, ms: u64) -> usize {
        self.advance_to(self.clock.now_ms().saturating_add(ms))
    }

    /// Fire the earliest task due at or before `target`
    fn fire_next(&self, target: MonotonicMs) -> bool {
        let callback = {
            let mut queue = self.queue.borrow_mut();
            let now = self.clock.now_ms();
            let Some(task) = queue
                .tasks
                .iter_mut()
                .filter(|t| t.next_due <= target)
                .min_by_key(|t| (t.next_due, t.id))
            else {
                return false;
            };

            // A task overdue relative to the clock fires once at `now`
            let fire_at = task.next_due.max(now);
            let missed = (fire_at - task.next_due) / task.period_ms;
            task.next_due += task.period_ms * (missed + 1);
            self.clock.set(fire_at);
            Rc::clone(&task.callback)
        };

        let mut task = callback.borrow_mut();
        (*task)();
        true
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, task: Task) -> Result<TimerHandle, TelemetryError> {
        validate_period(period)?;
        let period_ms = (period.as_millis() as u64).max(1);

        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let id = queue.next_id;
        queue.tasks.push(ManualTask {
            id,
            period_ms,
            next_due: self.clock.now_ms().saturating_add(period_ms),
            callback: Rc::new(RefCell::new(task)),
        });

        let weak: Weak<RefCell<ManualQueue>> = Rc::downgrade(&self.queue);
        Ok(TimerHandle::new(move || {
            if let Some(queue) = weak.upgrade() {
                queue.borrow_mut().tasks.retain(|t| t.id != id);
            }
        }))
    }
}
