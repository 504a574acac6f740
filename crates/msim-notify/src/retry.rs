//! Bounded retry with delay
//!
//! Used when a notification depends on data that is not ready yet, such as
//! the voicemail number while the SIM records are still loading. A task is a
//! dependency check plus an action. The check runs at schedule time and
//! again on every timer firing; the action runs exactly once, either when the
//! check passes or, degraded, when the attempts run out.
//!
//! Scheduling a task for a key that already has one pending cancels the
//! older task first. Timer firings carry a generation number so a firing of
//! a cancelled timer that was already in the queue is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{TimerHandle, TimerService};
use crate::events::NotifierEvent;
use crate::types::SubscriptionId;

/// What is being retried
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum RetryKind {
    VoicemailNumber,
}

/// Logical task identity; one pending retry per key
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RetryKey {
    pub kind: RetryKind,
    pub subscription: SubscriptionId,
}

impl RetryKey {
    pub fn new(kind: RetryKind, subscription: SubscriptionId) -> Self {
        Self { kind, subscription }
    }
}

impl fmt::Display for RetryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.kind, self.subscription)
    }
}

/// Passed to the action when it finally runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// The dependency never became ready
    pub degraded: bool,
    /// Timer-driven re-checks that happened before the action ran
    pub retries_used: u32,
}

type DependencyCheck = Box<dyn Fn() -> bool + Send>;
type RetryAction<T> = Box<dyn FnOnce(Attempt) -> T + Send>;

/// A dependency check, the action it guards, and the retry budget
pub struct RetryTask<T> {
    check: DependencyCheck,
    action: RetryAction<T>,
    remaining_attempts: u32,
    retries_used: u32,
    delay: Duration,
}

impl<T> RetryTask<T> {
    pub fn new(
        check: impl Fn() -> bool + Send + 'static,
        action: impl FnOnce(Attempt) -> T + Send + 'static,
        max_attempts: u32,
        delay: Duration,
    ) -> Self {
        Self {
            check: Box::new(check),
            action: Box::new(action),
            remaining_attempts: max_attempts,
            retries_used: 0,
            delay,
        }
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.remaining_attempts
    }

    fn finish(self, degraded: bool) -> T {
        (self.action)(Attempt {
            degraded,
            retries_used: self.retries_used,
        })
    }
}

impl<T> fmt::Debug for RetryTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTask")
            .field("remaining_attempts", &self.remaining_attempts)
            .field("retries_used", &self.retries_used)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Result of scheduling a task or delivering a timer firing
#[derive(Debug, PartialEq, Eq)]
pub enum RetryPoll<T> {
    /// The action ran and produced this value
    Completed(T),
    /// A timer is armed for another check
    Pending { remaining_attempts: u32 },
    /// The firing belonged to a cancelled or finished task
    Stale,
}

struct PendingRetry<T> {
    task: RetryTask<T>,
    generation: u64,
    timer: TimerHandle,
}

/// Owns pending retry tasks and their timers
pub struct RetryScheduler<T> {
    pending: HashMap<RetryKey, PendingRetry<T>>,
    timer: Arc<dyn TimerService>,
    next_generation: u64,
}

impl<T> RetryScheduler<T> {
    pub fn new(timer: Arc<dyn TimerService>) -> Self {
        Self {
            pending: HashMap::new(),
            timer,
            next_generation: 0,
        }
    }

    /// Run `task` now or arm a timer for it, superseding any pending task
    /// for the same key.
    pub fn schedule(&mut self, key: RetryKey, task: RetryTask<T>) -> RetryPoll<T> {
        if self.cancel(key) {
            debug!("Superseded pending retry for {}", key);
        }
        self.evaluate(key, task)
    }

    /// Deliver a timer firing
    pub fn on_timer_fired(&mut self, key: RetryKey, generation: u64) -> RetryPoll<T> {
        let pending = match self.pending.remove(&key) {
            Some(pending) => pending,
            None => {
                debug!("Dropping stale retry firing for {} (gen {}): nothing pending", key, generation);
                return RetryPoll::Stale;
            }
        };

        if pending.generation != generation {
            debug!(
                "Dropping stale retry firing for {} (gen {}, current gen {})",
                key, generation, pending.generation
            );
            self.pending.insert(key, pending);
            return RetryPoll::Stale;
        }

        self.evaluate(key, pending.task)
    }

    /// Drop the pending task for `key`, if any. Returns whether one existed.
    pub fn cancel(&mut self, key: RetryKey) -> bool {
        match self.pending.remove(&key) {
            Some(pending) => {
                pending.timer.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: RetryKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn evaluate(&mut self, key: RetryKey, mut task: RetryTask<T>) -> RetryPoll<T> {
        if (task.check)() {
            if task.retries_used > 0 {
                info!("Dependency for {} ready after {} retries", key, task.retries_used);
            }
            return RetryPoll::Completed(task.finish(false));
        }

        if task.remaining_attempts == 0 {
            warn!(
                "Dependency for {} still not ready after {} retries; proceeding degraded",
                key, task.retries_used
            );
            return RetryPoll::Completed(task.finish(true));
        }

        task.remaining_attempts -= 1;
        task.retries_used += 1;

        let generation = self.next_generation;
        self.next_generation += 1;

        debug!(
            "Dependency for {} not ready, retrying in {:?} ({} attempts left)",
            key, task.delay, task.remaining_attempts
        );
        let timer = self
            .timer
            .after(task.delay, NotifierEvent::RetryTimerFired { key, generation });

        let remaining_attempts = task.remaining_attempts;
        self.pending.insert(key, PendingRetry { task, generation, timer });
        RetryPoll::Pending { remaining_attempts }
    }
}
