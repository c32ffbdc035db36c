use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cancellable countdown with a deadline (spec §4.1).
///
/// `count == 0` iff the operation is *completed* — either every worker reported in, or the
/// coordinator cancelled the rest. Workers never get forcibly interrupted (spec §5): they poll
/// [`FailoverSync::is_completed`] at every safe point instead.
pub struct FailoverSync {
    count: Mutex<i64>,
    cv: Condvar,
}

impl FailoverSync {
    pub fn new(initial_tasks: usize) -> Self {
        FailoverSync {
            count: Mutex::new(initial_tasks as i64),
            cv: Condvar::new(),
        }
    }

    /// Registers one more task the coordinator should wait for.
    pub fn increment_task(&self) {
        let mut count = self.count.lock();
        *count += 1;
    }

    /// Reports one task done. If `cancel_others` is set, the whole operation is considered
    /// complete immediately regardless of how many tasks remain (the winner's path). Otherwise
    /// decrements the count under the same lock that guards the zero-check, so a loser reporting
    /// in just after a winner's `cancel_others` call sees the count already at zero and treats it
    /// as a no-op rather than racing a separate check-then-decrement against the winner.
    pub fn mark_as_complete(&self, cancel_others: bool) {
        {
            let mut count = self.count.lock();
            if cancel_others {
                *count = 0;
            } else if *count > 0 {
                *count -= 1;
            }
        }
        self.cv.notify_one();
    }

    /// Waits until `count == 0` or `deadline` elapses, then unconditionally sets `count := 0` so
    /// any stragglers observe cancellation on their next poll.
    pub fn wait_and_complete(&self, deadline: Duration) {
        let mut count = self.count.lock();
        let start = Instant::now();
        while *count > 0 {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                break;
            }
            let remaining = deadline - elapsed;
            let timed_out = self.cv.wait_for(&mut count, remaining).timed_out();
            if timed_out {
                break;
            }
        }
        *count = 0;
    }

    pub fn is_completed(&self) -> bool {
        *self.count.lock() <= 0
    }
}
