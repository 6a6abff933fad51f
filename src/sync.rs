//! A counting-semaphore-like primitive used to wake the heartbeat loop.
//!
//! Mirrors `sem_post`/`sem_timedwait`: any number of `post()` calls before
//! the loop checks just collapse into "wake up now", but unlike a bare
//! condition variable, a `post()` that lands before `wait_deadline` is
//! called is not lost.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct EventSignal {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl EventSignal {
    pub fn new() -> Self {
        EventSignal {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Equivalent of `sem_post`: wake the loop, coalescing with any pending wake.
    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Equivalent of `sem_timedwait(&sem, deadline)`: blocks until either a
    /// pending post is consumed or `deadline` passes, whichever is first.
    /// Returns `true` if woken by a post, `false` on timeout.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock().unwrap();
        loop {
            if *count > 0 {
                *count -= 1;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, timeout_result) =
                self.condvar.wait_timeout(count, deadline - now).unwrap();
            count = guard;
            if timeout_result.timed_out() && *count == 0 {
                return false;
            }
        }
    }
}

impl Default for EventSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_deadline_times_out_with_no_post() {
        let sig = EventSignal::new();
        let woken = sig.wait_deadline(Instant::now() + Duration::from_millis(20));
        assert!(!woken);
    }

    #[test]
    fn post_before_wait_is_not_lost() {
        let sig = EventSignal::new();
        sig.post();
        let woken = sig.wait_deadline(Instant::now() + Duration::from_millis(200));
        assert!(woken);
    }

    #[test]
    fn post_from_another_thread_wakes_waiter() {
        let sig = Arc::new(EventSignal::new());
        let sig2 = sig.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sig2.post();
        });
        let woken = sig.wait_deadline(Instant::now() + Duration::from_secs(2));
        handle.join().unwrap();
        assert!(woken);
    }
}
