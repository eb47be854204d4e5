use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// A Condvar-backed pulse: worker threads park here while waiting for new
/// `PIECE_BLOCK` datagrams to land, and the receive loop notifies it on
/// every arrival. This generalizes the teacher's gate/semaphore primitives
/// into a single repeatable wake-up, since every waiter here is polling
/// the same "did anything change" question against a deadline.
pub struct PieceNotify {
    generation: Mutex<u64>,
    cvar: Condvar,
}

impl PieceNotify {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            cvar: Condvar::new(),
        }
    }

    /// Wake every thread parked in `wait_until`.
    pub fn notify(&self) {
        if let Ok(mut generation) = self.generation.lock() {
            *generation = generation.wrapping_add(1);
            self.cvar.notify_all();
        }
    }

    /// Block until notified or `deadline` passes, whichever comes first.
    /// Returns `true` if woken by a notification, `false` on timeout or a
    /// poisoned lock.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut generation = match self.generation.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let seen = *generation;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, timeout_result) = match self.cvar.wait_timeout(generation, deadline - now) {
                Ok(pair) => pair,
                Err(_) => return false,
            };
            generation = guard;
            if *generation != seen {
                return true;
            }
            if timeout_result.timed_out() {
                return false;
            }
        }
    }
}

impl Default for PieceNotify {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_until_times_out_with_no_notify() {
        let notify = PieceNotify::new();
        let woke = notify.wait_until(Instant::now() + Duration::from_millis(20));
        assert!(!woke);
    }

    #[test]
    fn notify_wakes_a_waiter() {
        let notify = Arc::new(PieceNotify::new());
        let waiter = Arc::clone(&notify);
        let handle = thread::spawn(move || waiter.wait_until(Instant::now() + Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        notify.notify();

        assert!(handle.join().unwrap());
    }
}
