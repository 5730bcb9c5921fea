//! Manual-reset cross-thread signal.

use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use thiserror::Error;

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The signal was (or became) set before the timeout.
    Signaled,
    /// The timeout elapsed with the signal still idle.
    TimedOut,
}

impl WaitStatus {
    /// Whether the wait ended because the signal was set.
    #[must_use]
    pub const fn is_signaled(self) -> bool {
        matches!(self, Self::Signaled)
    }
}

/// Wait primitive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// A thread panicked while holding the signal lock.
    #[error("Wait abandoned: signal lock poisoned")]
    Abandoned,
    /// The signal was closed before the wait started.
    #[error("Wait on a closed signal")]
    Closed,
}

#[derive(Debug, Default)]
struct State {
    signaled: bool,
    closed: bool,
}

/// Binary manual-reset signal (Idle / Signaled) with a terminal closed state.
///
/// Once set, the signal stays set across any number of waits until
/// [`Signal::reset`] is called. Closing forces it to Signaled permanently.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Signal {
    /// Create an idle signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Setters run on foreign threads and must not panic, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to Signaled and wake every waiter.
    pub fn set(&self) {
        self.lock().signaled = true;
        self.condvar.notify_all();
    }

    /// Move back to Idle. No-op once closed.
    pub fn reset(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.signaled = false;
        }
    }

    /// Current state, as a hint.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.lock().signaled
    }

    /// Whether [`Signal::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Force Signaled, release every waiter and refuse further waits.
    ///
    /// Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        let first = {
            let mut state = self.lock();
            let first = !state.closed;
            state.signaled = true;
            state.closed = true;
            first
        };
        self.condvar.notify_all();
        first
    }

    /// Block until the signal is set or `timeout` elapses.
    ///
    /// `None` waits forever; a zero timeout polls once without blocking.
    ///
    /// # Errors
    /// Returns [`WaitError::Closed`] if the signal was closed before the call,
    /// or [`WaitError::Abandoned`] if the lock was poisoned.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitStatus, WaitError> {
        let guard = self.state.lock().map_err(|_| WaitError::Abandoned)?;
        if guard.closed {
            return Err(WaitError::Closed);
        }

        let signaled = match timeout {
            None => {
                self.condvar
                    .wait_while(guard, |s| !s.signaled)
                    .map_err(|_| WaitError::Abandoned)?
                    .signaled
            }
            Some(timeout) if timeout.is_zero() => guard.signaled,
            Some(timeout) => {
                let (guard, _) = self
                    .condvar
                    .wait_timeout_while(guard, timeout, |s| !s.signaled)
                    .map_err(|_| WaitError::Abandoned)?;
                guard.signaled
            }
        };

        Ok(if signaled {
            WaitStatus::Signaled
        } else {
            WaitStatus::TimedOut
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::Arc,
        thread,
        time::Instant,
    };

    #[test]
    fn test_zero_timeout_polls() {
        let signal = Signal::new();
        assert_eq!(signal.wait(Some(Duration::ZERO)), Ok(WaitStatus::TimedOut));

        signal.set();
        assert_eq!(signal.wait(Some(Duration::ZERO)), Ok(WaitStatus::Signaled));
    }

    #[test]
    fn test_timeout_elapses() {
        let signal = Signal::new();
        let start = Instant::now();
        let status = signal.wait(Some(Duration::from_millis(50))).unwrap();

        assert_eq!(status, WaitStatus::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_manual_reset_stays_set() {
        let signal = Signal::new();
        signal.set();

        for _ in 0..3 {
            assert!(signal.wait(Some(Duration::from_secs(5))).unwrap().is_signaled());
        }

        signal.reset();
        assert!(!signal.is_signaled());
    }

    #[test]
    fn test_set_wakes_waiter() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait(None))
        };

        thread::sleep(Duration::from_millis(50));
        signal.set();

        assert_eq!(waiter.join().unwrap(), Ok(WaitStatus::Signaled));
    }

    #[test]
    fn test_close_releases_waiter_and_refuses_new_waits() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait(None))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(signal.close());
        assert!(!signal.close());

        assert_eq!(waiter.join().unwrap(), Ok(WaitStatus::Signaled));
        assert_eq!(signal.wait(Some(Duration::ZERO)), Err(WaitError::Closed));

        signal.reset();
        assert!(signal.is_signaled());
    }
}
