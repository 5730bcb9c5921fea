//! Push-to-poll message bridge.
//!
//! The native connector pushes inbound messages from its own threads; the host
//! thread drains them with [`MessageBridge::try_pop`] and parks in
//! [`MessageBridge::wait_for_message`] between drains.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    signal::{Signal, WaitError, WaitStatus},
    traits::MessageSink,
};

/// FIFO queue of inbound payloads plus a wake-up signal.
///
/// A successful wait is only a hint: the queue is the source of truth, so
/// callers must be ready for [`MessageBridge::try_pop`] to return `None`
/// right after a wait returned [`WaitStatus::Signaled`].
#[derive(Debug, Default)]
pub struct MessageBridge {
    queue: Mutex<VecDeque<String>>,
    signal: Signal,
}

impl MessageBridge {
    /// Create an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Never panics: `push` is reached from native threads.
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a payload and set the signal.
    ///
    /// `destination` is only logged; it is not queued.
    pub fn push(&self, destination: &str, payload: &str) {
        tracing::debug!(destination, payload, "Received message");

        let payload = payload.to_owned();
        self.lock_queue().push_back(payload);
        self.signal.set();
    }

    /// Pop the oldest payload without blocking.
    ///
    /// Resets the signal whenever the queue is left empty, so the next wait
    /// blocks until another push.
    #[must_use]
    pub fn try_pop(&self) -> Option<String> {
        let mut queue = self.lock_queue();
        let message = queue.pop_front();
        if queue.is_empty() {
            // Under the queue lock so a concurrent push cannot lose its wakeup.
            self.signal.reset();
        }
        message
    }

    /// Block until a push (or shutdown) sets the signal, or `timeout` elapses.
    ///
    /// `None` waits forever; `Some(Duration::ZERO)` polls once. Nothing is
    /// popped.
    ///
    /// # Errors
    /// Returns [`WaitError`] if the bridge was already shut down or the
    /// signal lock was poisoned.
    pub fn wait_for_message(&self, timeout: Option<Duration>) -> Result<WaitStatus, WaitError> {
        self.signal.wait(timeout)
    }

    /// Number of queued payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_queue().len()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_queue().is_empty()
    }

    /// Release every blocked waiter and close the signal.
    ///
    /// Idempotent. Pushes are still accepted afterwards so late native
    /// callbacks never fail, but waits return [`WaitError::Closed`].
    pub fn shutdown(&self) {
        if self.signal.close() {
            tracing::debug!(pending = self.len(), "Message bridge shut down");
        }
    }

    /// Whether [`MessageBridge::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.signal.is_closed()
    }

    /// Async wait that parks on tokio's blocking pool.
    ///
    /// # Errors
    /// Same as [`MessageBridge::wait_for_message`]; a panicked blocking task
    /// is reported as [`WaitError::Abandoned`].
    #[cfg(feature = "tokio")]
    pub async fn wait_for_message_async(
        self: std::sync::Arc<Self>,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, WaitError> {
        tokio::task::spawn_blocking(move || self.wait_for_message(timeout))
            .await
            .map_err(|_| WaitError::Abandoned)?
    }
}

impl MessageSink for MessageBridge {
    fn on_message(&self, destination: &str, payload: &str) {
        self.push(destination, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashSet,
        sync::Arc,
        thread,
        time::Instant,
    };

    #[test]
    fn test_fifo_order() {
        let bridge = MessageBridge::new();
        bridge.push("10", "first");
        bridge.push("11", "second");
        bridge.push("10", "third");

        assert_eq!(bridge.len(), 3);
        assert_eq!(bridge.try_pop().as_deref(), Some("first"));
        assert_eq!(bridge.try_pop().as_deref(), Some("second"));
        assert_eq!(bridge.try_pop().as_deref(), Some("third"));
        assert_eq!(bridge.try_pop(), None);
    }

    #[test]
    fn test_try_pop_empty_never_blocks() {
        let bridge = MessageBridge::new();
        let start = Instant::now();
        assert_eq!(bridge.try_pop(), None);

        // Signaled but empty.
        bridge.push("10", "x");
        let _ = bridge.try_pop();
        assert_eq!(bridge.try_pop(), None);

        bridge.shutdown();
        assert_eq!(bridge.try_pop(), None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_returns_immediately() {
        let bridge = MessageBridge::new();
        let start = Instant::now();
        assert_eq!(
            bridge.wait_for_message(Some(Duration::ZERO)),
            Ok(WaitStatus::TimedOut)
        );

        bridge.push("10", "hello");
        assert_eq!(
            bridge.wait_for_message(Some(Duration::ZERO)),
            Ok(WaitStatus::Signaled)
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_drain_resets_signal() {
        let bridge = MessageBridge::new();
        bridge.push("10", "a");
        bridge.push("10", "b");

        assert_eq!(bridge.try_pop().as_deref(), Some("a"));
        assert!(bridge.wait_for_message(Some(Duration::ZERO)).unwrap().is_signaled());

        assert_eq!(bridge.try_pop().as_deref(), Some("b"));
        assert_eq!(
            bridge.wait_for_message(Some(Duration::from_millis(20))),
            Ok(WaitStatus::TimedOut)
        );
    }

    #[test]
    fn test_push_wakes_blocked_waiter() {
        let bridge = Arc::new(MessageBridge::new());
        let waiter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let status = bridge.wait_for_message(None);
                (status, bridge.try_pop())
            })
        };

        thread::sleep(Duration::from_millis(50));
        bridge.push("10", "wake");

        let (status, message) = waiter.join().unwrap();
        assert_eq!(status, Ok(WaitStatus::Signaled));
        assert_eq!(message.as_deref(), Some("wake"));
    }

    #[test]
    fn test_shutdown_releases_blocked_waiter() {
        let bridge = Arc::new(MessageBridge::new());
        let waiter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || bridge.wait_for_message(None))
        };

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        bridge.shutdown();
        bridge.shutdown();

        assert_eq!(waiter.join().unwrap(), Ok(WaitStatus::Signaled));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(bridge.is_shut_down());
        assert_eq!(
            bridge.wait_for_message(Some(Duration::ZERO)),
            Err(WaitError::Closed)
        );
    }

    #[test]
    fn test_concurrent_push_no_loss() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let bridge = Arc::new(MessageBridge::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let bridge = Arc::clone(&bridge);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        bridge.push("10", &format!("{t}:{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = HashSet::new();
        let mut last_per_thread = vec![None; THREADS];
        while let Some(message) = bridge.try_pop() {
            let (t, i) = message.split_once(':').unwrap();
            let (t, i): (usize, usize) = (t.parse().unwrap(), i.parse().unwrap());
            // Per-producer order is preserved.
            assert!(last_per_thread[t].is_none_or(|last| last < i));
            last_per_thread[t] = Some(i);
            assert!(seen.insert(message));
        }

        assert_eq!(seen.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_sink_pushes() {
        let bridge = MessageBridge::new();
        let sink: &dyn MessageSink = &bridge;
        sink.on_message("10", "via sink");
        assert_eq!(bridge.try_pop().as_deref(), Some("via sink"));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_async_wait() {
        let bridge = Arc::new(MessageBridge::new());
        bridge.push("10", "async");

        let status = Arc::clone(&bridge)
            .wait_for_message_async(Some(Duration::from_secs(1)))
            .await;
        assert_eq!(status, Ok(WaitStatus::Signaled));
        assert_eq!(bridge.try_pop().as_deref(), Some("async"));
    }
}
