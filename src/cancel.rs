use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot broadcast cancellation shared by every activity of a pipeline.
///
/// Nothing is ever sent on the inner channel. Cancelling drops the only
/// sender, which disconnects the channel: from then on every `recv` on
/// [`CancelToken::signal`] completes immediately, for current and future
/// waiters alike. That makes the signal usable as one arm of a
/// `crossbeam::select!` next to a send or receive.
#[derive(Debug, Clone)]
pub struct CancelToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
    fired: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, not yet cancelled token
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fire the token.
    ///
    /// Returns `true` for the call that actually fired it; later calls are
    /// no-ops and return `false`.
    pub fn cancel(&self) -> bool {
        let trigger = self.trigger.lock().take();
        match trigger {
            Some(sender) => {
                self.fired.store(true, Ordering::SeqCst);
                drop(sender);
                tracing::debug!("cancellation fired");
                true
            }
            None => false,
        }
    }

    /// Whether the token has been fired
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready (disconnected) once the token fires
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Block until the token fires or the timeout elapses.
    /// Returns `true` if the token fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            _ => true,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_one_shot() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.signal().recv().is_err());
    }

    #[test]
    fn test_wait_timeout_without_cancel() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_broadcast_wakes_all_waiters() {
        let token = CancelToken::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let token = token.clone();
                thread::spawn(move || token.wait_timeout(Duration::from_secs(5)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        // A waiter arriving after the fact is released immediately too
        assert!(token.wait_timeout(Duration::from_millis(1)));
    }
}
