//! One-shot completion slots for synchronous round-trips.
//!
//! A [`completion_pair`] splits into a [`CompletionHandle`], given to whoever
//! produces the result (typically the bus reader), and a
//! [`CompletionWaiter`], kept by the caller blocked on it. The waiter can
//! either block on a condition variable or register a callback that fires
//! when the value arrives, which is what lets a nested main loop be stopped
//! from the reply path.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

type Notify = Box<dyn FnOnce() + Send>;

struct CompletionState<T> {
    slot: Mutex<Slot<T>>,
    condvar: Condvar,
}

struct Slot<T> {
    value: Option<T>,
    done: bool,
    notify: Option<Notify>,
}

/// Producer side of a completion pair.
pub struct CompletionHandle<T> {
    inner: Arc<CompletionState<T>>,
}

impl<T> CompletionHandle<T> {
    /// Store the value and wake the waiter.
    ///
    /// The registered callback, if any, runs on the calling thread after the
    /// value is visible to the waiter.
    pub fn complete(self, value: T) {
        let notify = {
            let mut slot = self.inner.slot.lock();
            slot.value = Some(value);
            slot.done = true;
            slot.notify.take()
        };
        self.inner.condvar.notify_all();
        if let Some(notify) = notify {
            notify();
        }
    }
}

/// Consumer side of a completion pair.
pub struct CompletionWaiter<T> {
    inner: Arc<CompletionState<T>>,
}

impl<T> CompletionWaiter<T> {
    /// Whether the producer has completed.
    pub fn is_complete(&self) -> bool {
        self.inner.slot.lock().done
    }

    /// Take the value if it has arrived.
    pub fn take(&self) -> Option<T> {
        self.inner.slot.lock().value.take()
    }

    /// Register a callback to run on completion.
    ///
    /// If the value already arrived, the callback runs immediately on the
    /// current thread. Registering a second callback replaces the first.
    pub fn on_complete<F>(&self, notify: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.inner.slot.lock();
        if slot.done {
            drop(slot);
            notify();
        } else {
            slot.notify = Some(Box::new(notify));
        }
    }

    /// Block until the value arrives.
    pub fn wait(self) -> Option<T> {
        let mut slot = self.inner.slot.lock();
        while !slot.done {
            self.inner.condvar.wait(&mut slot);
        }
        slot.value.take()
    }

    /// Block for at most `timeout`.
    ///
    /// Returns `true` if the value arrived within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.done {
            return true;
        }
        let _ = self.inner.condvar.wait_for(&mut slot, timeout);
        slot.done
    }
}

/// Create a handle/waiter pair.
pub fn completion_pair<T>() -> (CompletionHandle<T>, CompletionWaiter<T>) {
    let state = Arc::new(CompletionState {
        slot: Mutex::new(Slot {
            value: None,
            done: false,
            notify: None,
        }),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
        },
        CompletionWaiter { inner: state },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_completion_pair() {
        let (handle, waiter) = completion_pair();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.complete(7u32);
        });

        assert_eq!(waiter.wait(), Some(7));
        thread.join().unwrap();
    }

    #[test]
    fn test_completion_timeout() {
        let (_handle, waiter) = completion_pair::<u32>();
        assert!(!waiter.wait_timeout(Duration::from_millis(10)));
        assert!(!waiter.is_complete());
        assert_eq!(waiter.take(), None);
    }

    #[test]
    fn test_callback_runs_on_complete() {
        let (handle, waiter) = completion_pair();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = fired.clone();
        waiter.on_complete(move || fired_clone.store(true, Ordering::SeqCst));
        assert!(!fired.load(Ordering::SeqCst));

        handle.complete("reply");
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(waiter.take(), Some("reply"));
        assert_eq!(waiter.take(), None);
    }

    #[test]
    fn test_callback_registered_after_completion_runs_immediately() {
        let (handle, waiter) = completion_pair();
        handle.complete(1u8);

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        waiter.on_complete(move || fired_clone.store(true, Ordering::SeqCst));

        assert!(fired.load(Ordering::SeqCst));
        assert!(waiter.wait_timeout(Duration::ZERO));
    }
}
