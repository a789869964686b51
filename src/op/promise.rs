//! `Promise<T>`: the caller-facing completion handle for a queued
//! [`crate::op::Operation`].
//!
//! Grounded in `Promise.h`'s four-state machine
//! (Null/Pending/Resolved/Rejected), reimplemented with a `Mutex` +
//! `Condvar` pair. This fixes the documented bug in
//! `Code/Core/Concurrent/TaskHandle.h`: `wait()` here blocks until the op
//! has actually settled, never returning early just because it was popped
//! off the dispatch ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::OpError;

struct Inner<T> {
    state: Mutex<Option<Result<T, OpError>>>,
    condvar: Condvar,
    cancel_requested: AtomicBool,
}

/// The consumer side of a promise. Cheaply cloneable — every clone
/// observes the same settlement.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

/// The producer side of a promise, held by the op controller until the
/// operation settles. Not `Clone`: exactly one party settles a promise.
pub struct Settler<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a linked `(Promise, Settler)` pair, analogous to a oneshot
/// channel with a blocking receiver.
pub fn pair<T>() -> (Promise<T>, Settler<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(None),
        condvar: Condvar::new(),
        cancel_requested: AtomicBool::new(false),
    });
    (
        Promise {
            inner: inner.clone(),
        },
        Settler { inner },
    )
}

impl<T: Clone> Promise<T> {
    /// Blocks until the operation settles, returning its result. Does not
    /// attempt to run the operation on the calling thread (unlike the
    /// original's `Promise::Run`-from-`Wait` shortcut) — the caller's only
    /// guarantee is that this returns after actual completion.
    pub fn wait(&self) -> Result<T, OpError> {
        let mut guard = self.inner.state.lock();
        loop {
            if let Some(result) = &*guard {
                return result.clone();
            }
            self.inner.condvar.wait(&mut guard);
        }
    }

    /// Blocks for at most `timeout`, returning `None` if the operation has
    /// not settled by then. Does not itself produce `OpError::TimedOut` —
    /// that is reserved for the op's own wall-clock budget, settled by the
    /// controller.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, OpError>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.state.lock();
        loop {
            if let Some(result) = &*guard {
                return Some(result.clone());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let timed_out = self.inner.condvar.wait_for(&mut guard, remaining);
            if timed_out.timed_out() && guard.is_none() {
                return None;
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.state.lock().is_some()
    }

    /// Requests cancellation. Only takes effect if the controller observes
    /// the flag before the op passes its last cancellation checkpoint;
    /// see §5's checkpoint list.
    pub fn cancel(&self) {
        self.inner.cancel_requested.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }
}

impl<T> Settler<T> {
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    fn settle(self, result: Result<T, OpError>) {
        let mut guard = self.inner.state.lock();
        debug_assert!(guard.is_none(), "promise settled twice");
        *guard = Some(result);
        drop(guard);
        self.inner.condvar.notify_all();
    }

    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: OpError) {
        self.settle(Err(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_blocks_until_resolved() {
        let (promise, settler) = pair::<u32>();
        let handle = thread::spawn(move || promise.wait());
        thread::sleep(Duration::from_millis(10));
        settler.resolve(7);
        assert_eq!(handle.join().unwrap(), Ok(7));
    }

    #[test]
    fn reject_delivers_error_to_waiter() {
        let (promise, settler) = pair::<()>();
        settler.reject(OpError::Cancelled);
        assert!(matches!(promise.wait(), Err(OpError::Cancelled)));
    }

    #[test]
    fn wait_timeout_returns_none_before_settlement() {
        let (promise, _settler) = pair::<()>();
        assert!(promise.wait_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn cancel_flag_is_observable_by_settler() {
        let (promise, settler) = pair::<()>();
        promise.cancel();
        assert!(settler.is_cancel_requested());
    }
}
