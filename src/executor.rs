//! Task executor / thread signal collaborator interfaces (§6, items 3-4),
//! plus a minimal reference implementation of each used only by this
//! crate's own tests and doctests.
//!
//! Grounded in `examples/a1phyr-assets_manager/src/hot_reloading/mod.rs`'s
//! worker-thread pattern (`thread::Builder::new().name(...).spawn(...)`
//! draining a `crossbeam_channel` receiver). The core itself never depends
//! on `ThreadPoolExecutor` for anything but tests — a real embedding
//! application supplies its own executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

/// A unit of work the core hands off to an external scheduler.
pub type Task = Box<dyn FnOnce() + Send>;

/// Collaborator interface 3: submit a unit of work; the executor decides
/// when and on which thread it runs.
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, task: Task);
}

/// Collaborator interface 4: wake-one/wake-all for promise completion.
/// [`crate::op::Promise`] already bundles its own condvar internally, so
/// most of the crate never needs this directly; it's exposed for
/// embedding applications that bridge completion into their own event
/// loop.
pub trait ThreadSignal: Send + Sync {
    fn wake_one(&self);
    fn wake_all(&self);
    fn wait(&self);
}

/// A minimal worker-pool `TaskExecutor`, for tests/doctests only.
pub struct ThreadPoolExecutor {
    sender: Sender<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stopping: Arc<AtomicBool>,
}

impl ThreadPoolExecutor {
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = channel::unbounded();
        let stopping = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(worker_count);

        for i in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let stopping = stopping.clone();
            let handle = thread::Builder::new()
                .name(format!("asset-core-worker-{i}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        if stopping.load(Ordering::Acquire) {
                            break;
                        }
                        task();
                    }
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        ThreadPoolExecutor {
            sender,
            workers: Mutex::new(workers),
            stopping,
        }
    }

    /// Signals workers to stop after their current task and joins them.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
        for _ in 0..self.workers.lock().len() {
            let _ = self.sender.send(Box::new(|| {}));
        }
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn submit(&self, task: Task) {
        let _ = self.sender.send(task);
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A `Condvar`-backed `ThreadSignal`, for tests/doctests only.
#[derive(Default)]
pub struct CondvarSignal {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarSignal {
    pub fn new() -> Self {
        CondvarSignal::default()
    }
}

impl ThreadSignal for CondvarSignal {
    fn wake_one(&self) {
        *self.state.lock() = true;
        self.condvar.notify_one();
    }

    fn wake_all(&self) {
        *self.state.lock() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut guard = self.state.lock();
        while !*guard {
            self.condvar.wait(&mut guard);
        }
        *guard = false;
    }
}
