//! Cooperative cancellation and bounded joins for the background loops.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// Shared stop flag. Loops check it at the top of every iteration and sleep through
/// [`StopSignal::sleep`] so a trigger cuts their idle time short.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until triggered. Returns true if the signal was triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock();
        while !self.is_triggered() {
            if self.inner.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_triggered()
    }
}

/// A named background thread that can be joined with a deadline.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|e| Error::Worker(format!("failed to spawn {}: {}", name, e)))?;
        debug!("spawned worker {}", name);
        Ok(Self {
            name: name.to_string(),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to `timeout` for the thread to exit. A thread still running at the deadline
    /// is detached and false is returned; it may be stuck inside an uninterruptible call.
    pub fn join_timeout(mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("worker {} did not stop within {:?}, detaching", self.name, timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            warn!("worker {} panicked", self.name);
        }
        true
    }
}

/// Join every handle, each against the same overall deadline. Returns how many stopped.
pub fn join_all(handles: Vec<WorkerHandle>, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    handles
        .into_iter()
        .map(|h| h.join_timeout(deadline.saturating_duration_since(Instant::now())))
        .filter(|stopped| *stopped)
        .count()
}
