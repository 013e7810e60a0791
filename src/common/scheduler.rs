//! Delayed and periodic task scheduling.
//!
//! A small timer capability independent of any host tick rate. Hosts with
//! tick-based schedulers translate real-time delays to their native units
//! behind this interface; the core only deals in `Duration`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::AbortHandle;

/// Handle to a scheduled task, used to cancel it.
pub type TaskId = u64;

/// Tokio-backed scheduler with cancellable tasks.
pub struct Scheduler {
    tasks: Mutex<HashMap<TaskId, AbortHandle>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `future` once after `delay`.
    pub fn schedule_once<F>(&self, delay: Duration, future: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        });
        self.tasks.lock().unwrap().insert(id, handle.abort_handle());
        id
    }

    /// Run a task produced by `task_gen` every `interval`, first run after
    /// one full interval.
    pub fn schedule_repeating<F, Fut>(&self, interval: Duration, mut task_gen: F) -> TaskId
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                task_gen().await;
            }
        });
        self.tasks.lock().unwrap().insert(id, handle.abort_handle());
        id
    }

    /// Cancel a scheduled task. Cancelling an already-finished or unknown
    /// task is a no-op.
    pub fn cancel(&self, id: TaskId) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(&id) {
            handle.abort();
        }
    }

    /// Abort every outstanding task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
