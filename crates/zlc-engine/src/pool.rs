// SPDX-License-Identifier: LGPL-3.0-or-later

//! Worker scheduling seam.
//!
//! The engine dispatches each FFT partition through the [`WorkerPool`]
//! trait: one registered task per convolver, scheduled whenever the
//! partition's input window fills. Keeping the primitive behind a trait
//! lets the engine run against [`RtThreadPool`] in production and
//! against the synchronous [`InlinePool`] in tests and offline rendering.
//!
//! Scheduling is idempotent: asking for an already-pending task is a
//! no-op. `RtThreadPool` gets this from a bounded(1) wake channel whose
//! `try_send` simply fails while a wake token is still unconsumed.

use crossbeam_channel::{bounded, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};

/// Handle to a registered task, returned by [`WorkerPool::register`].
pub type TaskId = usize;

/// A scheduling primitive that runs named tasks at fixed priorities.
pub trait WorkerPool: Send {
    /// Register `task` under `name` at the given priority and return its
    /// handle. Called once per partition at engine setup.
    fn register(&mut self, name: &str, priority: u8, task: Arc<dyn Fn() + Send + Sync>) -> TaskId;

    /// Request a run of the task. Must not block the caller; scheduling
    /// an already-pending task is a no-op.
    fn schedule(&self, task: TaskId);
}

/// One persistent thread per task, parked on a wake channel.
///
/// Threads are named after their task and demoted/promoted to the
/// requested priority at startup. Dropping the pool closes the wake
/// channels and joins every worker.
pub struct RtThreadPool {
    workers: Vec<Worker>,
}

struct Worker {
    wake: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RtThreadPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
        }
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Default for RtThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for RtThreadPool {
    fn register(&mut self, name: &str, priority: u8, task: Arc<dyn Fn() + Send + Sync>) -> TaskId {
        let (wake, rx) = bounded::<()>(1);
        let thread_name = name.to_string();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                apply_priority(&thread_name, priority);
                // One token per pending request; the channel closing is
                // the shutdown signal.
                while rx.recv().is_ok() {
                    task();
                }
            })
            .expect("failed to spawn worker thread");

        self.workers.push(Worker {
            wake: Some(wake),
            thread: Some(thread),
        });
        self.workers.len() - 1
    }

    fn schedule(&self, task: TaskId) {
        if let Some(wake) = &self.workers[task].wake {
            // Full channel means a wake is already pending: coalesce.
            let _ = wake.try_send(());
        }
    }
}

impl Drop for RtThreadPool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.wake.take();
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

/// Set the calling thread's priority, logging (not failing) on refusal:
/// unprivileged processes commonly cannot raise themselves.
fn apply_priority(name: &str, priority: u8) {
    match ThreadPriorityValue::try_from(priority) {
        Ok(value) => {
            if let Err(e) = set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
                log::warn!("worker '{}': could not set priority {}: {:?}", name, priority, e);
            }
        }
        Err(e) => {
            log::warn!("worker '{}': invalid priority {}: {:?}", name, priority, e);
        }
    }
}

/// Synchronous pool: `schedule` runs the task on the calling thread.
///
/// Makes the whole engine single-threaded and deterministic, which the
/// accuracy tests and offline rendering rely on. Priorities are ignored.
pub struct InlinePool {
    tasks: Vec<Arc<dyn Fn() + Send + Sync>>,
}

impl InlinePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }
}

impl Default for InlinePool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for InlinePool {
    fn register(&mut self, _name: &str, _priority: u8, task: Arc<dyn Fn() + Send + Sync>) -> TaskId {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    fn schedule(&self, task: TaskId) {
        (self.tasks[task])();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn counting_task(counter: &Arc<AtomicUsize>) -> Arc<dyn Fn() + Send + Sync> {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_for(counter: &AtomicUsize, at_least: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < at_least {
            assert!(Instant::now() < deadline, "task did not run in time");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_inline_pool_runs_synchronously() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = InlinePool::new();
        let id = pool.register("inline-test", 50, counting_task(&counter));

        pool.schedule(id);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        pool.schedule(id);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_threaded_pool_runs_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = RtThreadPool::new();
        let id = pool.register("threaded-test", 10, counting_task(&counter));

        pool.schedule(id);
        wait_for(&counter, 1);
    }

    #[test]
    fn test_threaded_pool_multiple_tasks() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let mut pool = RtThreadPool::new();
        let id_a = pool.register("worker-a", 10, counting_task(&a));
        let id_b = pool.register("worker-b", 9, counting_task(&b));
        assert_ne!(id_a, id_b);
        assert_eq!(pool.len(), 2);

        pool.schedule(id_b);
        pool.schedule(id_a);
        wait_for(&a, 1);
        wait_for(&b, 1);
    }

    #[test]
    fn test_schedule_coalesces_without_blocking() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = RtThreadPool::new();
        let id = pool.register("coalesce-test", 10, counting_task(&counter));

        // A burst of schedules must neither block nor deadlock; at least
        // one run is guaranteed, extras may coalesce away.
        for _ in 0..100 {
            pool.schedule(id);
        }
        wait_for(&counter, 1);
    }

    #[test]
    fn test_drop_joins_workers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = RtThreadPool::new();
        let id = pool.register("drop-test", 10, counting_task(&counter));
        pool.schedule(id);
        wait_for(&counter, 1);
        drop(pool); // must not hang
    }
}
