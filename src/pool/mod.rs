//! Worker pool with pluggable queue discipline
//!
//! A fixed set of worker threads drains a task queue guarded by one mutex
//! and two condition variables: *consumer* wakes a worker when the queue
//! goes from empty to non-empty, *producer* wakes a blocked submitter when
//! a bounded queue drops below its ceiling. The queue is either FIFO or a
//! priority heap (see [`queue`]), chosen when the pool is built.
//!
//! Tasks are opaque values of one type `T`; the pool runs each through a
//! single runner closure fixed at construction. Producers outside the
//! pool use [`ThreadPool::submit`], which blocks on a full bounded queue.
//! Producers *inside* the pool (tasks that spawn tasks) must use
//! [`ThreadPool::try_submit`] and handle `Full` themselves — typically by
//! running the task inline — because every worker blocking on the
//! producer condvar at once would deadlock the pool.
//!
//! # Shutdown
//!
//! [`ThreadPool::shutdown`] (also run on drop) flips the stop flag and
//! joins the workers. Workers drain the queue before exiting, so any task
//! accepted by `submit` is guaranteed to run.

pub mod queue;

use crate::error::{PoolError, SubmitError};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

use self::queue::{Comparator, TaskQueue};

/// Builder for [`ThreadPool`]
pub struct PoolBuilder<T> {
    threads: usize,
    stack_size: Option<usize>,
    queue_limit: Option<usize>,
    cmp: Option<Comparator<T>>,
    name: String,
}

impl<T: Send + 'static> PoolBuilder<T> {
    pub fn new() -> Self {
        Self {
            threads: 1,
            stack_size: None,
            queue_limit: None,
            cmp: None,
            name: "worker".to_string(),
        }
    }

    /// Number of worker threads. Must be at least one.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Stack size for each worker thread.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Queue ceiling. `None` (or zero) selects the unbounded,
    /// auto-growing queue; `Some(n)` makes `submit` block while `n`
    /// tasks are queued.
    pub fn queue_limit(mut self, limit: Option<usize>) -> Self {
        self.queue_limit = limit.filter(|&n| n > 0);
        self
    }

    /// Switch the queue to heap mode ordered by `cmp`:
    /// `cmp(a, b) == Greater` iff `a` should be dequeued before `b`.
    pub fn priority<F>(mut self, cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.cmp = Some(Box::new(cmp));
        self
    }

    /// Thread name prefix (workers are named `{prefix}-{index}`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Launch the workers. Each starts in wait-for-task state and passes
    /// every dequeued task to `runner`.
    pub fn build<F>(self, runner: F) -> Result<ThreadPool<T>, PoolError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if self.threads == 0 {
            return Err(PoolError::NoWorkers);
        }

        let inner = Arc::new(Inner {
            queue: Mutex::new(QueueState {
                tasks: TaskQueue::new(self.cmp, self.queue_limit),
                stop: false,
                running: 0,
            }),
            consumer: Condvar::new(),
            producer: Condvar::new(),
            limit: self.queue_limit,
        });
        let runner: Arc<dyn Fn(T) + Send + Sync> = Arc::new(runner);

        let mut workers = Vec::with_capacity(self.threads);
        for id in 0..self.threads {
            let mut builder = thread::Builder::new().name(format!("{}-{}", self.name, id));
            if let Some(bytes) = self.stack_size {
                builder = builder.stack_size(bytes);
            }
            let worker_inner = Arc::clone(&inner);
            let worker_runner = Arc::clone(&runner);
            match builder.spawn(move || worker_loop(worker_inner, worker_runner)) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Wind down whatever already started before bailing.
                    inner.queue.lock().stop = true;
                    inner.consumer.notify_all();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(err));
                }
            }
        }

        debug!(threads = self.threads, limit = ?self.queue_limit, "worker pool started");
        Ok(ThreadPool {
            inner,
            workers: Mutex::new(workers),
        })
    }
}

impl<T: Send + 'static> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct QueueState<T> {
    tasks: TaskQueue<T>,
    stop: bool,
    running: usize,
}

struct Inner<T> {
    queue: Mutex<QueueState<T>>,
    consumer: Condvar,
    producer: Condvar,
    limit: Option<usize>,
}

/// Fixed set of worker threads draining one task queue
pub struct ThreadPool<T> {
    inner: Arc<Inner<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Enqueue a task, blocking while a bounded queue is at its ceiling.
    ///
    /// Fails with [`SubmitError::Stopped`] once shutdown has begun —
    /// including when shutdown begins while this call is blocked.
    pub fn submit(&self, task: T) -> Result<(), SubmitError<T>> {
        let mut q = self.inner.queue.lock();
        if q.stop {
            return Err(SubmitError::Stopped(task));
        }
        if let Some(limit) = self.inner.limit {
            while q.tasks.len() == limit {
                self.inner.producer.wait(&mut q);
                if q.stop {
                    return Err(SubmitError::Stopped(task));
                }
            }
        }
        self.push_locked(&mut q, task)
    }

    /// Non-blocking enqueue; returns the task on a full bounded queue.
    pub fn try_submit(&self, task: T) -> Result<(), SubmitError<T>> {
        let mut q = self.inner.queue.lock();
        if q.stop {
            return Err(SubmitError::Stopped(task));
        }
        if let Some(limit) = self.inner.limit {
            if q.tasks.len() == limit {
                return Err(SubmitError::Full(task));
            }
        }
        self.push_locked(&mut q, task)
    }

    fn push_locked(&self, q: &mut QueueState<T>, task: T) -> Result<(), SubmitError<T>> {
        match q.tasks.push(task) {
            Ok(()) => {
                if q.tasks.len() == 1 {
                    self.inner.consumer.notify_one();
                }
                Ok(())
            }
            Err(task) => Err(SubmitError::Exhausted(task)),
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().tasks.len()
    }

    /// Number of tasks currently executing on workers.
    pub fn running(&self) -> usize {
        self.inner.queue.lock().running
    }

    /// True when no task is queued or executing.
    pub fn is_idle(&self) -> bool {
        let q = self.inner.queue.lock();
        q.tasks.is_empty() && q.running == 0
    }

    /// Stop accepting work, let the workers drain the queue, and join
    /// them. Idempotent; also invoked by `Drop`.
    pub fn shutdown(&self) {
        {
            let mut q = self.inner.queue.lock();
            if q.stop {
                return;
            }
            q.stop = true;
        }
        self.inner.consumer.notify_all();
        self.inner.producer.notify_all();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
        debug!("worker pool stopped");
    }
}

impl<T> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        {
            let mut q = self.inner.queue.lock();
            if q.stop {
                return;
            }
            q.stop = true;
        }
        self.inner.consumer.notify_all();
        self.inner.producer.notify_all();
        for handle in std::mem::take(&mut *self.workers.lock()) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<T>(inner: Arc<Inner<T>>, runner: Arc<dyn Fn(T) + Send + Sync>) {
    trace!("worker up");
    let mut q = inner.queue.lock();
    loop {
        while q.tasks.is_empty() {
            if q.stop {
                trace!("worker exiting");
                return;
            }
            inner.consumer.wait(&mut q);
        }
        let was_full = matches!(inner.limit, Some(limit) if q.tasks.len() == limit);
        let Some(task) = q.tasks.pop() else {
            continue;
        };
        if was_full {
            inner.producer.notify_one();
        }
        q.running += 1;
        drop(q);
        runner(task);
        q = inner.queue.lock();
        q.running -= 1;
    }
}
