//! Fixed-size FIFO worker pool.
//!
//! Jobs run in submission order, each on whichever worker frees up first.
//! A job that panics is logged and dropped; the worker keeps going.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{panic_message, SchedulerError, SchedulerResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Count of submitted jobs that have not finished yet.
#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_zero(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            count = self.idle.wait_timeout(count, left).unwrap_or_else(PoisonError::into_inner).0;
        }
        true
    }
}

/// Worker pool executing boxed jobs in FIFO order.
///
/// Dropping the pool (or calling [`WorkerPool::shutdown`]) stops intake,
/// lets the workers drain every job already queued and joins them.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::WorkerPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::serial("interaction").unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..3 {
///     let done = done.clone();
///     pool.execute(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     }).unwrap();
/// }
/// pool.shutdown();
/// assert_eq!(done.load(Ordering::SeqCst), 3);
/// ```
pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    outstanding: Arc<Outstanding>,
}

impl WorkerPool {
    /// Create and start a pool.
    ///
    /// # Arguments
    ///
    /// * `name` - Thread name prefix; workers are named `{name}-{id}`
    /// * `num_workers` - Number of threads, at least one is always started
    pub fn new(name: &str, num_workers: usize) -> SchedulerResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let outstanding = Arc::new(Outstanding::default());

        let mut workers = Vec::with_capacity(num_workers.max(1));
        for id in 0..num_workers.max(1) {
            let thread_name = format!("{name}-{id}");
            let receiver = Arc::clone(&receiver);
            let outstanding = Arc::clone(&outstanding);
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || run(receiver, outstanding))
                .map_err(|source| SchedulerError::Spawn { name: thread_name, source })?;
            workers.push(handle);
        }
        debug!(pool = name, workers = workers.len(), "worker pool started");

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            outstanding,
        })
    }

    /// A single-thread pool; jobs never overlap.
    pub fn serial(name: &str) -> SchedulerResult<Self> {
        Self::new(name, 1)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.outstanding.get()
    }

    /// Queue a job behind everything submitted before it.
    pub fn execute<F>(&self, job: F) -> SchedulerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or_else(|| SchedulerError::Closed(self.name.clone()))?;
        self.outstanding.add();
        sender.send(Box::new(job)).map_err(|_| {
            self.outstanding.done();
            SchedulerError::Closed(self.name.clone())
        })
    }

    /// Block until every submitted job has finished or `timeout` passes.
    ///
    /// Returns `true` when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.outstanding.wait_zero(timeout)
    }

    /// Stop intake, drain queued jobs and join the workers.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            if worker.join().is_err() {
                warn!(pool = %self.name, "worker thread exited abnormally");
            }
        }
        debug!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop: runs jobs until the channel is closed and empty.
fn run(receiver: Arc<Mutex<Receiver<Job>>>, outstanding: Arc<Outstanding>) {
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        let Ok(job) = job else {
            break;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let thread = thread::current();
            warn!(
                worker = thread.name().unwrap_or("worker"),
                panic = %panic_message(payload.as_ref()),
                "job panicked"
            );
        }
        outstanding.done();
    }
}
