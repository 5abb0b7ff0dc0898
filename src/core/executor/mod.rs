//! Bounded task executor.
//!
//! Runs arbitrary zero-argument suppliers on a fixed-size pool of OS
//! threads and hands back a time-boundable [`TaskHandle`]. Waiting on a
//! handle is the only blocking point of the whole gate; the breakers on top
//! perform their bookkeeping without blocking.
//!
//! Timeouts are *detach-on-timeout*, not cancellation: a task that outlives
//! its caller's patience keeps its pool slot until it finishes on its own,
//! and its late result is discarded. Pool sizing must budget for such
//! leaked slots, since exhausting the pool stalls every guarded dependency
//! at once.

use crate::base::CallOutcome;
use crate::{config, logging, Error, Result};
use lazy_static::lazy_static;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

lazy_static! {
    static ref GLOBAL_EXECUTOR: Arc<BoundedExecutor> = Arc::new(
        BoundedExecutor::new(config::executor_pool_size())
            .expect("global executor pool_size is validated by ConfigEntity::check()")
    );
}

/// The process-wide executor shared by breakers that were not given a
/// dedicated pool. Lazily built with the pool size of the global config.
pub fn global_executor() -> Arc<BoundedExecutor> {
    Arc::clone(&GLOBAL_EXECUTOR)
}

/// A fixed-size worker pool. Suppliers submitted to it are queued on one
/// shared channel and picked up by the first idle worker.
#[derive(Debug)]
pub struct BoundedExecutor {
    workers: Vec<Worker>,
    // `None` only during drop, after the channel has been closed.
    sender: Option<Sender<Job>>,
}

impl BoundedExecutor {
    pub fn new(pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::msg("executor pool_size must be positive"));
        }
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            workers.push(Worker::run(id, Arc::clone(&receiver)));
        }
        Ok(BoundedExecutor {
            workers,
            sender: Some(sender),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Queues the supplier for execution and returns a handle to its
    /// result. A supplier that returns `Err` or panics surfaces as
    /// `CallOutcome::Failure` on the handle, never as a process crash.
    pub fn submit<T, F>(&self, supplier: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(supplier)) {
                Ok(res) => res,
                Err(reason) => Err(Error::msg(panic_message(reason))),
            };
            // The receiver is gone when the caller timed out and moved on;
            // the late result is discarded here.
            let _ = tx.send(outcome);
        });
        self.sender
            .as_ref()
            .expect("sender kept until drop")
            .send(job)
            .map_err(|_| Error::msg("executor is shut down"))?;
        Ok(TaskHandle { receiver: rx })
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        // Closing the channel lets every worker drain the queue and exit.
        drop(self.sender.take());
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    logging::error!(
                        "[BoundedExecutor] worker {} panicked outside of a task",
                        worker.id
                    );
                }
            }
        }
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn run(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> Self {
        let handle = thread::Builder::new()
            .name(format!("callguard-worker-{}", id))
            .spawn(move || loop {
                // The guard drops at the end of this statement, so the
                // lock is never held while the job itself runs.
                let job = receiver.lock().unwrap().recv();
                match job {
                    Ok(job) => job(),
                    // Channel closed, the executor is dropping.
                    Err(_) => break,
                }
            })
            .expect("failed to spawn executor worker thread");
        Worker {
            id,
            handle: Some(handle),
        }
    }
}

/// A handle to one submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks the calling thread up to `timeout` for the task's outcome.
    /// Returns `CallOutcome::Timeout` without cancelling the underlying
    /// work; dropping the handle afterwards detaches the task.
    pub fn wait_for(&self, timeout: Duration) -> CallOutcome<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(value)) => CallOutcome::Success(value),
            Ok(Err(err)) => CallOutcome::Failure(err),
            Err(RecvTimeoutError::Timeout) => CallOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                // Worker died before sending; catch_unwind makes this
                // unreachable in practice.
                CallOutcome::Failure(Error::msg("task result channel disconnected"))
            }
        }
    }
}

fn panic_message(reason: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = reason.downcast_ref::<&str>() {
        format!("supplier panicked: {}", msg)
    } else if let Some(msg) = reason.downcast_ref::<String>() {
        format!("supplier panicked: {}", msg)
    } else {
        "supplier panicked".into()
    }
}
