//! Fixed-size pool of named worker threads fed from one FIFO queue.

use crate::{Error, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};

/// A unit of work run once on some worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool.
///
/// Tasks are taken in submission order, each by exactly one idle worker.
/// Shutdown stops accepting work, lets the workers drain what is already
/// queued and joins them.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidSize);
        }

        let (tx, rx) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("dearjack-worker-{index}"))
                .spawn(move || worker_loop(index, rx));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    drop(tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::Spawn(err));
                }
            }
        }

        tracing::debug!(size, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// One worker per available hardware thread, or one if unknown.
    pub fn with_default_size() -> Result<Self> {
        let size = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(size)
    }

    /// Enqueue a task. Fails with [`Error::ShutDown`] once the pool is shut down.
    pub fn run_task<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(Box::new(task)).map_err(|_| Error::ShutDown),
            None => Err(Error::ShutDown),
        }
    }

    /// Enqueue a task and get its result through a one-slot channel.
    ///
    /// The receiver reports a disconnect if the task panics.
    pub fn submit<F, T>(&self, task: F) -> Result<Receiver<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        self.run_task(move || {
            let _ = tx.send(task());
        })?;
        Ok(rx)
    }

    /// Stop accepting tasks, drain the queue and join every worker.
    ///
    /// Idempotent. Called from inside a task, the calling worker is left
    /// to exit on its own.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("worker thread exited abnormally");
            }
        }

        tracing::debug!(size = self.size, "worker pool shut down");
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop(index: usize, rx: Receiver<Task>) {
    tracing::debug!(worker = index, "worker started");

    while let Ok(task) = rx.recv() {
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)).is_err() {
            tracing::error!(worker = index, "task panicked");
        }
    }

    tracing::debug!(worker = index, "worker exiting");
}
