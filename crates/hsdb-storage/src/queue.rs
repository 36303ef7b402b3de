//! Single-writer apply queue.
//!
//! Mutations are boxed into jobs and sent to one worker thread which runs
//! them in submission order against the shared context. The submitting
//! thread blocks until its job's result comes back.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::{StorageError, StorageResult};

type Job<C> = Box<dyn FnOnce(&C) + Send>;

/// Ordered job queue consumed by a single worker thread.
pub struct WriteQueue<C: Send + Sync + 'static> {
    sender: Option<Sender<Job<C>>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: Send + Sync + 'static> WriteQueue<C> {
    /// Spawn the worker over `context`.
    pub fn spawn(name: &str, context: Arc<C>) -> StorageResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job<C>>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    job(context.as_ref());
                }
                debug!("apply queue drained");
            })
            .map_err(|e| {
                error!(error = %e, "failed to spawn apply worker");
                StorageError::QueueClosed
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Run `job` on the worker and wait for its result.
    pub fn submit<T, F>(&self, job: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> T + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(StorageError::QueueClosed)?;
        let (reply, result) = mpsc::sync_channel(1);
        sender
            .send(Box::new(move |ctx: &C| {
                let _ = reply.send(job(ctx));
            }))
            .map_err(|_| StorageError::QueueClosed)?;
        result.recv().map_err(|_| StorageError::QueueClosed)
    }
}

impl<C: Send + Sync + 'static> Drop for WriteQueue<C> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("apply worker panicked");
            }
        }
    }
}

impl<C: Send + Sync + 'static> std::fmt::Debug for WriteQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("open", &self.sender.is_some())
            .finish()
    }
}
