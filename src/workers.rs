// ABOUTME: Small fixed worker pool executing gateway jobs from a bounded queue
// ABOUTME: Dispatch, fanout, and responder writes are all submitted here instead of running inline

//! Gateway worker pool.
//!
//! Every unit of gateway work — request dispatch, event fanout, responder
//! writes, lifecycle notifications — is submitted to this pool as an
//! independent boxed future. The pool is small and fixed (default 2
//! workers) with a bounded queue: when the queue is full, the submitting
//! task runs the job itself rather than growing the queue without bound.
//!
//! Jobs must be self-contained; a job that needs to report a result does so
//! through a responder channel, never through the pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::constants::timeouts;
use crate::monitoring;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed-size pool of job workers over one bounded queue
pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers draining a queue of `queue_capacity`.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(worker_count.max(1));
        for worker in 0..worker_count.max(1) {
            let rx = std::sync::Arc::clone(&rx);
            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => {
                            job.await;
                            monitoring::record_job_completed();
                        }
                        None => {
                            tracing::debug!("Worker {} exiting, queue closed", worker);
                            break;
                        }
                    }
                }
            }));
        }

        Self {
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Submit a job for execution.
    ///
    /// When the queue is full the job runs on the submitter's own task
    /// instead of waiting for a slot. Workers themselves submit follow-up
    /// jobs (a dispatch queues its response write), so blocking on a full
    /// queue from a worker would deadlock the pool.
    pub async fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = {
            let guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };
        match tx {
            Some(tx) => {
                monitoring::record_job_submitted();
                match tx.try_send(Box::pin(job)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(job)) => {
                        tracing::debug!("Worker queue full, running job inline");
                        job.await;
                        monitoring::record_job_completed();
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::warn!("Worker pool queue closed, dropping job");
                    }
                }
            }
            None => {
                tracing::warn!("Worker pool stopped, dropping job");
            }
        }
    }

    /// Close the queue and wait for in-flight jobs to drain.
    pub async fn shutdown(&self) {
        {
            let mut guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take();
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self
                .handles
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if tokio::time::timeout(timeouts::SHUTDOWN_GRACE, handle)
                .await
                .is_err()
            {
                tracing::warn!("Worker did not drain within shutdown grace period");
            }
        }
    }
}
