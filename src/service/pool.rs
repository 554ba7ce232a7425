//! Bounded worker pool
//!
//! A fixed set of named threads pulls jobs from a bounded queue. Submitting
//! to a full queue fails immediately with `ResourceExhausted` instead of
//! piling up work. Each job answers through its own oneshot channel.
//!
//! ```text
//! ┌──────────┐  try_send   ┌──────────────┐  recv   ┌──────────────┐
//! │  caller  │ ──────────► │ bounded queue│ ──────► │ lofi-worker-N│
//! │          │ ◄────────── │  (capacity)  │         │  (pipeline)  │
//! └──────────┘   oneshot   └──────────────┘         └──────────────┘
//! ```
//!
//! Dropping a `PendingJob` cancels it: the worker notices the closed reply
//! channel before the next stage and drops the intermediate buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use tokio::sync::oneshot;

use crate::dsp::{LofiPipeline, LofiSettings};
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

// ============================================================================
// Jobs
// ============================================================================

/// One pipeline invocation waiting for a worker
struct Job {
    id: u64,
    buffer: AudioBuffer,
    settings: LofiSettings,
    reply: oneshot::Sender<Result<AudioBuffer>>,
}

/// Handle to a submitted job
///
/// Dropping it without waiting cancels the job.
#[derive(Debug)]
pub struct PendingJob {
    id: u64,
    receiver: oneshot::Receiver<Result<AudioBuffer>>,
}

impl PendingJob {
    /// Wait for the result from async code
    pub async fn wait(self) -> Result<AudioBuffer> {
        let id = self.id;
        self.receiver.await.unwrap_or_else(|_| Err(worker_lost(id)))
    }

    /// Wait for the result from synchronous code
    ///
    /// # Panics
    /// Panics when called from inside an async runtime; use `wait` there.
    pub fn wait_blocking(self) -> Result<AudioBuffer> {
        let id = self.id;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(worker_lost(id)))
    }
}

fn worker_lost(id: u64) -> LofiError {
    LofiError::stage("worker_pool", format!("job {} ended without a result", id))
}

// ============================================================================
// Pool
// ============================================================================

/// Fixed-size pool running `LofiPipeline` jobs
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl WorkerPool {
    /// Spawn `worker_count` workers behind a queue of `queue_capacity` jobs
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self> {
        Self::with_pipeline(LofiPipeline::new(), worker_count, queue_capacity)
    }

    /// Spawn workers sharing a custom pipeline
    ///
    /// # Errors
    /// * `Config` - if either size is zero
    /// * `Io` - if a worker thread cannot be spawned
    pub fn with_pipeline(
        pipeline: LofiPipeline,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Result<Self> {
        if worker_count == 0 || queue_capacity == 0 {
            return Err(LofiError::Config {
                reason: format!(
                    "worker pool needs at least one worker and one queue slot (got {} and {})",
                    worker_count, queue_capacity
                ),
            });
        }

        let (sender, receiver) = channel::bounded::<Job>(queue_capacity);
        let pipeline = Arc::new(pipeline);

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(worker_count),
            capacity: queue_capacity,
            next_id: AtomicU64::new(0),
        };

        for index in 0..worker_count {
            let receiver = receiver.clone();
            let pipeline = Arc::clone(&pipeline);
            let handle = thread::Builder::new()
                .name(format!("lofi-worker-{}", index))
                .spawn(move || Self::run(index, pipeline, receiver))?;
            pool.workers.push(handle);
        }

        info!(
            "Worker pool started: {} workers, queue capacity {}",
            worker_count, queue_capacity
        );

        Ok(pool)
    }

    /// Worker loop
    fn run(index: usize, pipeline: Arc<LofiPipeline>, receiver: Receiver<Job>) {
        debug!("lofi-worker-{} started", index);

        while let Ok(job) = receiver.recv() {
            let Job {
                id,
                buffer,
                settings,
                reply,
            } = job;

            if reply.is_closed() {
                debug!("job {} abandoned before it started", id);
                continue;
            }

            debug!("lofi-worker-{} running job {}", index, id);
            let result = pipeline.process_until(buffer, &settings, || reply.is_closed());

            match &result {
                Err(LofiError::Cancelled) => debug!("job {} cancelled", id),
                Err(e) => warn!("job {} failed: {}", id, e),
                Ok(_) => debug!("job {} finished", id),
            }

            // The caller may have gone away; nothing to do then
            let _ = reply.send(result);
        }

        debug!("lofi-worker-{} stopped", index);
    }

    /// Queue a job
    ///
    /// # Errors
    /// `ResourceExhausted` if the queue is full or the pool is shutting down.
    pub fn submit(&self, buffer: AudioBuffer, settings: LofiSettings) -> Result<PendingJob> {
        let sender = self.sender.as_ref().ok_or_else(|| LofiError::ResourceExhausted {
            details: "worker pool is shut down".to_string(),
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            id,
            buffer,
            settings,
            reply,
        };

        match sender.try_send(job) {
            Ok(()) => Ok(PendingJob { id, receiver }),
            Err(TrySendError::Full(_)) => {
                warn!("Rejecting job {}: queue full ({} waiting)", id, self.capacity);
                Err(LofiError::ResourceExhausted {
                    details: format!("processing queue is full ({} jobs waiting)", self.capacity),
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(LofiError::ResourceExhausted {
                details: "all workers have stopped".to_string(),
            }),
        }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Maximum number of queued jobs
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop once it drains
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("A worker thread panicked");
            }
        }
        info!("Worker pool stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
