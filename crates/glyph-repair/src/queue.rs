use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use glyph_types::LogicalId;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{RepairError, RepairResult};
use crate::state::EntryState;

/// A payload to re-drive for one logical id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepairJob {
    pub logical_id: LogicalId,
    pub payload: Vec<u8>,
    /// Classification when the job was queued.
    pub from: EntryState,
}

/// What a dispatched job did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub logical_id: LogicalId,
    /// Submissions made, including failed ones.
    pub attempts: u32,
    pub healthy: bool,
}

/// A job taken off the queue, with the channel its submitter is waiting on.
#[derive(Debug)]
pub struct QueuedJob {
    job: RepairJob,
    respond: oneshot::Sender<RepairResult<JobOutcome>>,
}

impl QueuedJob {
    pub fn job(&self) -> &RepairJob {
        &self.job
    }

    /// Deliver the outcome to the submitter.
    pub fn respond(self, outcome: RepairResult<JobOutcome>) {
        let _ = self.respond.send(outcome);
    }

    pub fn into_parts(self) -> (RepairJob, oneshot::Sender<RepairResult<JobOutcome>>) {
        (self.job, self.respond)
    }
}

/// Receiving end of an enqueued job.
#[derive(Debug)]
pub struct JobHandle {
    logical_id: LogicalId,
    rx: oneshot::Receiver<RepairResult<JobOutcome>>,
}

impl JobHandle {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub async fn outcome(self) -> RepairResult<JobOutcome> {
        self.rx.await.unwrap_or_else(|_| {
            Err(RepairError::Worker(format!(
                "job for {} dropped before completion",
                self.logical_id
            )))
        })
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedJob>,
    closed: bool,
    cancelled: bool,
}

/// Debounced batch queue for repair jobs.
///
/// A single consumer calls [`next_batch`](Self::next_batch), which waits for
/// the first job and then holds the batch open for the debounce window or
/// until it reaches `max_batch` jobs. Jobs still queued when
/// [`cancel`](Self::cancel) is called fail with [`RepairError::Cancelled`]
/// and are never dispatched.
pub struct WriteQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    max_batch: usize,
    debounce: Duration,
}

impl WriteQueue {
    pub fn new(max_batch: usize, debounce: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            max_batch: max_batch.max(1),
            debounce,
        }
    }

    pub fn enqueue(&self, job: RepairJob) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let handle = JobHandle {
            logical_id: job.logical_id.clone(),
            rx,
        };
        let queued = QueuedJob { job, respond: tx };

        let mut state = self.state.lock().expect("lock poisoned");
        if state.closed || state.cancelled {
            drop(state);
            queued.respond(Err(RepairError::Cancelled));
            return handle;
        }
        state.pending.push_back(queued);
        drop(state);
        self.wake.notify_one();
        handle
    }

    /// No further jobs will be accepted. Queued jobs are still dispatched.
    pub fn close(&self) {
        self.state.lock().expect("lock poisoned").closed = true;
        self.wake.notify_one();
    }

    /// Fail every queued job with [`RepairError::Cancelled`] and stop
    /// dispatching. Returns how many jobs were cancelled.
    pub fn cancel(&self) -> usize {
        let drained: Vec<QueuedJob> = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.cancelled = true;
            state.closed = true;
            state.pending.drain(..).collect()
        };
        let count = drained.len();
        for queued in drained {
            queued.respond(Err(RepairError::Cancelled));
        }
        self.wake.notify_one();
        if count > 0 {
            info!(count, "cancelled queued repair jobs");
        }
        count
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().expect("lock poisoned").cancelled
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next batch to dispatch, or `None` once the queue is closed and
    /// drained, or cancelled.
    pub async fn next_batch(&self) -> Option<Vec<QueuedJob>> {
        self.next_batch_within(self.max_batch).await
    }

    /// Like [`next_batch`](Self::next_batch), but takes at most `limit` jobs.
    ///
    /// The dispatcher passes the number of free workers, so every job that
    /// leaves the queue starts immediately and everything still waiting
    /// stays reachable by [`cancel`](Self::cancel).
    pub async fn next_batch_within(&self, limit: usize) -> Option<Vec<QueuedJob>> {
        let cap = limit.clamp(1, self.max_batch);
        loop {
            loop {
                {
                    let state = self.state.lock().expect("lock poisoned");
                    if state.cancelled {
                        return None;
                    }
                    if !state.pending.is_empty() {
                        break;
                    }
                    if state.closed {
                        return None;
                    }
                }
                self.wake.notified().await;
            }

            let deadline = Instant::now() + self.debounce;
            loop {
                {
                    let state = self.state.lock().expect("lock poisoned");
                    if state.cancelled {
                        return None;
                    }
                    if state.pending.len() >= cap {
                        break;
                    }
                }
                if tokio::time::timeout_at(deadline, self.wake.notified())
                    .await
                    .is_err()
                {
                    break;
                }
            }

            let mut state = self.state.lock().expect("lock poisoned");
            if state.cancelled {
                return None;
            }
            let take = state.pending.len().min(cap);
            if take == 0 {
                continue;
            }
            let batch: Vec<QueuedJob> = state.pending.drain(..take).collect();
            debug!(size = batch.len(), remaining = state.pending.len(), "dispatching repair batch");
            return Some(batch);
        }
    }
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("pending", &self.len())
            .field("max_batch", &self.max_batch)
            .field("debounce", &self.debounce)
            .finish()
    }
}
