use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use glyph_ledger::SubmitError;
use glyph_store::{BlobStore, FinalizeError, ReverifyError, WriteError};
use glyph_types::{Entry, LogicalId};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::RepairConfig;
use crate::error::{RepairError, RepairResult};
use crate::queue::{JobHandle, JobOutcome, RepairJob, WriteQueue};
use crate::report::{RepairReport, ScanFailure, StateChange};
use crate::source::PayloadSource;
use crate::state::EntryState;

/// Per-scan switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Rewrite healthy entries from the payload source.
    pub force: bool,
    /// Finalize every entry that is healthy at the end of the scan.
    pub finalize: bool,
}

/// What triage decided for one id.
enum Triage {
    Settled,
    Redrive(RepairJob),
    Unsourced,
}

/// Walks a namespace of logical ids and drives each toward `Healthy`.
///
/// Finalized entries are never touched. Healthy and write-failed entries are
/// re-verified against the ledger first, so records that arrived late are
/// promoted without a rewrite. Everything that still needs a write goes
/// through a [`WriteQueue`] and a bounded worker pool.
pub struct RepairScanner {
    store: Arc<BlobStore>,
    config: Arc<RepairConfig>,
    source: Option<Arc<dyn PayloadSource>>,
    active: Mutex<Vec<Arc<WriteQueue>>>,
}

impl RepairScanner {
    pub fn new(store: Arc<BlobStore>, config: RepairConfig) -> RepairResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            source: None,
            active: Mutex::new(Vec::new()),
        })
    }

    pub fn with_source(mut self, source: Arc<dyn PayloadSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Cancel the queued jobs of every scan in progress.
    ///
    /// Jobs already handed to a worker run to completion. Returns the number
    /// of jobs cancelled.
    pub fn cancel(&self) -> usize {
        self.active
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|queue| queue.cancel())
            .sum()
    }

    /// Scan every id the entry store knows about.
    pub async fn scan_all(&self, options: ScanOptions) -> RepairResult<RepairReport> {
        let ids = self.store.entries().ids()?;
        self.scan(&ids, options).await
    }

    /// Scan `ids`. Duplicates are scanned once.
    pub async fn scan(&self, ids: &[LogicalId], options: ScanOptions) -> RepairResult<RepairReport> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut report = RepairReport::begin();
        info!(scan_id = %report.scan_id, ids = ids.len(), force = options.force, finalize = options.finalize, "repair scan started");

        let queue = Arc::new(WriteQueue::new(self.config.max_batch, self.config.debounce));
        self.active
            .lock()
            .expect("lock poisoned")
            .push(Arc::clone(&queue));

        let mut initial = BTreeMap::new();
        let produce = async {
            let mut handles: Vec<JobHandle> = Vec::new();
            for id in &ids {
                let state = match self.store.entry(id) {
                    Ok(entry) => EntryState::classify(entry.as_ref()),
                    Err(e) => {
                        report.failures.push(failure(id, &e));
                        continue;
                    }
                };
                initial.insert(id.clone(), state);
                match self.triage(id, state, options).await {
                    Ok(Triage::Settled) => {}
                    Ok(Triage::Redrive(job)) => handles.push(queue.enqueue(job)),
                    Ok(Triage::Unsourced) => report.unsourced += 1,
                    Err(e) => report.failures.push(failure(id, &e)),
                }
            }
            queue.close();
            handles
        };
        let dispatch = dispatch(
            Arc::clone(&queue),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        );
        let (handles, ()) = tokio::join!(produce, dispatch);

        for handle in handles {
            let id = handle.logical_id().clone();
            match handle.outcome().await {
                Ok(outcome) => report.attempts += outcome.attempts,
                Err(RepairError::Cancelled) => report.cancelled += 1,
                Err(e) => report.failures.push(failure(&id, &e)),
            }
        }

        self.active
            .lock()
            .expect("lock poisoned")
            .retain(|q| !Arc::ptr_eq(q, &queue));

        if options.finalize && !queue.is_cancelled() {
            self.finalize_healthy(&ids, &mut report).await;
        }

        for (id, from) in initial {
            let to = match self.store.entry(&id) {
                Ok(entry) => EntryState::classify(entry.as_ref()),
                Err(e) => {
                    report.failures.push(failure(&id, &e));
                    from
                }
            };
            report.counts.record(to);
            if to != from {
                report.changes.push(StateChange {
                    logical_id: id,
                    from,
                    to,
                });
            }
        }

        report.finished_at = Utc::now();
        info!(scan_id = %report.scan_id, %report, "repair scan finished");
        Ok(report)
    }

    async fn triage(
        &self,
        id: &LogicalId,
        state: EntryState,
        options: ScanOptions,
    ) -> RepairResult<Triage> {
        match state {
            EntryState::Finalized => Ok(Triage::Settled),
            EntryState::Uninitialized => self.job_from_source(id, state).await,
            EntryState::Healthy => {
                let Some(entry) = self.reverify(id).await? else {
                    return Ok(Triage::Settled);
                };
                if !entry.healthy {
                    warn!(id = %id, "healthy entry no longer verifies; demoted");
                    self.job_from_source(id, EntryState::WriteFailed).await
                } else if options.force {
                    self.job_from_source(id, state).await
                } else {
                    Ok(Triage::Settled)
                }
            }
            EntryState::WriteFailed => {
                let Some(entry) = self.reverify(id).await? else {
                    return Ok(Triage::Settled);
                };
                if entry.healthy {
                    info!(id = %id, "late record found; promoted without rewrite");
                    Ok(Triage::Settled)
                } else {
                    self.job_from_source(id, state).await
                }
            }
        }
    }

    /// `None` if the entry was finalized since it was classified.
    async fn reverify(&self, id: &LogicalId) -> RepairResult<Option<Entry>> {
        match self.store.reverify(id).await {
            Ok(entry) => Ok(Some(entry)),
            Err(ReverifyError::Finalized(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn job_from_source(&self, id: &LogicalId, from: EntryState) -> RepairResult<Triage> {
        let Some(source) = &self.source else {
            return Ok(Triage::Unsourced);
        };
        match source.payload(id).await? {
            Some(payload) => Ok(Triage::Redrive(RepairJob {
                logical_id: id.clone(),
                payload,
                from,
            })),
            None => {
                debug!(id = %id, %from, "no payload available");
                Ok(Triage::Unsourced)
            }
        }
    }

    async fn finalize_healthy(&self, ids: &[LogicalId], report: &mut RepairReport) {
        for id in ids {
            match self.store.entry(id) {
                Ok(Some(entry)) if entry.healthy && !entry.finalized => {}
                Ok(_) => continue,
                Err(e) => {
                    report.failures.push(failure(id, &e));
                    continue;
                }
            }
            match self.store.finalize(id).await {
                Ok(()) => info!(id = %id, "finalized"),
                Err(FinalizeError::AlreadyFinalized(_)) => {}
                Err(e) => report.failures.push(failure(id, &e)),
            }
        }
    }
}

impl std::fmt::Debug for RepairScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairScanner")
            .field("config", &self.config)
            .field("has_source", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

fn failure(id: &LogicalId, error: &dyn std::fmt::Display) -> ScanFailure {
    ScanFailure {
        logical_id: id.clone(),
        error: error.to_string(),
    }
}

/// Drain `queue` into a worker pool of `config.workers` tasks.
///
/// Permits are taken before jobs leave the queue, so a job is either
/// running or still cancellable.
async fn dispatch(queue: Arc<WriteQueue>, store: Arc<BlobStore>, config: Arc<RepairConfig>) {
    let permits = Arc::new(Semaphore::new(config.workers));
    let mut workers = JoinSet::new();

    loop {
        let first = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "repair worker pool closed");
                queue.cancel();
                break;
            }
        };
        let mut free = vec![first];
        while free.len() < config.max_batch {
            match Arc::clone(&permits).try_acquire_owned() {
                Ok(permit) => free.push(permit),
                Err(_) => break,
            }
        }

        let Some(batch) = queue.next_batch_within(free.len()).await else {
            break;
        };
        for (queued, permit) in batch.into_iter().zip(free) {
            let store = Arc::clone(&store);
            let config = Arc::clone(&config);
            workers.spawn(async move {
                let _permit = permit;
                let (job, respond) = queued.into_parts();
                let outcome = redrive(&store, &config, job).await;
                let _ = respond.send(outcome);
            });
        }
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "repair worker failed");
        }
    }
}

/// Submit `job.payload` until it verifies or the attempt budget runs out.
async fn redrive(store: &BlobStore, config: &RepairConfig, job: RepairJob) -> RepairResult<JobOutcome> {
    let id = job.logical_id;
    let mut attempts = 0;

    for attempt in 0..config.max_attempts {
        let strategy = config.strategy_for(attempt, &id);
        let limit = config.limit_for(attempt);
        attempts += 1;

        match store
            .write_with_limit(&id, &job.payload, strategy, limit)
            .await
        {
            Ok(entry) if entry.healthy => {
                info!(id = %id, attempts, strategy = %strategy, limit = limit.units(), "repair write verified");
                return Ok(JobOutcome {
                    logical_id: id,
                    attempts,
                    healthy: true,
                });
            }
            Ok(_) => {
                debug!(id = %id, attempt, strategy = %strategy, "repair write unhealthy");
            }
            Err(WriteError::AlreadyFinalized(_)) => {
                info!(id = %id, "finalized during repair; job aborted");
                return Ok(JobOutcome {
                    logical_id: id,
                    attempts,
                    healthy: false,
                });
            }
            Err(e @ WriteError::SubmitFailed(SubmitError::RecordTooLarge { .. })) => {
                return Err(e.into());
            }
            Err(e) if e.is_retryable() => {
                debug!(id = %id, attempt, strategy = %strategy, limit = limit.units(), error = %e, "repair write failed");
            }
            Err(e) => return Err(e.into()),
        }

        if attempt + 1 < config.max_attempts {
            tokio::time::sleep(config.backoff_for(attempt)).await;
        }
    }

    warn!(id = %id, attempts, from = %job.from, "repair budget exhausted");
    Ok(JobOutcome {
        logical_id: id,
        attempts,
        healthy: false,
    })
}
