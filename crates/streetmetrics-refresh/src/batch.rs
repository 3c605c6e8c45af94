//! Failure-isolated batch refresh over many districts.

use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{DistrictId, RefreshLogEntry, RefreshOperation};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;
use uuid::Uuid;

use crate::orchestrator::{DistrictReport, RefreshOrchestrator};

/// Result of refreshing one district within a batch
#[derive(Debug)]
pub struct DistrictOutcome {
    pub district_id: DistrictId,
    pub result: Result<DistrictReport>,
}

/// Summary of a completed batch
#[derive(Debug)]
pub struct BatchSummary {
    pub run_id: Uuid,

    /// Districts queued for this batch
    pub total: usize,

    /// Successful refreshes, in district id order
    pub succeeded: Vec<DistrictReport>,

    /// Failed refreshes, in district id order
    pub failed: Vec<(DistrictId, StreetmetricsError)>,

    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

type WorkQueue = Arc<Mutex<VecDeque<DistrictId>>>;

impl RefreshOrchestrator {
    /// Refresh every active district.
    ///
    /// Per-district failures are recorded and never stop the batch. A store
    /// outage stops it: queued districts are not started and the batch
    /// returns `StoreUnavailable`.
    pub async fn refresh_all(self: &Arc<Self>) -> Result<BatchSummary> {
        let districts = self.store().list_active_districts().await?;
        let ids = districts.iter().map(|d| d.id).collect();
        self.refresh_batch(Uuid::new_v4(), ids).await
    }

    /// Refresh the given districts as one batch run
    pub async fn refresh_batch(
        self: &Arc<Self>,
        run_id: Uuid,
        mut district_ids: Vec<DistrictId>,
    ) -> Result<BatchSummary> {
        let started = Instant::now();
        district_ids.sort();
        district_ids.dedup();

        let total = district_ids.len();
        let workers = self.settings().workers.clamp(1, total.max(1));
        let queue: WorkQueue = Arc::new(Mutex::new(district_ids.into_iter().collect()));
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();

        tracing::info!(run_id = %run_id, districts = total, workers, "Starting batch refresh");

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let orchestrator = Arc::clone(self);
                let queue = Arc::clone(&queue);
                let abort = Arc::clone(&abort);
                let tx = tx.clone();
                tokio::spawn(async move {
                    orchestrator.drain_queue(worker, run_id, queue, abort, tx).await
                })
            })
            .collect();
        drop(tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        for joined in join_all(handles).await {
            if let Err(err) = joined {
                tracing::error!(run_id = %run_id, error = %err, "Batch worker terminated");
            }
        }

        outcomes.sort_by_key(|o: &DistrictOutcome| o.district_id);
        let mut summary = BatchSummary {
            run_id,
            total,
            succeeded: Vec::new(),
            failed: Vec::new(),
            elapsed: started.elapsed(),
        };
        for outcome in outcomes {
            match outcome.result {
                Ok(report) => summary.succeeded.push(report),
                Err(err) => summary.failed.push((outcome.district_id, err)),
            }
        }

        if abort.load(Ordering::SeqCst) {
            let not_started = queue.lock().await.len();
            let reason = format!(
                "store unavailable; {} of {} districts not started",
                not_started, total
            );
            tracing::error!(
                target: "streetmetrics::infra",
                run_id = %run_id,
                succeeded = summary.success_count(),
                failed = summary.failure_count(),
                not_started,
                "Batch refresh aborted"
            );
            self.record(RefreshLogEntry::failure(
                run_id,
                None,
                RefreshOperation::BatchAborted,
                reason.clone(),
                summary.elapsed,
            ))
            .await;
            return Err(StreetmetricsError::StoreUnavailable(reason));
        }

        tracing::info!(
            run_id = %run_id,
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch refresh complete"
        );
        Ok(summary)
    }

    async fn drain_queue(
        self: Arc<Self>,
        worker: usize,
        run_id: Uuid,
        queue: WorkQueue,
        abort: Arc<AtomicBool>,
        tx: mpsc::UnboundedSender<DistrictOutcome>,
    ) {
        loop {
            if abort.load(Ordering::SeqCst) {
                break;
            }
            let Some(district_id) = queue.lock().await.pop_front() else {
                break;
            };
            tracing::debug!(worker, district_id = %district_id, "Worker picked up district");

            let orchestrator = Arc::clone(&self);
            let task = tokio::spawn(async move {
                orchestrator.refresh_in_run(run_id, district_id).await
            });

            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(self.task_failure(run_id, district_id, join_err).await),
            };

            if matches!(&result, Err(err) if err.is_infrastructure()) {
                abort.store(true, Ordering::SeqCst);
            }
            if tx.send(DistrictOutcome { district_id, result }).is_err() {
                break;
            }
        }
    }

    /// Turn a panicked or cancelled refresh task into a district failure
    async fn task_failure(
        &self,
        run_id: Uuid,
        district_id: DistrictId,
        join_err: JoinError,
    ) -> StreetmetricsError {
        let reason = if join_err.is_panic() {
            let payload = join_err.into_panic();
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "refresh task panicked".to_string())
        } else {
            "refresh task cancelled".to_string()
        };

        tracing::error!(
            district_id = %district_id,
            run_id = %run_id,
            reason = %reason,
            "Refresh task failed"
        );
        let err = StreetmetricsError::compute("refresh", reason);
        self.record(RefreshLogEntry::failure(
            run_id,
            Some(district_id),
            RefreshOperation::RefreshError,
            err.to_string(),
            Duration::ZERO,
        ))
        .await;
        err
    }
}
