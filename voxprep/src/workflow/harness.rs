//! Shared batch execution harness
//!
//! Both pipelines hand a fully built job list to [`BatchHarness::run`], which
//! drives it through a bounded worker pool:
//! - `workers` jobs in flight at once via `buffer_unordered` (1 = the
//!   sequential baseline),
//! - an atomic `completed` counter feeding `ItemFinished` progress events,
//! - the cancellation token checked before each dispatch; jobs never started
//!   stay pending and are counted as not dispatched.
//!
//! Results are returned in the original job order regardless of completion
//! order.

use crate::models::BatchJob;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use voxprep_common::{BatchEvent, BatchKind, BatchReporter, BatchSummary, OutcomeKind};

/// Per-run state handed to every engine
#[derive(Clone)]
pub struct BatchContext {
    pub run_id: Uuid,
    pub reporter: Arc<dyn BatchReporter>,
    pub cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(reporter: Arc<dyn BatchReporter>, cancel: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            reporter,
            cancel,
        }
    }

    pub fn report(&self, event: BatchEvent) {
        self.reporter.report(event);
    }
}

/// Jobs in original order plus the counts derived from them
#[derive(Debug)]
pub struct BatchReport<J> {
    pub kind: BatchKind,
    pub jobs: Vec<J>,
    pub summary: BatchSummary,
}

/// Bounded worker pool over an explicit job list
#[derive(Clone)]
pub struct BatchHarness {
    workers: usize,
    ctx: BatchContext,
}

impl BatchHarness {
    pub fn new(workers: usize, ctx: BatchContext) -> Self {
        Self {
            workers: workers.max(1),
            ctx,
        }
    }

    pub fn context(&self) -> &BatchContext {
        &self.ctx
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every job through `process`, at most `workers` at a time
    pub async fn run<J, F, Fut>(&self, kind: BatchKind, jobs: Vec<J>, process: F) -> BatchReport<J>
    where
        J: BatchJob,
        F: Fn(J) -> Fut,
        Fut: Future<Output = J>,
    {
        let total = jobs.len();
        let run_id = self.ctx.run_id;

        tracing::info!(
            run_id = %run_id,
            batch = %kind,
            total,
            workers = self.workers,
            "Batch started"
        );
        self.ctx.report(BatchEvent::BatchStarted {
            run_id,
            kind,
            total,
            timestamp: chrono::Utc::now(),
        });

        // Thread-safe progress counter
        let completed = AtomicUsize::new(0);
        let completed = &completed;
        let process = &process;
        let ctx = &self.ctx;

        let mut finished: Vec<(usize, J)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move {
                // Stop dispatching once cancelled; in-flight jobs run on
                if ctx.cancel.is_cancelled() {
                    return (index, job);
                }

                let item = job.label();
                ctx.report(BatchEvent::ItemStarted {
                    run_id,
                    index,
                    total,
                    item: item.clone(),
                    timestamp: chrono::Utc::now(),
                });

                let job = process(job).await;

                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let outcome = job.outcome();
                ctx.report(BatchEvent::ItemFinished {
                    run_id,
                    item,
                    outcome: outcome
                        .as_ref()
                        .map(|o| o.kind())
                        .unwrap_or(OutcomeKind::NotDispatched),
                    detail: outcome.as_ref().and_then(|o| o.detail()),
                    completed: current,
                    total,
                    timestamp: chrono::Utc::now(),
                });

                (index, job)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        finished.sort_by_key(|(index, _)| *index);
        let jobs: Vec<J> = finished.into_iter().map(|(_, job)| job).collect();

        let mut summary = BatchSummary::default();
        for job in &jobs {
            let outcome = job.outcome();
            summary.record(
                &job.label(),
                outcome
                    .as_ref()
                    .map(|o| o.kind())
                    .unwrap_or(OutcomeKind::NotDispatched),
                outcome.and_then(|o| o.detail()),
            );
        }
        summary.cancelled = self.ctx.cancel.is_cancelled();

        tracing::info!(
            run_id = %run_id,
            batch = %kind,
            total,
            succeeded = summary.succeeded,
            attempted = summary.attempted,
            failed = summary.failed,
            not_dispatched = summary.not_dispatched,
            "Batch finished"
        );
        self.ctx.report(BatchEvent::BatchFinished {
            run_id,
            kind,
            summary: summary.clone(),
            timestamp: chrono::Utc::now(),
        });

        BatchReport {
            kind,
            jobs,
            summary,
        }
    }
}
