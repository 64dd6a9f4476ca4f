//! The event watcher: sequential consumer of the scheduler's job feed.
//!
//! One task owns the subscription and processes batches strictly in order -
//! no reordering, no batch overlap. Per batch:
//!
//! 1. Heartbeats are ignored.
//! 2. Transport errors are logged and the loop continues.
//! 3. Only `JobRegistered` events are considered.
//! 4. Events are grouped by job id within the batch, keeping the most recent
//!    parsed job per id (the scheduler's insertion path can emit two
//!    registration events for one logical registration).
//! 5. Candidates that don't qualify for approval are dropped with a
//!    diagnostic log entry; that is normal filtering, not a fault.
//! 6. Each qualifying candidate is handed to the sink. A sink failure is
//!    unrecoverable for this run and terminates the watcher.
//!
//! Cancellation is cooperative: the token is observed between batches, and an
//! in-flight batch finishes before the loop exits.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::scheduler::stream::{EVENT_JOB_REGISTERED, EventBatch, EventSource};
use crate::scheduler::{NomadClient, SchedulerError};
use crate::types::{Job, JobId, PENDING_VERSION, STATUS_AWAITING_APPROVAL};


/// Receives qualifying job registrations from the watcher.
///
/// The production sink is the approval store's upsert; tests substitute
/// recording doubles.
pub trait ApprovalSink {
    /// The error type returned by this sink.
    type Error: fmt::Display + Send;

    /// Opens (or replaces) the approval for a qualifying registration.
    fn upsert(&self, job: Job) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Terminal watcher outcomes. Everything here ends the run; per-batch
/// problems are logged inside the loop instead.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The startup query for the stream resume position failed. Fatal to the
    /// process.
    #[error("failed to query stream resume index: {0}")]
    ResumeIndex(#[source] SchedulerError),

    /// The subscription could not be opened.
    #[error("failed to open event subscription: {0}")]
    Subscribe(#[source] SchedulerError),

    /// The subscription ended without being cancelled.
    #[error("event stream ended unexpectedly")]
    StreamClosed,

    /// The approval pipeline can no longer make progress.
    #[error("approval sink failed: {0}")]
    Sink(String),
}

/// Watches the scheduler's job events for registrations awaiting this
/// process's approval.
pub struct EventWatcher {
    scheduler: NomadClient,
    approver_id: String,
}

impl EventWatcher {
    pub fn new(scheduler: NomadClient, approver_id: impl Into<String>) -> Self {
        EventWatcher {
            scheduler,
            approver_id: approver_id.into(),
        }
    }

    /// Runs until cancelled or a terminal error occurs.
    ///
    /// The resume position is the scheduler's current index at startup, so
    /// only registrations from now on are observed.
    pub async fn subscribe<K>(
        &self,
        cancel: CancellationToken,
        sink: &K,
    ) -> Result<(), WatcherError>
    where
        K: ApprovalSink + Sync,
    {
        let index = self
            .scheduler
            .current_index()
            .await
            .map_err(WatcherError::ResumeIndex)?;
        info!(index, approver = %self.approver_id, "subscribing to job events");

        let mut source = self
            .scheduler
            .subscribe(index)
            .await
            .map_err(WatcherError::Subscribe)?;

        run_loop(&mut source, &self.approver_id, &cancel, sink).await
    }
}

/// The batch loop, generic over the event source so tests can script one.
pub(crate) async fn run_loop<S, K>(
    source: &mut S,
    approver_id: &str,
    cancel: &CancellationToken,
    sink: &K,
) -> Result<(), WatcherError>
where
    S: EventSource,
    K: ApprovalSink + Sync,
{
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancellation requested, stopping watcher");
                return Ok(());
            }
            next = source.next_batch() => match next {
                None => return Err(WatcherError::StreamClosed),
                Some(Err(error)) => {
                    warn!(%error, "transport error on event batch");
                    continue;
                }
                Some(Ok(batch)) => batch,
            },
        };

        if batch.is_heartbeat() {
            continue;
        }

        // Order across distinct job ids is not guaranteed, and doesn't need
        // to be: each candidate is independent.
        for (id, job) in dedupe_registrations(&batch) {
            if let Err(reason) = qualify(&job, approver_id) {
                info!(job = %id, %reason, "skipping registration");
                continue;
            }
            if let Err(error) = sink.upsert(job).await {
                error!(job = %id, %error, "approval sink failed, stopping watcher");
                return Err(WatcherError::Sink(error.to_string()));
            }
        }
    }
}

/// Collapses a batch's registration events to at most one parsed candidate
/// per job id, keeping the most recent.
pub(crate) fn dedupe_registrations(batch: &EventBatch) -> HashMap<JobId, Job> {
    let mut candidates = HashMap::new();

    for event in &batch.events {
        if event.event_type != EVENT_JOB_REGISTERED {
            continue;
        }
        let Some(payload) = &event.job else {
            error!(index = batch.index, "registration event without a job payload");
            continue;
        };
        match Job::from_value(payload.clone()) {
            Ok(job) => {
                candidates.insert(job.id.clone(), job);
            }
            Err(error) => {
                error!(index = batch.index, %error, "failed to parse job payload");
            }
        }
    }

    candidates
}

/// Why a candidate did not qualify for notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Disqualification {
    NotPendingVersion(Option<u64>),
    NoApprovers,
    NotAwaitingApproval(Option<String>),
    NotNextApprover(String),
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::NotPendingVersion(version) => {
                write!(f, "version {version:?} is not the pending sentinel")
            }
            Disqualification::NoApprovers => write!(f, "job does not need approval"),
            Disqualification::NotAwaitingApproval(status) => {
                write!(f, "status {status:?} is not awaiting approval")
            }
            Disqualification::NotNextApprover(next) => {
                write!(f, "next approver is {next}")
            }
        }
    }
}

/// A candidate qualifies only if it carries the pending-version sentinel, has
/// a non-empty approver chain, is awaiting approval, and names this process's
/// identity as the next approver.
pub(crate) fn qualify(job: &Job, approver_id: &str) -> Result<(), Disqualification> {
    if job.version != Some(PENDING_VERSION) {
        return Err(Disqualification::NotPendingVersion(job.version));
    }
    let Some(next) = job.approvers.first() else {
        return Err(Disqualification::NoApprovers);
    };
    if job.status.as_deref() != Some(STATUS_AWAITING_APPROVAL) {
        return Err(Disqualification::NotAwaitingApproval(job.status.clone()));
    }
    if next != approver_id {
        return Err(Disqualification::NotNextApprover(next.clone()));
    }
    Ok(())
}
