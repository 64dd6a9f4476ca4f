//! The approval store: the map of open approvals.
//!
//! This is the only shared mutable state in the core. One exclusive lock
//! serializes every reader and writer (the watcher's upserts and the
//! HTTP-triggered resolutions), and it is held across the chat round-trips an
//! operation performs, so the at-most-one-open-notification-per-job invariant
//! holds even under rapid re-registration.
//!
//! Entries live until a decision resolves them or the process restarts; there
//! is no timeout and no persistence.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::notify::render_notification;
use crate::scheduler::PlanApi;
use crate::slack::ChatApi;
use crate::types::{ChannelId, Job, JobId, NotificationHandle};

/// One unit of outstanding work: a captured job snapshot plus the handle of
/// its live notification.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub job: Job,
    pub handle: NotificationHandle,
}

/// Map of job id to open approval, guarded by a single exclusive lock.
pub struct ApprovalStore<C, P> {
    chat: C,
    planner: P,
    channel: ChannelId,
    pending: Mutex<HashMap<JobId, PendingApproval>>,
}

impl<C, P> ApprovalStore<C, P>
where
    C: ChatApi,
    P: PlanApi,
{
    pub fn new(chat: C, planner: P, channel: ChannelId) -> Self {
        ApprovalStore {
            chat,
            planner,
            channel,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Opens (or replaces) the approval for a job registration.
    ///
    /// If an approval is already open for this job id, its notification is
    /// deleted best-effort before the new one is posted; a failed delete is
    /// logged, not propagated. A failed post is the caller's problem: it
    /// means the pipeline can no longer notify anyone.
    pub async fn upsert(&self, job: Job) -> Result<(), C::Error> {
        let mut pending = self.pending.lock().await;

        if let Some(previous) = pending.remove(&job.id) {
            debug!(job = %job.id, superseded = %previous.handle, "replacing open approval");
            if let Err(error) = self.chat.delete_message(&previous.handle).await {
                warn!(job = %job.id, %error, "failed to delete superseded notification");
            }
        }

        // Advisory only: a plan failure just means no diff fields.
        let diff = match self.planner.plan_diff(&job).await {
            Ok(diff) => diff,
            Err(error) => {
                debug!(job = %job.id, %error, "no predicted diff available");
                None
            }
        };

        let attachments = render_notification(&job, diff.as_ref());
        let handle = self.chat.post_message(&self.channel, attachments).await?;
        info!(job = %job.id, notification = %handle, "posted approval notification");

        pending.insert(job.id.clone(), PendingApproval { job, handle });
        Ok(())
    }

    /// Removes and returns the open approval for `id`.
    ///
    /// `None` is a normal race (duplicate callback, superseded registration,
    /// restart), not an error.
    pub async fn resolve(&self, id: &JobId) -> Option<PendingApproval> {
        self.pending.lock().await.remove(id)
    }

    /// Whether an approval is currently open for `id`.
    pub async fn is_pending(&self, id: &JobId) -> bool {
        self.pending.lock().await.contains_key(id)
    }

    /// Number of currently open approvals.
    pub async fn open_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl<C, P> crate::watcher::ApprovalSink for ApprovalStore<C, P>
where
    C: ChatApi + Send + Sync,
    P: PlanApi + Send + Sync,
{
    type Error = C::Error;

    async fn upsert(&self, job: Job) -> Result<(), C::Error> {
        ApprovalStore::upsert(self, job).await
    }
}

impl<C, P> std::fmt::Debug for ApprovalStore<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalStore")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
