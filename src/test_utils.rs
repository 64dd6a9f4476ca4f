//! Shared test doubles and fixture builders.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::scheduler::{JobRegistry, RegisterOptions};
use crate::slack::ChatApi;
use crate::slack::types::Attachment;
use crate::types::{ChannelId, Job, NotificationHandle};

/// A qualifying job registration payload: pending version, awaiting-approval
/// status, `approver` first in the chain, one container task.
pub fn pending_job_value(id: &str, approver: &str) -> serde_json::Value {
    serde_json::json!({
        "ID": id,
        "Name": id,
        "Version": 1000,
        "Status": "awaiting-approval",
        "Approvers": [approver],
        "TaskGroups": [
            {
                "Name": id,
                "Tasks": [
                    {"Name": "main", "Driver": "docker", "Config": {"image": "nginx:1.25"}}
                ]
            }
        ]
    })
}

/// A qualifying parsed job snapshot.
pub fn pending_job(id: &str, approver: &str) -> Job {
    Job::from_value(pending_job_value(id, approver)).unwrap()
}

/// One call observed by [`MockChat`].
#[derive(Debug, Clone)]
pub enum ChatCall {
    Post {
        channel: ChannelId,
        attachments: Vec<Attachment>,
    },
    Update {
        handle: NotificationHandle,
        attachments: Vec<Attachment>,
    },
    Delete {
        handle: NotificationHandle,
    },
}

#[derive(Debug, Error)]
#[error("mock chat failure")]
pub struct MockChatError;

/// Recording chat double. Calls are recorded even when configured to fail,
/// so tests can assert on attempt order.
#[derive(Clone, Default)]
pub struct MockChat {
    calls: Arc<Mutex<Vec<ChatCall>>>,
    next_ts: Arc<AtomicU64>,
    fail_post: Arc<AtomicBool>,
    fail_update: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl MockChat {
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_posts(&self) {
        self.fail_post.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Handles of update calls, in order.
    pub fn updated_handles(&self) -> Vec<NotificationHandle> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::Update { handle, .. } => Some(handle),
                _ => None,
            })
            .collect()
    }
}

impl ChatApi for MockChat {
    type Error = MockChatError;

    async fn post_message(
        &self,
        channel: &ChannelId,
        attachments: Vec<Attachment>,
    ) -> Result<NotificationHandle, MockChatError> {
        self.calls.lock().unwrap().push(ChatCall::Post {
            channel: channel.clone(),
            attachments,
        });
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(MockChatError);
        }
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst);
        Ok(NotificationHandle::new(
            channel.clone(),
            format!("1700000000.{n:06}"),
        ))
    }

    async fn update_message(
        &self,
        handle: &NotificationHandle,
        attachments: Vec<Attachment>,
    ) -> Result<(), MockChatError> {
        self.calls.lock().unwrap().push(ChatCall::Update {
            handle: handle.clone(),
            attachments,
        });
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(MockChatError);
        }
        Ok(())
    }

    async fn delete_message(&self, handle: &NotificationHandle) -> Result<(), MockChatError> {
        self.calls.lock().unwrap().push(ChatCall::Delete {
            handle: handle.clone(),
        });
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(MockChatError);
        }
        Ok(())
    }
}

/// One call observed by [`MockRegistry`].
#[derive(Debug, Clone)]
pub struct RegisterCall {
    pub job: Job,
    pub options: RegisterOptions,
}

#[derive(Debug, Error)]
#[error("mock registry failure")]
pub struct MockRegistryError;

/// Recording scheduler double.
#[derive(Clone, Default)]
pub struct MockRegistry {
    calls: Arc<Mutex<Vec<RegisterCall>>>,
    fail: Arc<AtomicBool>,
}

impl MockRegistry {
    pub fn calls(&self) -> Vec<RegisterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_registrations(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl JobRegistry for MockRegistry {
    type Error = MockRegistryError;

    async fn register(
        &self,
        job: &Job,
        options: RegisterOptions,
    ) -> Result<(), MockRegistryError> {
        self.calls.lock().unwrap().push(RegisterCall {
            job: job.clone(),
            options,
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(MockRegistryError);
        }
        Ok(())
    }
}
