//! Decision processing for inbound interaction callbacks.
//!
//! Each callback runs the same short state machine: validate the shape,
//! resolve the open approval, apply the decision to the scheduler, rewrite
//! the notification. Failures are logged and terminal for that callback only;
//! nothing is raised to the HTTP layer and nothing rolls back.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::notify::{ACTION_APPROVE, ACTION_DENY, render_outcome};
use crate::scheduler::{Admission, JobRegistry, PlanApi, RegisterOptions};
use crate::slack::ChatApi;
use crate::slack::types::InteractionCallback;
use crate::store::ApprovalStore;
use crate::types::{APPROVER_META_KEY, JobId};

/// A validated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => ACTION_APPROVE,
            Decision::Deny => ACTION_DENY,
        }
    }

    fn from_action(name: &str) -> Option<Decision> {
        match name {
            ACTION_APPROVE => Some(Decision::Approve),
            ACTION_DENY => Some(Decision::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a callback was rejected without any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CallbackRejection {
    #[error("expected exactly one action, got {0}")]
    ActionCount(usize),

    #[error("unrecognized action {0:?}")]
    UnknownAction(String),
}

/// Shape validation: exactly one interactive action, with a known name.
pub(crate) fn validate(callback: &InteractionCallback) -> Result<Decision, CallbackRejection> {
    if callback.actions.len() != 1 {
        return Err(CallbackRejection::ActionCount(callback.actions.len()));
    }
    let name = &callback.actions[0].name;
    Decision::from_action(name).ok_or_else(|| CallbackRejection::UnknownAction(name.clone()))
}

/// Applies decisions: scheduler first, then the notification, with the store
/// entry removed in between.
pub struct DecisionProcessor<R, C, P> {
    store: Arc<ApprovalStore<C, P>>,
    registry: R,
    chat: C,
    admission_secret: String,
    ui_base_url: Option<String>,
}

impl<R, C, P> DecisionProcessor<R, C, P>
where
    R: JobRegistry,
    C: ChatApi,
    P: PlanApi,
{
    pub fn new(
        store: Arc<ApprovalStore<C, P>>,
        registry: R,
        chat: C,
        admission_secret: impl Into<String>,
    ) -> Self {
        DecisionProcessor {
            store,
            registry,
            chat,
            admission_secret: admission_secret.into(),
            ui_base_url: None,
        }
    }

    /// Links decided notifications to the job in the scheduler UI at
    /// `base_url`.
    pub fn with_job_links(mut self, base_url: impl Into<String>) -> Self {
        self.ui_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn job_link(&self, id: &JobId) -> Option<String> {
        self.ui_base_url
            .as_ref()
            .map(|base| format!("{base}/ui/jobs/{id}"))
    }

    /// Handles one decision callback to completion. Side effects only.
    ///
    /// Ordering for a well-formed callback: store entry removed, scheduler
    /// state changed, notification updated - with no rollback between them.
    /// A scheduler failure after the removal drops the decision; the operator
    /// must re-trigger the workflow out of band.
    pub async fn handle_decision(&self, callback: InteractionCallback) {
        let decision = match validate(&callback) {
            Ok(decision) => decision,
            Err(reason) => {
                warn!(
                    callback_id = %callback.callback_id,
                    %reason,
                    "ignoring malformed decision callback"
                );
                return;
            }
        };

        let job_id = JobId::new(callback.callback_id.clone());
        let Some(approval) = self.store.resolve(&job_id).await else {
            // Duplicate or stale callback; an idempotent no-op.
            warn!(job = %job_id, "no open approval for decision callback");
            return;
        };

        let user = callback.user.name.clone();
        let mut job = approval.job;

        let admission_error = match decision {
            Decision::Approve => {
                job.set_meta(APPROVER_META_KEY, user.as_str());
                None
            }
            Decision::Deny => Some(format!("job registration denied by {user}")),
        };
        let options = RegisterOptions::with_admission(Admission {
            secret: self.admission_secret.clone(),
            error: admission_error,
        });

        if let Err(error) = self.registry.register(&job, options).await {
            // The approval is already gone from the store, so this decision
            // is dropped; recovery needs the scheduler to re-emit the
            // registration.
            error!(
                job = %job.id,
                action = decision.as_str(),
                %error,
                "failed to apply decision to scheduler"
            );
            return;
        }
        info!(
            job = %job.id,
            action = decision.as_str(),
            approver = %user,
            "decision applied to scheduler"
        );

        let original = callback
            .original_message
            .map(|message| message.attachments)
            .unwrap_or_default();
        let attachments = render_outcome(
            &original,
            &job,
            decision.as_str(),
            &user,
            self.job_link(&job.id),
        );
        if let Err(error) = self.chat.update_message(&approval.handle, attachments).await {
            warn!(job = %job.id, %error, "failed to update notification with outcome");
        }
    }
}

impl<R, C, P> fmt::Debug for DecisionProcessor<R, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionProcessor")
            .field("ui_base_url", &self.ui_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::NoPlanner;
    use crate::slack::types::{
        Attachment, AttachmentField, CallbackAction, CallbackUser, OriginalMessage,
    };
    use crate::test_utils::{MockChat, MockRegistry, pending_job};
    use crate::types::ChannelId;

    type TestProcessor = DecisionProcessor<MockRegistry, MockChat, NoPlanner>;

    struct Fixture {
        chat: MockChat,
        registry: MockRegistry,
        store: Arc<ApprovalStore<MockChat, NoPlanner>>,
        processor: TestProcessor,
    }

    async fn fixture_with_open_approval(job_id: &str) -> Fixture {
        let chat = MockChat::default();
        let registry = MockRegistry::default();
        let store = Arc::new(ApprovalStore::new(
            chat.clone(),
            NoPlanner,
            ChannelId::new("#job-approvals"),
        ));
        store.upsert(pending_job(job_id, "opA")).await.unwrap();

        let processor = DecisionProcessor::new(
            store.clone(),
            registry.clone(),
            chat.clone(),
            "s3cret",
        )
        .with_job_links("http://nomad:4646/");

        Fixture {
            chat,
            registry,
            store,
            processor,
        }
    }

    fn callback(job_id: &str, actions: &[&str], user: &str) -> InteractionCallback {
        InteractionCallback {
            callback_id: job_id.to_string(),
            actions: actions
                .iter()
                .map(|name| CallbackAction {
                    name: name.to_string(),
                })
                .collect(),
            user: CallbackUser {
                id: "U123".to_string(),
                name: user.to_string(),
            },
            channel: None,
            message_ts: "1700000000.000000".to_string(),
            original_message: None,
        }
    }

    #[tokio::test]
    async fn approve_round_trip() {
        let fixture = fixture_with_open_approval("web").await;

        fixture
            .processor
            .handle_decision(callback("web", &["approve"], "alice"))
            .await;

        // Scheduler received the snapshot with approver metadata and no
        // admission error.
        let calls = fixture.registry.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(
            call.job.meta.get(APPROVER_META_KEY).map(String::as_str),
            Some("alice")
        );
        assert_eq!(
            call.job.registration_payload()["Meta"][APPROVER_META_KEY],
            serde_json::json!("alice")
        );
        assert_eq!(call.options.admission.secret, "s3cret");
        assert_eq!(call.options.admission.error, None);
        assert!(!call.options.policy_override);
        assert!(!call.options.preserve_counts);

        // The notification was rewritten in place with the outcome.
        let updates = fixture.chat.updated_handles();
        assert_eq!(updates.len(), 1);
        let crate::test_utils::ChatCall::Update { attachments, .. } = fixture
            .chat
            .calls()
            .into_iter()
            .find(|call| matches!(call, crate::test_utils::ChatCall::Update { .. }))
            .unwrap()
        else {
            unreachable!()
        };
        assert_eq!(
            attachments[0].title.as_deref(),
            Some("Job Registration (approve)")
        );
        assert_eq!(
            attachments[0].title_link.as_deref(),
            Some("http://nomad:4646/ui/jobs/web")
        );
        assert!(
            attachments[0]
                .fields
                .iter()
                .any(|field| field.title == "Approver" && field.value == "alice")
        );

        // The store no longer holds the job.
        assert!(!fixture.store.is_pending(&JobId::new("web")).await);
    }

    #[tokio::test]
    async fn deny_round_trip() {
        let fixture = fixture_with_open_approval("web").await;

        fixture
            .processor
            .handle_decision(callback("web", &["deny"], "bob"))
            .await;

        let calls = fixture.registry.calls();
        assert_eq!(calls.len(), 1);
        let error = calls[0].options.admission.error.as_deref().unwrap();
        assert!(error.contains("bob"), "admission error names the user: {error}");
        assert_eq!(calls[0].job.meta.get(APPROVER_META_KEY), None);

        assert!(!fixture.store.is_pending(&JobId::new("web")).await);
    }

    #[tokio::test]
    async fn duplicate_callback_is_an_idempotent_no_op() {
        let fixture = fixture_with_open_approval("web").await;

        fixture
            .processor
            .handle_decision(callback("web", &["approve"], "alice"))
            .await;
        fixture
            .processor
            .handle_decision(callback("web", &["approve"], "alice"))
            .await;

        assert_eq!(fixture.registry.calls().len(), 1);
        assert_eq!(fixture.chat.updated_handles().len(), 1);
    }

    #[tokio::test]
    async fn unknown_job_callback_is_a_no_op() {
        let fixture = fixture_with_open_approval("web").await;

        fixture
            .processor
            .handle_decision(callback("ghost", &["approve"], "alice"))
            .await;

        assert!(fixture.registry.calls().is_empty());
        assert!(fixture.store.is_pending(&JobId::new("web")).await);
    }

    #[tokio::test]
    async fn malformed_callbacks_change_nothing() {
        let fixture = fixture_with_open_approval("web").await;

        // Zero actions, two actions, unknown action name.
        fixture
            .processor
            .handle_decision(callback("web", &[], "alice"))
            .await;
        fixture
            .processor
            .handle_decision(callback("web", &["approve", "deny"], "alice"))
            .await;
        fixture
            .processor
            .handle_decision(callback("web", &["promote"], "alice"))
            .await;

        assert!(fixture.registry.calls().is_empty());
        assert!(fixture.chat.updated_handles().is_empty());
        assert!(fixture.store.is_pending(&JobId::new("web")).await);
    }

    #[tokio::test]
    async fn scheduler_failure_drops_the_decision_without_update() {
        let fixture = fixture_with_open_approval("web").await;
        fixture.registry.fail_registrations();

        fixture
            .processor
            .handle_decision(callback("web", &["approve"], "alice"))
            .await;

        // The entry is gone and the notification was not updated; recovery is
        // out of band.
        assert!(!fixture.store.is_pending(&JobId::new("web")).await);
        assert!(fixture.chat.updated_handles().is_empty());
    }

    #[tokio::test]
    async fn update_failure_does_not_roll_back_the_decision() {
        let fixture = fixture_with_open_approval("web").await;
        fixture.chat.fail_updates();

        fixture
            .processor
            .handle_decision(callback("web", &["approve"], "alice"))
            .await;

        assert_eq!(fixture.registry.calls().len(), 1);
        assert!(!fixture.store.is_pending(&JobId::new("web")).await);
    }

    #[tokio::test]
    async fn outcome_builds_on_the_original_message() {
        let fixture = fixture_with_open_approval("web").await;

        let mut cb = callback("web", &["deny"], "bob");
        cb.original_message = Some(OriginalMessage {
            attachments: vec![Attachment {
                title: Some("Job Registration Approval".to_string()),
                fields: vec![AttachmentField::new("Task: web/main", "Driver: docker")],
                ..Attachment::default()
            }],
        });

        fixture.processor.handle_decision(cb).await;

        let crate::test_utils::ChatCall::Update { attachments, .. } = fixture
            .chat
            .calls()
            .into_iter()
            .find(|call| matches!(call, crate::test_utils::ChatCall::Update { .. }))
            .unwrap()
        else {
            unreachable!()
        };
        let fields = &attachments[0].fields;
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].title, "Task: web/main");
        assert_eq!(fields[1].title, "Approver");
        assert_eq!(fields[2].title, "Action");
        assert_eq!(fields[2].value, "deny");
    }

    #[test]
    fn validate_requires_exactly_one_known_action() {
        assert_eq!(
            validate(&callback("web", &["approve"], "a")),
            Ok(Decision::Approve)
        );
        assert_eq!(
            validate(&callback("web", &["deny"], "a")),
            Ok(Decision::Deny)
        );
        assert_eq!(
            validate(&callback("web", &[], "a")),
            Err(CallbackRejection::ActionCount(0))
        );
        assert_eq!(
            validate(&callback("web", &["approve", "deny"], "a")),
            Err(CallbackRejection::ActionCount(2))
        );
        assert_eq!(
            validate(&callback("web", &["promote"], "a")),
            Err(CallbackRejection::UnknownAction("promote".to_string()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_for_distinct_jobs_do_not_interfere() {
        let chat = MockChat::default();
        let registry = MockRegistry::default();
        let store = Arc::new(ApprovalStore::new(
            chat.clone(),
            NoPlanner,
            ChannelId::new("#job-approvals"),
        ));
        for i in 0..16 {
            store
                .upsert(pending_job(&format!("job-{i}"), "opA"))
                .await
                .unwrap();
        }

        let processor = Arc::new(DecisionProcessor::new(
            store.clone(),
            registry.clone(),
            chat,
            "s3cret",
        ));

        let mut handles = Vec::new();
        for i in 0..16 {
            let processor = processor.clone();
            handles.push(tokio::spawn(async move {
                let action = if i % 2 == 0 { "approve" } else { "deny" };
                processor
                    .handle_decision(callback(&format!("job-{i}"), &[action], "alice"))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.calls().len(), 16);
        assert_eq!(store.open_count().await, 0);
    }
}
