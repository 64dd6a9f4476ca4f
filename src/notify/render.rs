//! Pure rendering of approval notifications.
//!
//! Turns a job snapshot (optionally with a predicted diff) into the Slack
//! attachment payload, and rewrites a decided notification with its outcome.
//! Nothing here touches shared state; unknown or missing configuration
//! renders as empty, never as a failure.

use chrono::Utc;

use crate::slack::types::{Attachment, AttachmentAction, AttachmentField, ConfirmField};
use crate::types::{DriverConfig, Job, JobDiff, JobId};

/// Action name carried by the approve button.
pub const ACTION_APPROVE: &str = "approve";

/// Action name carried by the deny button.
pub const ACTION_DENY: &str = "deny";

const TITLE: &str = "Job Registration Approval";
const FALLBACK: &str = "job registration";

/// Renders the approval notification for a pending job registration.
///
/// One field per task with a driver-aware summary, one field per predicted
/// change (`old → new`), and approve/deny controls tagged with the job id as
/// the callback correlation id.
pub fn render_notification(job: &Job, diff: Option<&JobDiff>) -> Vec<Attachment> {
    let mut fields = Vec::new();

    for group in &job.task_groups {
        for task in &group.tasks {
            fields.push(AttachmentField::new(
                format!("Task: {}/{}", group.name, task.name),
                task_summary(task.driver.as_str(), &task.config),
            ));
        }
    }

    if let Some(diff) = diff {
        for change in &diff.fields {
            fields.push(AttachmentField::new(
                change.name.clone(),
                format!("{} → {}", change.old, change.new),
            ));
        }
    }

    vec![Attachment {
        fallback: Some(FALLBACK.to_string()),
        title: Some(TITLE.to_string()),
        fields,
        footer: Some(footer(&job.id)),
        ts: Some(Utc::now().timestamp()),
        callback_id: Some(job.id.as_str().to_string()),
        actions: decision_actions(),
        ..Attachment::default()
    }]
}

/// Rewrites a decided notification in place.
///
/// Starts from the original rendered message (echoed back in the callback),
/// sets the outcome title with a link to the job, strips the controls, and
/// appends `Approver` and `Action` fields.
pub fn render_outcome(
    original: &[Attachment],
    job: &Job,
    action: &str,
    user: &str,
    job_link: Option<String>,
) -> Vec<Attachment> {
    let mut attachment = original
        .first()
        .cloned()
        .unwrap_or_else(|| base_attachment(job));

    attachment.title = Some(format!("Job Registration ({action})"));
    attachment.title_link = job_link;
    attachment.color = Some(outcome_color(action).to_string());
    attachment.actions.clear();
    attachment.fields.push(AttachmentField::new("Approver", user));
    attachment.fields.push(AttachmentField::new("Action", action));

    vec![attachment]
}

fn task_summary(driver: &str, config: &DriverConfig) -> String {
    match config {
        DriverConfig::Container { image } => format!("Driver: {driver}\nImage: {image}"),
        DriverConfig::Command { command, args } => {
            if args.is_empty() {
                format!("Driver: {driver}\nCommand: {command}")
            } else {
                format!("Driver: {driver}\nCommand: {command} {}", args.join(" "))
            }
        }
    }
}

fn decision_actions() -> Vec<AttachmentAction> {
    let approve = AttachmentAction::button(ACTION_APPROVE, "Approve :heavy_check_mark:");
    let deny = AttachmentAction {
        style: Some("danger".to_string()),
        confirm: Some(ConfirmField {
            title: "Are you sure?".to_string(),
            text: "The pending job version will be rejected.".to_string(),
            ok_text: "Deny".to_string(),
            dismiss_text: "Cancel".to_string(),
        }),
        ..AttachmentAction::button(ACTION_DENY, "Deny :no_entry_sign:")
    };
    vec![approve, deny]
}

// Fallback base when a callback arrives without its original message.
fn base_attachment(job: &Job) -> Attachment {
    Attachment {
        fallback: Some(FALLBACK.to_string()),
        footer: Some(footer(&job.id)),
        callback_id: Some(job.id.as_str().to_string()),
        ..Attachment::default()
    }
}

fn footer(id: &JobId) -> String {
    format!("Job ID: {id}")
}

fn outcome_color(action: &str) -> &'static str {
    if action == ACTION_APPROVE { "good" } else { "danger" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDiff;
    use serde_json::json;

    fn job_with_tasks() -> Job {
        Job::from_value(json!({
            "ID": "web",
            "Version": 1000,
            "Status": "awaiting-approval",
            "Approvers": ["opA"],
            "TaskGroups": [
                {
                    "Name": "web",
                    "Tasks": [
                        {"Name": "frontend", "Driver": "docker", "Config": {"image": "nginx:1.25"}},
                        {"Name": "relay", "Driver": "exec", "Config": {"command": "/bin/relay", "args": ["-v"]}}
                    ]
                },
                {
                    "Name": "batch",
                    "Tasks": [
                        {"Name": "cron", "Driver": "raw_exec", "Config": {"command": "/bin/cron"}}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn one_field_per_task() {
        let attachments = render_notification(&job_with_tasks(), None);

        assert_eq!(attachments.len(), 1);
        let fields = &attachments[0].fields;
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].title, "Task: web/frontend");
        assert_eq!(fields[1].title, "Task: web/relay");
        assert_eq!(fields[2].title, "Task: batch/cron");
    }

    #[test]
    fn container_tasks_show_image() {
        let attachments = render_notification(&job_with_tasks(), None);
        assert_eq!(
            attachments[0].fields[0].value,
            "Driver: docker\nImage: nginx:1.25"
        );
    }

    #[test]
    fn other_tasks_show_command_and_args() {
        let attachments = render_notification(&job_with_tasks(), None);
        assert_eq!(
            attachments[0].fields[1].value,
            "Driver: exec\nCommand: /bin/relay -v"
        );
        assert_eq!(
            attachments[0].fields[2].value,
            "Driver: raw_exec\nCommand: /bin/cron"
        );
    }

    #[test]
    fn diff_fields_are_appended() {
        let diff = JobDiff {
            fields: vec![FieldDiff::new("Count", "2", "4")],
        };
        let attachments = render_notification(&job_with_tasks(), Some(&diff));

        let fields = &attachments[0].fields;
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[3].title, "Count");
        assert_eq!(fields[3].value, "2 → 4");
    }

    #[test]
    fn controls_carry_the_correlation_id() {
        let attachments = render_notification(&job_with_tasks(), None);
        let attachment = &attachments[0];

        assert_eq!(attachment.callback_id.as_deref(), Some("web"));
        assert_eq!(attachment.actions.len(), 2);
        assert_eq!(attachment.actions[0].name, ACTION_APPROVE);
        assert_eq!(attachment.actions[1].name, ACTION_DENY);
        assert!(attachment.actions[1].confirm.is_some());
    }

    #[test]
    fn title_and_footer_carry_the_job_id() {
        let attachments = render_notification(&job_with_tasks(), None);
        let attachment = &attachments[0];

        assert_eq!(attachment.title.as_deref(), Some(TITLE));
        assert_eq!(attachment.footer.as_deref(), Some("Job ID: web"));
    }

    #[test]
    fn outcome_rewrites_original_message() {
        let job = job_with_tasks();
        let original = render_notification(&job, None);

        let updated = render_outcome(
            &original,
            &job,
            ACTION_APPROVE,
            "alice",
            Some("http://nomad/ui/jobs/web".to_string()),
        );

        assert_eq!(updated.len(), 1);
        let attachment = &updated[0];
        assert_eq!(
            attachment.title.as_deref(),
            Some("Job Registration (approve)")
        );
        assert_eq!(
            attachment.title_link.as_deref(),
            Some("http://nomad/ui/jobs/web")
        );
        assert!(attachment.actions.is_empty());

        let appended = &attachment.fields[attachment.fields.len() - 2..];
        assert_eq!(appended[0].title, "Approver");
        assert_eq!(appended[0].value, "alice");
        assert_eq!(appended[1].title, "Action");
        assert_eq!(appended[1].value, "approve");
    }

    #[test]
    fn outcome_without_original_still_renders() {
        let job = job_with_tasks();
        let updated = render_outcome(&[], &job, ACTION_DENY, "bob", None);

        let attachment = &updated[0];
        assert_eq!(attachment.title.as_deref(), Some("Job Registration (deny)"));
        assert_eq!(attachment.color.as_deref(), Some("danger"));
        assert_eq!(attachment.footer.as_deref(), Some("Job ID: web"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_driver() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("docker".to_string()),
                Just("exec".to_string()),
                Just("raw_exec".to_string()),
                Just("qemu".to_string()),
                "[a-z_]{1,12}".prop_map(String::from),
            ]
        }

        fn arb_job(max_tasks: usize) -> impl Strategy<Value = Job> {
            let task = (
                "[a-z][a-z0-9-]{0,15}",
                arb_driver(),
                proptest::option::of("[a-z0-9:./ -]{0,30}"),
            );
            let group = ("[a-z][a-z0-9-]{0,15}", prop::collection::vec(task, 0..4));
            ("[a-z][a-z0-9-]{1,15}", prop::collection::vec(group, 0..4)).prop_map(
                move |(id, groups)| {
                    let task_groups: Vec<_> = groups
                        .into_iter()
                        .map(|(name, tasks)| {
                            let tasks: Vec<_> = tasks
                                .into_iter()
                                .take(max_tasks)
                                .map(|(task_name, driver, value)| {
                                    serde_json::json!({
                                        "Name": task_name,
                                        "Driver": driver,
                                        "Config": {"image": value.clone(), "command": value},
                                    })
                                })
                                .collect();
                            serde_json::json!({"Name": name, "Tasks": tasks})
                        })
                        .collect();
                    Job::from_value(serde_json::json!({
                        "ID": id,
                        "TaskGroups": task_groups,
                    }))
                    .unwrap()
                },
            )
        }

        proptest! {
            /// Rendering is total and yields one field per task.
            #[test]
            fn field_count_matches_task_count(job in arb_job(4)) {
                let attachments = render_notification(&job, None);
                let task_count: usize =
                    job.task_groups.iter().map(|g| g.tasks.len()).sum();
                prop_assert_eq!(attachments[0].fields.len(), task_count);
            }

            /// The controls and correlation id are always present.
            #[test]
            fn controls_always_present(job in arb_job(4)) {
                let attachments = render_notification(&job, None);
                let attachment = &attachments[0];
                prop_assert_eq!(attachment.actions.len(), 2);
                prop_assert_eq!(
                    attachment.callback_id.as_deref(),
                    Some(job.id.as_str())
                );
            }
        }
    }
}
