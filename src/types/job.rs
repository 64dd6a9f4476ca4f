//! Job snapshot model.
//!
//! A [`Job`] is the full definition captured from a registration event: the
//! typed fields the approval workflow inspects (version, status, approver
//! chain, tasks) plus the raw JSON definition exactly as registered. The raw
//! value is what gets sent back to the scheduler on re-registration, so fields
//! the typed view does not model survive the round trip.
//!
//! Task driver configuration is a tagged variant keyed by driver kind rather
//! than an arbitrary key/value map. Unknown drivers and missing keys degrade
//! to empty values; they never fail.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::ids::JobId;

/// The distinguished version number the scheduler assigns to a job awaiting
/// approval. Registrations carrying any other version are already-running
/// versions and never qualify for notification.
pub const PENDING_VERSION: u64 = 1000;

/// Job status value indicating the registration is parked pending a decision.
pub const STATUS_AWAITING_APPROVAL: &str = "awaiting-approval";

/// Metadata key recording the approving user on an admitted job.
pub const APPROVER_META_KEY: &str = "SLACK_APPROVER";

/// The container driver name. Tasks using it are summarized by image; every
/// other driver is summarized by command and arguments.
pub const CONTAINER_DRIVER: &str = "docker";

/// Errors raised when a registration event's job payload cannot be parsed.
#[derive(Debug, Error)]
pub enum JobParseError {
    /// The payload deserialized but carries no job ID.
    #[error("job payload has no ID")]
    MissingId,

    /// The payload is not a JSON object of the expected shape.
    #[error("malformed job payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Driver-specific task configuration.
///
/// Keyed by driver kind with explicit accessors, so callers never probe an
/// untyped configuration map. Missing keys become empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverConfig {
    /// Container driver: the task runs an image.
    Container { image: String },

    /// Any other driver: the task runs a command with arguments.
    Command { command: String, args: Vec<String> },
}

impl DriverConfig {
    /// Builds the config view for a task, given its driver name and raw
    /// configuration map. Total: absent or oddly-typed keys yield empty
    /// values.
    fn from_raw(driver: &str, config: Option<&serde_json::Map<String, Value>>) -> Self {
        let get_str = |key: &str| -> String {
            config
                .and_then(|c| c.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        if driver == CONTAINER_DRIVER {
            DriverConfig::Container {
                image: get_str("image"),
            }
        } else {
            let args = config
                .and_then(|c| c.get("args"))
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            DriverConfig::Command {
                command: get_str("command"),
                args,
            }
        }
    }

    /// The image for container tasks, empty otherwise.
    pub fn image(&self) -> &str {
        match self {
            DriverConfig::Container { image } => image,
            DriverConfig::Command { .. } => "",
        }
    }

    /// The command for non-container tasks, empty otherwise.
    pub fn command(&self) -> &str {
        match self {
            DriverConfig::Container { .. } => "",
            DriverConfig::Command { command, .. } => command,
        }
    }
}

/// A single task within a task group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub driver: String,
    pub config: DriverConfig,
}

/// A named group of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    pub name: String,
    pub tasks: Vec<Task>,
}

/// The full job definition captured at registration time.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub version: Option<u64>,
    pub status: Option<String>,

    /// Ordered approver chain; the first entry is the identity currently
    /// responsible for this registration.
    pub approvers: Vec<String>,

    pub meta: BTreeMap<String, String>,
    pub task_groups: Vec<TaskGroup>,

    /// The definition exactly as the scheduler emitted it. Re-registration
    /// sends this back, so fields outside the typed view are preserved.
    raw: Value,
}

// Mirror of the scheduler's wire shape. Everything except the ID is optional;
// validation happens after deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawJob {
    #[serde(rename = "ID")]
    id: Option<String>,
    name: Option<String>,
    version: Option<u64>,
    status: Option<String>,
    #[serde(default)]
    approvers: Option<Vec<String>>,
    #[serde(default)]
    meta: Option<BTreeMap<String, String>>,
    #[serde(default)]
    task_groups: Option<Vec<RawTaskGroup>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTaskGroup {
    name: Option<String>,
    #[serde(default)]
    tasks: Option<Vec<RawTask>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTask {
    name: Option<String>,
    driver: Option<String>,
    #[serde(default)]
    config: Option<serde_json::Map<String, Value>>,
}

impl Job {
    /// Parses a job definition from a registration event payload.
    ///
    /// The original value is retained verbatim as the re-registration body.
    pub fn from_value(value: Value) -> Result<Job, JobParseError> {
        let raw_job: RawJob = serde_json::from_value(value.clone())?;

        let id = match raw_job.id {
            Some(id) if !id.is_empty() => JobId::new(id),
            _ => return Err(JobParseError::MissingId),
        };

        let name = raw_job.name.unwrap_or_else(|| id.as_str().to_string());

        let task_groups = raw_job
            .task_groups
            .unwrap_or_default()
            .into_iter()
            .map(|group| TaskGroup {
                name: group.name.unwrap_or_default(),
                tasks: group
                    .tasks
                    .unwrap_or_default()
                    .into_iter()
                    .map(|task| {
                        let driver = task.driver.unwrap_or_default();
                        let config = DriverConfig::from_raw(&driver, task.config.as_ref());
                        Task {
                            name: task.name.unwrap_or_default(),
                            driver,
                            config,
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(Job {
            id,
            name,
            version: raw_job.version,
            status: raw_job.status,
            approvers: raw_job.approvers.unwrap_or_default(),
            meta: raw_job.meta.unwrap_or_default(),
            task_groups,
            raw: value,
        })
    }

    /// Sets a metadata entry on the snapshot, visible both in the typed view
    /// and in the re-registration body.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if !self.raw.is_object() {
            self.raw = Value::Object(serde_json::Map::new());
        }
        let object = self.raw.as_object_mut().expect("raw is an object");
        let meta = object
            .entry("Meta")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(serde_json::Map::new());
        }
        meta.as_object_mut()
            .expect("Meta is an object")
            .insert(key.clone(), Value::String(value.clone()));

        self.meta.insert(key, value);
    }

    /// The body to send on re-registration: the captured definition, including
    /// any metadata applied since capture.
    pub fn registration_payload(&self) -> &Value {
        &self.raw
    }
}
