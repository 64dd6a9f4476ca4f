//! HTTP client for the scheduler API.
//!
//! Wraps a `reqwest::Client` scoped to one scheduler address. Three surfaces
//! matter to the approval workflow:
//!
//! - the current-index query, used once at startup as the event-stream resume
//!   point
//! - job re-registration with admission options, applying a decision
//! - the plan endpoint, predicting what a registration would change

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{FieldDiff, Job, JobDiff};

use super::stream::{NomadEventStream, TOPIC_JOB};
use super::{JobRegistry, PlanApi};

/// Response header carrying the scheduler's current event index.
pub const INDEX_HEADER: &str = "X-Nomad-Index";

/// Errors returned by scheduler API calls.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The request itself failed (connect, timeout, body read).
    #[error("scheduler request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The scheduler answered with a non-success status.
    #[error("scheduler returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The index query response had no index header.
    #[error("scheduler response is missing the {0} header")]
    MissingIndex(&'static str),

    /// The index header was present but not a number.
    #[error("scheduler returned an unparseable index: {0:?}")]
    InvalidIndex(String),
}

/// Admission decision attached to a re-registration.
///
/// The secret authenticates this process as the configured approver. An
/// absent error admits the pending version; a present one rejects it with
/// that message.
#[derive(Debug, Clone)]
pub struct Admission {
    pub secret: String,
    pub error: Option<String>,
}

/// Options for a decision-applying re-registration.
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    pub policy_override: bool,
    pub preserve_counts: bool,
    pub admission: Admission,
}

impl RegisterOptions {
    /// The options every decision uses: no policy override, no count
    /// preservation, just the admission payload.
    pub fn with_admission(admission: Admission) -> Self {
        RegisterOptions {
            policy_override: false,
            preserve_counts: false,
            admission,
        }
    }
}

// Wire shape of the re-registration request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterRequest<'a> {
    job: &'a Value,
    policy_override: bool,
    preserve_counts: bool,
    admission: AdmissionBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AdmissionBody<'a> {
    secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

// Wire shape of the plan response; only the field-level diff is consumed.
#[derive(Debug, Deserialize)]
struct RawPlanResponse {
    #[serde(rename = "Diff")]
    diff: Option<RawPlanDiff>,
}

#[derive(Debug, Deserialize)]
struct RawPlanDiff {
    #[serde(rename = "Fields", default)]
    fields: Vec<RawPlanField>,
}

#[derive(Debug, Deserialize)]
struct RawPlanField {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Old", default)]
    old: String,
    #[serde(rename = "New", default)]
    new: String,
}

/// A scheduler API client scoped to one base address.
#[derive(Clone)]
pub struct NomadClient {
    http: reqwest::Client,
    base_url: String,
}

impl NomadClient {
    /// Creates a client for the scheduler at `base_url`
    /// (e.g., `http://127.0.0.1:4646`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        NomadClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Returns the scheduler's current highest event index.
    ///
    /// Used once at startup as the stream resume position; a failure here is
    /// fatal to the process.
    pub async fn current_index(&self) -> Result<u64, SchedulerError> {
        let response = self
            .http
            .get(format!("{}/v1/jobs", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;

        let header = response
            .headers()
            .get(INDEX_HEADER)
            .ok_or(SchedulerError::MissingIndex(INDEX_HEADER))?;
        let text = header
            .to_str()
            .map_err(|_| SchedulerError::InvalidIndex(format!("{header:?}")))?;
        text.trim()
            .parse()
            .map_err(|_| SchedulerError::InvalidIndex(text.to_string()))
    }

    /// Opens a job-topic event subscription starting at `from_index`.
    pub async fn subscribe(&self, from_index: u64) -> Result<NomadEventStream, SchedulerError> {
        let response = self
            .http
            .get(format!("{}/v1/event/stream", self.base_url))
            .query(&[
                ("topic", format!("{TOPIC_JOB}:*")),
                ("index", from_index.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(NomadEventStream::new(Box::pin(response.bytes_stream())))
    }
}

impl JobRegistry for NomadClient {
    type Error = SchedulerError;

    async fn register(&self, job: &Job, options: RegisterOptions) -> Result<(), SchedulerError> {
        let body = RegisterRequest {
            job: job.registration_payload(),
            policy_override: options.policy_override,
            preserve_counts: options.preserve_counts,
            admission: AdmissionBody {
                secret: &options.admission.secret,
                error: options.admission.error.as_deref(),
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/jobs", self.base_url))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

impl PlanApi for NomadClient {
    type Error = SchedulerError;

    async fn plan_diff(&self, job: &Job) -> Result<Option<JobDiff>, SchedulerError> {
        let body = serde_json::json!({
            "Job": job.registration_payload(),
            "Diff": true,
        });

        let response = self
            .http
            .post(format!("{}/v1/job/{}/plan", self.base_url, job.id))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let plan: RawPlanResponse = response.json().await?;
        let fields: Vec<FieldDiff> = plan
            .diff
            .map(|diff| {
                diff.fields
                    .into_iter()
                    .map(|field| FieldDiff::new(field.name, field.old, field.new))
                    .collect()
            })
            .unwrap_or_default();

        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(JobDiff { fields }))
        }
    }
}

impl std::fmt::Debug for NomadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Turns non-success responses into [`SchedulerError::Api`] with the body as
/// the message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SchedulerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SchedulerError::Api {
        status: status.as_u16(),
        message,
    })
}
