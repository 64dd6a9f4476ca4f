//! Scheduler integration: event feed, admission re-registration, plan diffs.
//!
//! The scheduler is an external collaborator reached over HTTP. This module
//! provides the concrete client ([`NomadClient`]) plus the trait seams the
//! core is written against, so the approval workflow is testable with mock
//! implementations:
//!
//! - [`JobRegistry`] - re-register a captured job snapshot with an admission
//!   decision
//! - [`PlanApi`] - predict what a registration would change
//! - [`stream::EventSource`] - consume the live event feed batch by batch

use std::fmt;
use std::future::Future;

use crate::types::{Job, JobDiff};

pub mod client;
pub mod stream;

pub use client::{Admission, NomadClient, RegisterOptions, SchedulerError};
pub use stream::{EVENT_JOB_REGISTERED, EventBatch, EventSource, StreamError, StreamEvent};

/// Applies admission decisions by re-registering a job snapshot.
///
/// Implementations perform one network round-trip and are assumed
/// idempotent-safe; the core never retries a failed call.
pub trait JobRegistry {
    /// The error type returned by this registry.
    type Error: fmt::Display + Send;

    /// Re-registers `job` with the given admission options.
    fn register(
        &self,
        job: &Job,
        options: RegisterOptions,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Predicts the changes a registration would make.
///
/// A plan is advisory: callers treat errors and absent diffs the same way and
/// render the notification without one.
pub trait PlanApi {
    /// The error type returned by this plan source.
    type Error: fmt::Display + Send;

    /// Returns the predicted diff for `job`, if the scheduler can produce one.
    fn plan_diff(
        &self,
        job: &Job,
    ) -> impl Future<Output = Result<Option<JobDiff>, Self::Error>> + Send;
}

/// A plan source that never predicts anything. Used where no plan endpoint is
/// available (and throughout the tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlanner;

impl PlanApi for NoPlanner {
    type Error = std::convert::Infallible;

    async fn plan_diff(&self, _job: &Job) -> Result<Option<JobDiff>, Self::Error> {
        Ok(None)
    }
}
