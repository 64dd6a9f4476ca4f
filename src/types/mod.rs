//! Core domain types for the approval workflow.
//!
//! This module contains the fundamental types used throughout the application,
//! designed to encode invariants via the type system.

pub mod diff;
pub mod ids;
pub mod job;

// Re-export commonly used types at the module level
pub use diff::{FieldDiff, JobDiff};
pub use ids::{ChannelId, JobId, MessageTs, NotificationHandle};
pub use job::{
    APPROVER_META_KEY, CONTAINER_DRIVER, DriverConfig, Job, JobParseError, PENDING_VERSION,
    STATUS_AWAITING_APPROVAL, Task, TaskGroup,
};
