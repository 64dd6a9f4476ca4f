//! Predicted change summary for a job registration.
//!
//! The scheduler's plan endpoint can predict what a registration would change
//! relative to the running version. When available, the changed attributes are
//! appended to the approval notification so the approver sees what they are
//! admitting.

use serde::{Deserialize, Serialize};

/// One changed attribute, rendered as `old → new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub name: String,
    pub old: String,
    pub new: String,
}

impl FieldDiff {
    pub fn new(
        name: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        FieldDiff {
            name: name.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

/// The set of changed attributes predicted for a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDiff {
    pub fields: Vec<FieldDiff>,
}

impl JobDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
